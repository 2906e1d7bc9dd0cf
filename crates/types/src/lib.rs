//! Validated primitive types shared across the wellness-call workspace.
//!
//! These wrappers guarantee their invariants once constructed, so callers never need to
//! re-check a person's name or phone number after it has crossed a boundary.

mod phone;
mod text;

pub use phone::{PhoneError, PhoneNumber};
pub use text::{NonEmptyText, TextError};
