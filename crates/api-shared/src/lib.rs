//! # API Shared
//!
//! Boundary utilities shared by the wellness-call API surfaces.
//!
//! Contains:
//! - `HealthService` and its response type
//! - Telephony webhook signature validation
//! - Single-use session tokens for the real-time transport
//!
//! Used by `api-rest` and the operator CLI.

pub mod auth;
pub mod health;
pub mod tokens;

pub use auth::{sign_webhook, validate_webhook_signature, AuthError};
pub use health::{HealthRes, HealthService};
pub use tokens::{SessionTokens, TokenError, TokenGrant};
