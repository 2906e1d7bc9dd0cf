//! Real-time conversation sessions.

mod engine;
mod memory;
mod phase;
mod prompts;
pub mod protocol;
mod session;
pub mod tools;

pub use engine::{ConversationEngine, Reply, SessionGrant};
pub use phase::{Phase, PhaseTracker};
pub use protocol::{InboundMessage, OutboundMessage};
pub use session::{Session, SessionRegistry};
pub use tools::{parse_submission, tool_specs, Submission};
