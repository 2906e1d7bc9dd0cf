//! External collaborators consumed as opaque services.
//!
//! Each collaborator is a trait so the orchestration core can run against HTTP-backed
//! implementations in production and in-process doubles in tests.

pub mod llm;
pub mod mailer;
pub mod telephony;
pub mod transcript;

pub use llm::{
    AnthropicModel, ChatMessage, ChatRole, LanguageModel, ModelReply, ModelRequest, ToolCall,
    ToolChoice, ToolSpec,
};
pub use mailer::{Email, HttpMailer, Mailer};
pub use telephony::{HttpTelephony, OriginateRequest, Telephony};
pub use transcript::{HttpTranscriptIndex, TranscriptIndex, TranscriptRecord};

use std::time::Duration;

/// Timeout applied to every outbound provider request.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) fn http_client() -> crate::CoreResult<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?)
}
