use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("person not found: {0}")]
    PersonNotFound(Uuid),
    #[error("call not found: {0}")]
    CallNotFound(Uuid),
    #[error("escalation not found: {0}")]
    EscalationNotFound(Uuid),
    #[error("call {0} already has an assessment")]
    DuplicateAssessment(Uuid),
    #[error("invalid escalation transition from {from} to {to}")]
    InvalidEscalationTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("telephony provider error: {0}")]
    Telephony(String),
    #[error("language model error: {0}")]
    Model(String),
    #[error("notification error: {0}")]
    Notification(String),
    #[error("transcript index error: {0}")]
    Transcript(String),
    #[error("invalid tool input: {0}")]
    InvalidToolInput(String),

    #[error("queue error: {0}")]
    Queue(String),
    #[error("storage error: {0}")]
    Store(String),

    #[error("failed to read seed file: {0}")]
    SeedRead(std::io::Error),
    #[error("seed file schema mismatch: {0}")]
    SeedParse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
