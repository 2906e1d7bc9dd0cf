use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallType {
    Standard,
    Comprehensive,
    CheckIn,
}

impl CallType {
    /// Screening type for a person with `completed_calls` completed calls.
    ///
    /// Every `every`-th call is comprehensive; a person with no completed calls always
    /// starts with a standard call.
    pub fn for_call_count(completed_calls: u32, every: u32) -> Self {
        if completed_calls > 0 && every > 0 && completed_calls % every == 0 {
            CallType::Comprehensive
        } else {
            CallType::Standard
        }
    }

    pub fn is_screening(&self) -> bool {
        !matches!(self, CallType::CheckIn)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Standard => "standard",
            CallType::Comprehensive => "comprehensive",
            CallType::CheckIn => "check-in",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallSource {
    Outbound,
    Inbound,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Scheduled,
    InProgress,
    Completed,
    Failed,
    NoAnswer,
    Voicemail,
}

impl CallStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CallStatus::Scheduled | CallStatus::InProgress)
    }

    /// An outcome where the person was not reached.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            CallStatus::NoAnswer | CallStatus::Voicemail | CallStatus::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Scheduled => "scheduled",
            CallStatus::InProgress => "in-progress",
            CallStatus::Completed => "completed",
            CallStatus::Failed => "failed",
            CallStatus::NoAnswer => "no-answer",
            CallStatus::Voicemail => "voicemail",
        }
    }
}

/// One attempted or completed contact with a person.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub person_id: Uuid,
    pub call_type: CallType,
    pub source: CallSource,
    pub provider_call_id: Option<String>,
    pub status: CallStatus,
    pub retry_count: u32,
    pub duration_secs: Option<u32>,
    pub recording_url: Option<String>,
    pub transcript_ref: Option<String>,
    pub summary: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Call {
    /// A new outbound call in `scheduled` status.
    pub fn scheduled(
        person_id: Uuid,
        call_type: CallType,
        retry_count: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            person_id,
            call_type,
            source: CallSource::Outbound,
            provider_call_id: None,
            status: CallStatus::Scheduled,
            retry_count,
            duration_secs: None,
            recording_url: None,
            transcript_ref: None,
            summary: None,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// A new inbound call already connected by the provider.
    pub fn inbound(
        person_id: Uuid,
        call_type: CallType,
        provider_call_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            source: CallSource::Inbound,
            provider_call_id: Some(provider_call_id.into()),
            status: CallStatus::InProgress,
            started_at: Some(now),
            ..Self::scheduled(person_id, call_type, 0, now)
        }
    }
}

/// Targeted update for a [`Call`]; `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallPatch {
    pub status: Option<CallStatus>,
    pub provider_call_id: Option<String>,
    pub duration_secs: Option<u32>,
    pub recording_url: Option<String>,
    pub transcript_ref: Option<String>,
    pub summary: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl CallPatch {
    pub fn status(status: CallStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply(self, call: &mut Call) {
        if let Some(status) = self.status {
            call.status = status;
        }
        if self.provider_call_id.is_some() {
            call.provider_call_id = self.provider_call_id;
        }
        if self.duration_secs.is_some() {
            call.duration_secs = self.duration_secs;
        }
        if self.recording_url.is_some() {
            call.recording_url = self.recording_url;
        }
        if self.transcript_ref.is_some() {
            call.transcript_ref = self.transcript_ref;
        }
        if self.summary.is_some() {
            call.summary = self.summary;
        }
        if self.started_at.is_some() {
            call.started_at = self.started_at;
        }
        if self.completed_at.is_some() {
            call.completed_at = self.completed_at;
        }
        if self.error_message.is_some() {
            call.error_message = self.error_message;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_thirteenth_call_is_comprehensive() {
        assert_eq!(CallType::for_call_count(0, 13), CallType::Standard);
        assert_eq!(CallType::for_call_count(12, 13), CallType::Standard);
        assert_eq!(CallType::for_call_count(13, 13), CallType::Comprehensive);
        assert_eq!(CallType::for_call_count(26, 13), CallType::Comprehensive);
        assert_eq!(CallType::for_call_count(27, 13), CallType::Standard);
    }

    #[test]
    fn miss_statuses() {
        assert!(CallStatus::NoAnswer.is_miss());
        assert!(CallStatus::Voicemail.is_miss());
        assert!(CallStatus::Failed.is_miss());
        assert!(!CallStatus::Completed.is_miss());
        assert!(!CallStatus::InProgress.is_terminal());
    }

    #[test]
    fn inbound_call_starts_in_progress() {
        let call = Call::inbound(Uuid::new_v4(), CallType::CheckIn, "CA123", Utc::now());
        assert_eq!(call.status, CallStatus::InProgress);
        assert_eq!(call.source, CallSource::Inbound);
        assert_eq!(call.provider_call_id.as_deref(), Some("CA123"));
    }
}
