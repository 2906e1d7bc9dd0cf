//! Persistence boundary for the orchestration core.
//!
//! The core talks to storage only through [`Store`]. Updates are expressed as targeted
//! patches so that independent writers (the conversation engine, the telephony status
//! webhook and the post-call pipeline) never overwrite each other's fields.

mod memory;
pub mod seed;

pub use memory::InMemoryStore;

use crate::model::{
    Assessment, Call, CallPatch, Escalation, Flag, Person, PersonPatch, Reviewer,
};
use crate::CoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use wellcall_types::PhoneNumber;

#[async_trait]
pub trait Store: Send + Sync {
    async fn person(&self, id: Uuid) -> CoreResult<Option<Person>>;

    async fn person_by_phone(&self, phone: &PhoneNumber) -> CoreResult<Option<Person>>;

    async fn active_persons(&self) -> CoreResult<Vec<Person>>;

    /// Applies `patch` and returns the updated person.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::PersonNotFound`] if no such person exists.
    async fn update_person(&self, id: Uuid, patch: PersonPatch) -> CoreResult<Person>;

    async fn insert_call(&self, call: &Call) -> CoreResult<()>;

    async fn call(&self, id: Uuid) -> CoreResult<Option<Call>>;

    async fn call_by_provider_id(&self, provider_call_id: &str) -> CoreResult<Option<Call>>;

    /// Applies `patch` and returns the updated call.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::CallNotFound`] if no such call exists.
    async fn update_call(&self, id: Uuid, patch: CallPatch) -> CoreResult<Call>;

    /// Calls for a person scheduled at or after `since`, newest first, at most `limit`.
    async fn recent_calls(
        &self,
        person_id: Uuid,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> CoreResult<Vec<Call>>;

    /// Inserts an assessment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::DuplicateAssessment`] if the call already has one.
    async fn insert_assessment(&self, assessment: &Assessment) -> CoreResult<()>;

    async fn assessment_for_call(&self, call_id: Uuid) -> CoreResult<Option<Assessment>>;

    async fn latest_assessment(&self, person_id: Uuid) -> CoreResult<Option<Assessment>>;

    /// Records the authoritative flag computed by the scoring engine.
    async fn set_assessment_score(
        &self,
        assessment_id: Uuid,
        flag: Flag,
        scored_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    async fn insert_escalation(&self, escalation: &Escalation) -> CoreResult<()>;

    async fn escalations_for_person(&self, person_id: Uuid) -> CoreResult<Vec<Escalation>>;

    async fn reviewers(&self) -> CoreResult<Vec<Reviewer>>;
}
