use super::Store;
use crate::model::{
    Assessment, Call, CallPatch, Escalation, Flag, Person, PersonPatch, PersonStatus, Reviewer,
};
use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;
use wellcall_types::PhoneNumber;

#[derive(Default)]
struct Tables {
    persons: HashMap<Uuid, Person>,
    calls: HashMap<Uuid, Call>,
    assessments: HashMap<Uuid, Assessment>,
    escalations: Vec<Escalation>,
    reviewers: Vec<Reviewer>,
}

/// Process-local [`Store`] backed by hash maps.
///
/// Suitable for single-process deployments seeded at startup and for tests. Every
/// operation takes the lock for its own duration only and never across an await point.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(persons: Vec<Person>, reviewers: Vec<Reviewer>) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write();
            for person in persons {
                tables.persons.insert(person.id, person);
            }
            tables.reviewers = reviewers;
        }
        store
    }

    pub fn add_person(&self, person: Person) {
        self.tables.write().persons.insert(person.id, person);
    }

    pub fn add_reviewer(&self, reviewer: Reviewer) {
        self.tables.write().reviewers.push(reviewer);
    }

    /// Every call for a person, oldest first.
    pub fn calls_for_person(&self, person_id: Uuid) -> Vec<Call> {
        let mut calls: Vec<Call> = self
            .tables
            .read()
            .calls
            .values()
            .filter(|c| c.person_id == person_id)
            .cloned()
            .collect();
        calls.sort_by_key(|c| c.scheduled_at);
        calls
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn person(&self, id: Uuid) -> CoreResult<Option<Person>> {
        Ok(self.tables.read().persons.get(&id).cloned())
    }

    async fn person_by_phone(&self, phone: &PhoneNumber) -> CoreResult<Option<Person>> {
        Ok(self
            .tables
            .read()
            .persons
            .values()
            .find(|p| &p.phone == phone)
            .cloned())
    }

    async fn active_persons(&self) -> CoreResult<Vec<Person>> {
        Ok(self
            .tables
            .read()
            .persons
            .values()
            .filter(|p| p.status == PersonStatus::Active)
            .cloned()
            .collect())
    }

    async fn update_person(&self, id: Uuid, patch: PersonPatch) -> CoreResult<Person> {
        let mut tables = self.tables.write();
        let person = tables
            .persons
            .get_mut(&id)
            .ok_or(CoreError::PersonNotFound(id))?;
        patch.apply(person);
        Ok(person.clone())
    }

    async fn insert_call(&self, call: &Call) -> CoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.persons.contains_key(&call.person_id) {
            return Err(CoreError::PersonNotFound(call.person_id));
        }
        tables.calls.insert(call.id, call.clone());
        Ok(())
    }

    async fn call(&self, id: Uuid) -> CoreResult<Option<Call>> {
        Ok(self.tables.read().calls.get(&id).cloned())
    }

    async fn call_by_provider_id(&self, provider_call_id: &str) -> CoreResult<Option<Call>> {
        Ok(self
            .tables
            .read()
            .calls
            .values()
            .find(|c| c.provider_call_id.as_deref() == Some(provider_call_id))
            .cloned())
    }

    async fn update_call(&self, id: Uuid, patch: CallPatch) -> CoreResult<Call> {
        let mut tables = self.tables.write();
        let call = tables.calls.get_mut(&id).ok_or(CoreError::CallNotFound(id))?;
        patch.apply(call);
        Ok(call.clone())
    }

    async fn recent_calls(
        &self,
        person_id: Uuid,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> CoreResult<Vec<Call>> {
        let mut calls: Vec<Call> = self
            .tables
            .read()
            .calls
            .values()
            .filter(|c| c.person_id == person_id)
            .filter(|c| since.map_or(true, |since| c.scheduled_at >= since))
            .cloned()
            .collect();
        calls.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        calls.truncate(limit);
        Ok(calls)
    }

    async fn insert_assessment(&self, assessment: &Assessment) -> CoreResult<()> {
        let mut tables = self.tables.write();
        if tables
            .assessments
            .values()
            .any(|a| a.call_id == assessment.call_id)
        {
            return Err(CoreError::DuplicateAssessment(assessment.call_id));
        }
        tables.assessments.insert(assessment.id, assessment.clone());
        Ok(())
    }

    async fn assessment_for_call(&self, call_id: Uuid) -> CoreResult<Option<Assessment>> {
        Ok(self
            .tables
            .read()
            .assessments
            .values()
            .find(|a| a.call_id == call_id)
            .cloned())
    }

    async fn latest_assessment(&self, person_id: Uuid) -> CoreResult<Option<Assessment>> {
        Ok(self
            .tables
            .read()
            .assessments
            .values()
            .filter(|a| a.person_id == person_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn set_assessment_score(
        &self,
        assessment_id: Uuid,
        flag: Flag,
        scored_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut tables = self.tables.write();
        let assessment = tables.assessments.get_mut(&assessment_id).ok_or_else(|| {
            CoreError::Store(format!("assessment not found: {assessment_id}"))
        })?;
        assessment.flag = flag;
        assessment.scored_at = Some(scored_at);
        Ok(())
    }

    async fn insert_escalation(&self, escalation: &Escalation) -> CoreResult<()> {
        self.tables.write().escalations.push(escalation.clone());
        Ok(())
    }

    async fn escalations_for_person(&self, person_id: Uuid) -> CoreResult<Vec<Escalation>> {
        Ok(self
            .tables
            .read()
            .escalations
            .iter()
            .filter(|e| e.person_id == person_id)
            .cloned()
            .collect())
    }

    async fn reviewers(&self) -> CoreResult<Vec<Reviewer>> {
        Ok(self.tables.read().reviewers.clone())
    }
}
