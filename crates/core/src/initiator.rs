//! Outbound call initiation.

use crate::config::CoreConfig;
use crate::model::{CallPatch, CallStatus, PersonStatus};
use crate::providers::{OriginateRequest, Telephony};
use crate::queue::{Job, JobQueue};
use crate::retry::CallOutcomePolicy;
use crate::store::Store;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use wellcall_types::PhoneNumber;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitiateOutcome {
    Started { provider_call_id: String },
    Failed { error: String },
    /// Redelivered job or inactive person; nothing was dialled.
    Skipped,
}

pub struct CallInitiator {
    store: Arc<dyn Store>,
    telephony: Arc<dyn Telephony>,
    policy: Arc<CallOutcomePolicy>,
    queue: Arc<dyn JobQueue>,
    config: Arc<CoreConfig>,
}

impl CallInitiator {
    pub fn new(
        store: Arc<dyn Store>,
        telephony: Arc<dyn Telephony>,
        policy: Arc<CallOutcomePolicy>,
        queue: Arc<dyn JobQueue>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            store,
            telephony,
            policy,
            queue,
            config,
        }
    }

    /// Handle a `process-call` job.
    ///
    /// Calls no longer `scheduled` are skipped so redelivery is harmless. A call whose
    /// person is no longer active is failed and the chain moves on.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CallNotFound`] or [`CoreError::PersonNotFound`] when the job
    /// references missing records, or any store error.
    pub async fn process(&self, call_id: Uuid, now: DateTime<Utc>) -> CoreResult<InitiateOutcome> {
        let call = self
            .store
            .call(call_id)
            .await?
            .ok_or(CoreError::CallNotFound(call_id))?;
        if call.status != CallStatus::Scheduled {
            info!(call_id = %call_id, status = call.status.as_str(), "call already processed, skipping");
            return Ok(InitiateOutcome::Skipped);
        }

        let person = self
            .store
            .person(call.person_id)
            .await?
            .ok_or(CoreError::PersonNotFound(call.person_id))?;
        if person.status != PersonStatus::Active {
            let mut patch = CallPatch::status(CallStatus::Failed);
            patch.error_message = Some("person is no longer active".into());
            patch.completed_at = Some(now);
            self.store.update_call(call_id, patch).await?;
            info!(call_id = %call_id, person_id = %person.id, "person inactive, call dropped");
            self.queue.enqueue(Job::ProcessNextCall).await?;
            return Ok(InitiateOutcome::Skipped);
        }

        self.initiate(call_id, person.id, &person.phone, now).await
    }

    /// Ask the provider to dial `phone` with recording and status callbacks configured.
    ///
    /// On acceptance the provider call id is stored and the call moves to `in-progress`.
    /// A synchronous rejection fails the call with the provider's message and runs the
    /// missed-call policy straight away, since no status callback will follow.
    ///
    /// # Errors
    ///
    /// Returns an error if the store, queue or escalation service fails. Provider failures
    /// are reported through [`InitiateOutcome::Failed`].
    pub async fn initiate(
        &self,
        call_id: Uuid,
        person_id: Uuid,
        phone: &PhoneNumber,
        now: DateTime<Utc>,
    ) -> CoreResult<InitiateOutcome> {
        let request = OriginateRequest {
            to: phone.clone(),
            answer_url: self
                .config
                .webhook_url(&format!("/webhooks/voice?callId={call_id}")),
            status_callback_url: self.config.webhook_url("/webhooks/status"),
            recording_callback_url: self.config.webhook_url("/webhooks/recording"),
            record: true,
            detect_answering_machine: true,
        };

        match self.telephony.originate(request).await {
            Ok(provider_call_id) => {
                let patch = CallPatch {
                    status: Some(CallStatus::InProgress),
                    provider_call_id: Some(provider_call_id.clone()),
                    started_at: Some(now),
                    ..Default::default()
                };
                self.store.update_call(call_id, patch).await?;
                info!(call_id = %call_id, person_id = %person_id, %provider_call_id, "call started");
                Ok(InitiateOutcome::Started { provider_call_id })
            }
            Err(e) => {
                let message = match e {
                    CoreError::Telephony(message) => message,
                    other => other.to_string(),
                };
                error!(call_id = %call_id, person_id = %person_id, "call origination failed: {message}");
                let patch = CallPatch {
                    status: Some(CallStatus::Failed),
                    error_message: Some(message.clone()),
                    completed_at: Some(now),
                    ..Default::default()
                };
                let call = self.store.update_call(call_id, patch).await?;
                self.policy.on_missed(&call, now).await?;
                Ok(InitiateOutcome::Failed { error: message })
            }
        }
    }
}
