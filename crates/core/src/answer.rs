//! Voice-answer resolution: decides what an answered call is connected to.

use crate::config::CoreConfig;
use crate::model::{Call, CallPatch, CallType};
use crate::store::Store;
use crate::voices::{select_voice, VoiceProfile};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use wellcall_types::PhoneNumber;

/// Spoken to callers whose number is not enrolled.
pub const UNKNOWN_CALLER_MESSAGE: &str =
    "Thank you for calling. We couldn't find your number in our records, so please contact \
     your care coordinator. Goodbye.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerPlan {
    /// Bridge the call to a conversation session.
    Connect {
        person_id: Uuid,
        call_id: Uuid,
        call_type: CallType,
        voice: &'static VoiceProfile,
        language: String,
    },
    /// Speak a message and hang up.
    Decline { message: &'static str },
}

pub struct AnswerService {
    store: Arc<dyn Store>,
    config: Arc<CoreConfig>,
}

impl AnswerService {
    pub fn new(store: Arc<dyn Store>, config: Arc<CoreConfig>) -> Self {
        Self { store, config }
    }

    /// Resolve an answered outbound call by its internal id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CallNotFound`] or [`CoreError::PersonNotFound`] for unknown
    /// records.
    pub async fn outbound(&self, call_id: Uuid, provider_call_id: &str) -> CoreResult<AnswerPlan> {
        let call = self
            .store
            .call(call_id)
            .await?
            .ok_or(CoreError::CallNotFound(call_id))?;
        let person = self
            .store
            .person(call.person_id)
            .await?
            .ok_or(CoreError::PersonNotFound(call.person_id))?;

        if call.provider_call_id.is_none() {
            let patch = CallPatch {
                provider_call_id: Some(provider_call_id.to_string()),
                ..Default::default()
            };
            self.store.update_call(call.id, patch).await?;
        }

        Ok(AnswerPlan::Connect {
            person_id: person.id,
            call_id: call.id,
            call_type: call.call_type,
            voice: select_voice(&person),
            language: person.language,
        })
    }

    /// Resolve a call placed by a person to the service.
    ///
    /// Unknown numbers are declined. A person who is due gets a screening call; anyone
    /// else gets a check-in. An in-progress inbound call record is created either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn inbound(
        &self,
        from: &str,
        provider_call_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<AnswerPlan> {
        let person = match PhoneNumber::parse(from) {
            Ok(phone) => self.store.person_by_phone(&phone).await?,
            Err(e) => {
                warn!(%provider_call_id, "inbound caller number unusable: {e}");
                None
            }
        };
        let Some(person) = person else {
            info!(%provider_call_id, "inbound call from unknown number");
            return Ok(AnswerPlan::Decline {
                message: UNKNOWN_CALLER_MESSAGE,
            });
        };

        // Redelivered webhooks reuse the call created on first delivery.
        if let Some(existing) = self.store.call_by_provider_id(provider_call_id).await? {
            if existing.person_id == person.id {
                info!(call_id = %existing.id, %provider_call_id, "voice webhook redelivered");
                return Ok(AnswerPlan::Connect {
                    person_id: person.id,
                    call_id: existing.id,
                    call_type: existing.call_type,
                    voice: select_voice(&person),
                    language: person.language,
                });
            }
            warn!(%provider_call_id, "provider id already belongs to another person's call");
        }

        let call_type = if person.is_due(now) {
            CallType::for_call_count(person.call_count, self.config.comprehensive_every())
        } else {
            CallType::CheckIn
        };
        let call = Call::inbound(person.id, call_type, provider_call_id, now);
        self.store.insert_call(&call).await?;
        info!(
            call_id = %call.id,
            person_id = %person.id,
            call_type = call_type.as_str(),
            "inbound call accepted"
        );

        Ok(AnswerPlan::Connect {
            person_id: person.id,
            call_id: call.id,
            call_type,
            voice: select_voice(&person),
            language: person.language,
        })
    }
}
