//! Conversation session engine.
//!
//! Drives one interview per live transport connection. The conversational model produces
//! each turn; when it invokes the submission tool the whole transcript is re-scored by the
//! scoring model and the result is persisted before the call is ended.

use super::memory::{memory_digest, previous_completed};
use super::phase::PhaseTracker;
use super::prompts::{conversation_system, scoring_system, PromptContext};
use super::session::{Session, SessionRegistry};
use super::tools::{parse_submission, submission_tool, tool_specs, Submission};
use crate::config::CoreConfig;
use crate::constants::{
    APOLOGY_UTTERANCE, DEFAULT_GOODBYE, OPENING_MAX_TOKENS, SCORING_MAX_TOKENS, TURN_MAX_TOKENS,
};
use crate::escalation::{EscalationService, NewEscalation};
use crate::model::{CallPatch, EscalationTier, PersonPatch};
use crate::providers::{ChatMessage, LanguageModel, ModelRequest, ToolCall, ToolChoice};
use crate::store::Store;
use crate::voices::select_voice;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifiers a transport connection is authorised for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionGrant {
    pub person_id: Uuid,
    pub call_id: Uuid,
}

/// What the transport should do after an event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub say: String,
    /// End the call once this grace period has passed.
    pub end_after: Option<Duration>,
}

impl Reply {
    fn say(text: impl Into<String>) -> Self {
        Self {
            say: text.into(),
            end_after: None,
        }
    }
}

pub struct ConversationEngine {
    store: Arc<dyn Store>,
    conversational: Arc<dyn LanguageModel>,
    scorer: Arc<dyn LanguageModel>,
    escalations: Arc<EscalationService>,
    sessions: Arc<SessionRegistry>,
    config: Arc<CoreConfig>,
}

impl ConversationEngine {
    pub fn new(
        store: Arc<dyn Store>,
        conversational: Arc<dyn LanguageModel>,
        scorer: Arc<dyn LanguageModel>,
        escalations: Arc<EscalationService>,
        sessions: Arc<SessionRegistry>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            store,
            conversational,
            scorer,
            escalations,
            sessions,
            config,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Open a session for a newly connected call and produce the opening utterance.
    ///
    /// The call's provider id and start time are filled in if the initiator has not
    /// already recorded them.
    ///
    /// # Errors
    ///
    /// Returns an error if the person or call cannot be loaded, or if a session is already
    /// live for `provider_call_id`.
    pub async fn on_setup(
        &self,
        grant: SessionGrant,
        provider_call_id: &str,
        now: DateTime<Utc>,
    ) -> CoreResult<Reply> {
        if self.sessions.contains(provider_call_id) {
            return Err(CoreError::InvalidInput(format!(
                "session already live for {provider_call_id}"
            )));
        }

        let (person, call, recent, last_assessment) = tokio::try_join!(
            self.store.person(grant.person_id),
            self.store.call(grant.call_id),
            self.store.recent_calls(grant.person_id, None, 5),
            self.store.latest_assessment(grant.person_id),
        )?;
        let person = person.ok_or(CoreError::PersonNotFound(grant.person_id))?;
        let call = call.ok_or(CoreError::CallNotFound(grant.call_id))?;

        // The transport can connect before the initiator has stored the provider id.
        let patch = CallPatch {
            provider_call_id: (call.provider_call_id.as_deref() != Some(provider_call_id))
                .then(|| provider_call_id.to_string()),
            started_at: call.started_at.is_none().then_some(now),
            ..Default::default()
        };
        if patch != CallPatch::default() {
            self.store.update_call(call.id, patch).await?;
        }

        let memory = memory_digest(
            &person,
            previous_completed(&recent, call.id),
            last_assessment.as_ref(),
        );
        let first_name = person.name.first_word().to_string();
        let persona = select_voice(&person).persona;

        let mut session = Session {
            call_id: call.id,
            person_id: person.id,
            provider_call_id: provider_call_id.to_string(),
            first_name,
            persona,
            call_type: call.call_type,
            tracker: PhaseTracker::new(call.call_type),
            history: Vec::new(),
            memory,
            completed: false,
        };

        let request = ModelRequest {
            system: self.system_prompt(&session),
            messages: Vec::new(),
            tools: Vec::new(),
            tool_choice: ToolChoice::Auto,
            max_tokens: OPENING_MAX_TOKENS,
        };
        let opening = match self.conversational.complete(request).await {
            Ok(reply) if !reply.text.trim().is_empty() => reply.text,
            Ok(_) => fallback_opening(&session),
            Err(e) => {
                warn!(call_id = %call.id, "opening generation failed: {e}");
                fallback_opening(&session)
            }
        };
        session.push_agent(&opening);
        session.tracker.observe_agent(&opening);

        info!(
            call_id = %session.call_id,
            person_id = %session.person_id,
            call_type = session.call_type.as_str(),
            persona,
            "conversation session opened"
        );
        if !self.sessions.insert(session) {
            return Err(CoreError::InvalidInput(format!(
                "session already live for {provider_call_id}"
            )));
        }
        Ok(Reply::say(opening))
    }

    /// Handle a recognised utterance.
    ///
    /// Returns `None` when nothing should be sent: a partial transcript, an unknown
    /// session, a session that has already submitted, or a session closed while the model
    /// was answering. Model failures produce an apology rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if persisting a completed call fails.
    pub async fn on_prompt(
        &self,
        provider_call_id: &str,
        text: &str,
        last: bool,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<Reply>> {
        if !last {
            return Ok(None);
        }
        let Some(handle) = self.sessions.get(provider_call_id) else {
            warn!(%provider_call_id, "prompt for unknown session dropped");
            return Ok(None);
        };
        let mut session = handle.lock().await;
        if session.completed {
            debug!(call_id = %session.call_id, "prompt after submission ignored");
            return Ok(None);
        }

        session.push_person(text);
        let request = ModelRequest {
            system: self.system_prompt(&session),
            messages: session.history.clone(),
            tools: tool_specs(session.call_type),
            tool_choice: ToolChoice::Auto,
            max_tokens: TURN_MAX_TOKENS,
        };
        let outcome = self.conversational.complete(request).await;

        if !self.sessions.contains(provider_call_id) {
            debug!(call_id = %session.call_id, "session closed during turn, reply discarded");
            return Ok(None);
        }

        let reply = match outcome {
            Err(e) => {
                warn!(call_id = %session.call_id, "turn generation failed: {e}");
                return Ok(Some(Reply::say(APOLOGY_UTTERANCE)));
            }
            Ok(reply) => reply,
        };

        if let Some(tool) = reply.tool_call {
            return self
                .complete_call(&mut session, &reply.text, tool, now)
                .await
                .map(Some);
        }

        if reply.text.trim().is_empty() {
            return Ok(Some(Reply::say(APOLOGY_UTTERANCE)));
        }
        session.push_agent(&reply.text);
        if let Some(phase) = session.tracker.observe_agent(&reply.text) {
            info!(call_id = %session.call_id, %phase, "conversation phase advanced");
        }
        Ok(Some(Reply::say(reply.text)))
    }

    /// The person talked over the agent; keep only what they heard.
    pub async fn on_interrupt(&self, provider_call_id: &str, heard: &str) {
        if let Some(handle) = self.sessions.get(provider_call_id) {
            handle.lock().await.truncate_last_agent(heard);
        }
    }

    pub fn on_dtmf(&self, provider_call_id: &str, digit: &str) {
        info!(%provider_call_id, digit, "dtmf received");
    }

    /// Tear down the session and record the last contact time.
    pub async fn on_close(&self, provider_call_id: &str, now: DateTime<Utc>) {
        let Some(person_id) = self.sessions.remove(provider_call_id) else {
            return;
        };
        let patch = PersonPatch {
            last_contact_at: Some(now),
            ..Default::default()
        };
        if let Err(e) = self.store.update_person(person_id, patch).await {
            warn!(%person_id, "could not record last contact: {e}");
        }
        info!(%provider_call_id, "conversation session closed");
    }

    fn system_prompt(&self, session: &Session) -> String {
        let ctx = PromptContext {
            first_name: &session.first_name,
            persona: session.persona,
            call_type: session.call_type,
            memory: &session.memory,
        };
        conversation_system(&ctx, session.tracker.phase())
    }

    async fn complete_call(
        &self,
        session: &mut Session,
        closing_text: &str,
        tool: ToolCall,
        now: DateTime<Utc>,
    ) -> CoreResult<Reply> {
        let goodbye = if closing_text.trim().is_empty() {
            DEFAULT_GOODBYE.to_string()
        } else {
            closing_text.to_string()
        };
        session.push_agent(&goodbye);
        session.completed = true;
        session.tracker.finish();

        let submission = if session.call_type.is_screening() {
            self.authoritative_submission(session, &tool).await
        } else {
            parse_submission(session.call_type, &tool)
                .map_err(|e| warn!(call_id = %session.call_id, "check-in summary rejected: {e}"))
                .ok()
        };

        match submission {
            Some(submission) => self.persist(session, submission, now).await?,
            None => warn!(call_id = %session.call_id, "no valid submission, nothing persisted"),
        }

        Ok(Reply {
            say: goodbye,
            end_after: Some(self.config.end_call_grace()),
        })
    }

    /// Re-score the full transcript with the scoring model, falling back to the
    /// conversational model's own submission when that fails.
    async fn authoritative_submission(&self, session: &Session, tool: &ToolCall) -> Option<Submission> {
        let fallback = parse_submission(session.call_type, tool);

        let mut messages = session.history.clone();
        messages.push(ChatMessage::user(
            "The call has ended. Record the assessment for this conversation.",
        ));
        let request = ModelRequest {
            system: scoring_system(session.call_type),
            messages,
            tools: tool_specs(session.call_type),
            tool_choice: ToolChoice::Required(submission_tool(session.call_type).to_string()),
            max_tokens: SCORING_MAX_TOKENS,
        };
        let scored = match self.scorer.complete(request).await {
            Ok(reply) => reply
                .tool_call
                .ok_or_else(|| CoreError::Model("scoring model returned no tool call".into()))
                .and_then(|call| parse_submission(session.call_type, &call)),
            Err(e) => Err(e),
        };

        match (scored, fallback) {
            (Ok(submission), _) => Some(submission),
            (Err(e), Ok(submission)) => {
                warn!(call_id = %session.call_id, "scoring model failed, using conversational submission: {e}");
                Some(submission)
            }
            (Err(scoring), Err(conversational)) => {
                warn!(
                    call_id = %session.call_id,
                    "no usable assessment: scoring: {scoring}; conversational: {conversational}"
                );
                None
            }
        }
    }

    async fn persist(&self, session: &Session, submission: Submission, now: DateTime<Utc>) -> CoreResult<()> {
        let summary_patch = CallPatch {
            summary: Some(submission.summary().trim().to_string()),
            ..Default::default()
        };
        self.store.update_call(session.call_id, summary_patch).await?;

        match submission.to_assessment(session.call_id, session.person_id, now) {
            Some(assessment) => {
                match self.store.insert_assessment(&assessment).await {
                    Ok(()) => {}
                    Err(CoreError::DuplicateAssessment(call_id)) => {
                        info!(%call_id, "assessment already stored for call");
                        return Ok(());
                    }
                    Err(e) => return Err(e),
                }
                self.store
                    .update_person(
                        session.person_id,
                        PersonPatch {
                            last_call_at: Some(now),
                            last_contact_at: Some(now),
                            increment_call_count: true,
                            ..Default::default()
                        },
                    )
                    .await?;
                info!(
                    call_id = %session.call_id,
                    placeholder_flag = %assessment.flag,
                    "assessment stored"
                );
            }
            None => {
                self.store
                    .update_person(
                        session.person_id,
                        PersonPatch {
                            last_contact_at: Some(now),
                            ..Default::default()
                        },
                    )
                    .await?;
                if let Submission::CheckIn(input) = &submission {
                    if input.concerns_noted {
                        self.escalations
                            .create(
                                NewEscalation {
                                    person_id: session.person_id,
                                    call_id: Some(session.call_id),
                                    tier: EscalationTier::Routine,
                                    reason: "Concern raised during check-in call".into(),
                                    details: input
                                        .concern_detail
                                        .clone()
                                        .or_else(|| Some(input.summary.clone())),
                                },
                                now,
                            )
                            .await?;
                    }
                }
                info!(call_id = %session.call_id, "check-in summary stored");
            }
        }
        Ok(())
    }
}

fn fallback_opening(session: &Session) -> String {
    format!(
        "Hello {}, it's {} calling from the care team. How are you today?",
        session.first_name, session.persona
    )
}
