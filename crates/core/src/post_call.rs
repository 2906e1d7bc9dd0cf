//! Post-call pipeline: authoritative scoring, escalation, re-chaining and transcript
//! enrichment for a completed call.

use crate::config::CoreConfig;
use crate::escalation::{EscalationService, NewEscalation};
use crate::model::{CallPatch, CallSource, Flag, PersonPatch};
use crate::providers::TranscriptIndex;
use crate::queue::{Job, JobQueue};
use crate::scoring::score;
use crate::store::Store;
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PostCallOutcome {
    /// The call ended before the agent submitted; nothing to score.
    NoAssessment,
    Scored { flag: Flag, escalations: usize },
    /// Redelivered job for an assessment that was already scored.
    AlreadyScored,
}

pub struct PostCallPipeline {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
    escalations: Arc<EscalationService>,
    transcripts: Arc<dyn TranscriptIndex>,
    config: Arc<CoreConfig>,
}

impl PostCallPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        queue: Arc<dyn JobQueue>,
        escalations: Arc<EscalationService>,
        transcripts: Arc<dyn TranscriptIndex>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            store,
            queue,
            escalations,
            transcripts,
            config,
        }
    }

    /// Process a completed call.
    ///
    /// A missing assessment is an expected outcome. Transcript enrichment is started in
    /// the background and does not hold up the chain.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::CallNotFound`] or [`CoreError::PersonNotFound`] for missing
    /// records, or any store, queue or escalation error.
    pub async fn run(&self, call_id: Uuid, now: DateTime<Utc>) -> CoreResult<PostCallOutcome> {
        let call = self
            .store
            .call(call_id)
            .await?
            .ok_or(CoreError::CallNotFound(call_id))?;

        let outcome = match self.store.assessment_for_call(call_id).await? {
            None => {
                info!(%call_id, "no assessment for call");
                self.store
                    .update_person(
                        call.person_id,
                        PersonPatch {
                            last_call_at: Some(now),
                            ..Default::default()
                        },
                    )
                    .await?;
                PostCallOutcome::NoAssessment
            }
            Some(assessment) if assessment.scored_at.is_some() => {
                info!(%call_id, "assessment already scored");
                PostCallOutcome::AlreadyScored
            }
            Some(assessment) => {
                let result = score(&assessment);
                let mut drafts: Vec<NewEscalation> = result
                    .escalations
                    .into_iter()
                    .map(|draft| NewEscalation {
                        person_id: call.person_id,
                        call_id: Some(call_id),
                        tier: draft.tier,
                        reason: draft.reason,
                        details: draft.details,
                    })
                    .collect();
                if let Some(agent) = &assessment.agent_escalation {
                    drafts.push(NewEscalation {
                        person_id: call.person_id,
                        call_id: Some(call_id),
                        tier: agent.tier,
                        reason: format!("Raised during call: {}", agent.reason),
                        details: call.summary.clone(),
                    });
                }

                let count = drafts.len();
                for draft in drafts {
                    self.escalations.create(draft, now).await?;
                }
                // Scored last so a failure above is retried with the escalations re-raised.
                self.store
                    .set_assessment_score(assessment.id, result.flag, now)
                    .await?;
                self.store
                    .update_person(
                        call.person_id,
                        PersonPatch {
                            flag: Some(result.flag),
                            ..Default::default()
                        },
                    )
                    .await?;
                info!(
                    %call_id,
                    placeholder_flag = %assessment.flag,
                    flag = %result.flag,
                    escalations = count,
                    "assessment scored"
                );
                PostCallOutcome::Scored {
                    flag: result.flag,
                    escalations: count,
                }
            }
        };

        if call.source == CallSource::Outbound {
            self.queue.enqueue(Job::ProcessNextCall).await?;
        }

        match (&call.transcript_ref, &call.provider_call_id) {
            (None, Some(provider_call_id)) => {
                let store = self.store.clone();
                let transcripts = self.transcripts.clone();
                let delays = self.config.transcript_poll_delays().to_vec();
                let provider_call_id = provider_call_id.clone();
                tokio::spawn(async move {
                    if let Err(e) =
                        poll_transcript(store, transcripts, call_id, &provider_call_id, &delays).await
                    {
                        warn!(%call_id, "transcript enrichment failed: {e}");
                    }
                });
            }
            (Some(_), _) => info!(%call_id, "transcript already recorded"),
            (None, None) => {}
        }

        Ok(outcome)
    }
}

/// Poll the transcript index, waiting each delay in turn before asking.
///
/// # Returns
///
/// `true` once a transcript reference is stored; `false` when every poll came back empty,
/// which is logged but not escalated.
///
/// # Errors
///
/// Returns an error if the store update fails. Index errors count as an empty poll.
pub async fn poll_transcript(
    store: Arc<dyn Store>,
    transcripts: Arc<dyn TranscriptIndex>,
    call_id: Uuid,
    provider_call_id: &str,
    delays: &[Duration],
) -> CoreResult<bool> {
    for (attempt, delay) in delays.iter().enumerate() {
        tokio::time::sleep(*delay).await;
        match transcripts.find(provider_call_id).await {
            Ok(Some(record)) => {
                let patch = CallPatch {
                    transcript_ref: Some(record.url),
                    ..Default::default()
                };
                store.update_call(call_id, patch).await?;
                info!(%call_id, transcript_id = %record.id, attempt = attempt + 1, "transcript enriched");
                return Ok(true);
            }
            Ok(None) => {}
            Err(e) => warn!(%call_id, attempt = attempt + 1, "transcript lookup failed: {e}"),
        }
    }
    info!(%call_id, attempts = delays.len(), "transcript not available, giving up");
    Ok(false)
}

/// Record a recording-ready callback. Returns `false` for an unknown call.
pub async fn record_recording(
    store: &dyn Store,
    provider_call_id: &str,
    recording_url: &str,
) -> CoreResult<bool> {
    let Some(call) = store.call_by_provider_id(provider_call_id).await? else {
        warn!(%provider_call_id, "recording for unknown call");
        return Ok(false);
    };
    let patch = CallPatch {
        recording_url: Some(recording_url.to_string()),
        ..Default::default()
    };
    store.update_call(call.id, patch).await?;
    info!(call_id = %call.id, "recording stored");
    Ok(true)
}

/// Record a transcript-ready callback. Returns `false` for an unknown call.
pub async fn record_transcript(
    store: &dyn Store,
    provider_call_id: &str,
    transcript_ref: &str,
) -> CoreResult<bool> {
    let Some(call) = store.call_by_provider_id(provider_call_id).await? else {
        warn!(%provider_call_id, "transcript for unknown call");
        return Ok(false);
    };
    let patch = CallPatch {
        transcript_ref: Some(transcript_ref.to_string()),
        ..Default::default()
    };
    store.update_call(call.id, patch).await?;
    info!(call_id = %call.id, "transcript reference stored");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AgentEscalation, Assessment, Call, CallStatus, CallType, CssrsResult, EscalationTier,
        ScheduleFrequency,
    };
    use crate::providers::TranscriptRecord;
    use crate::store::InMemoryStore;
    use crate::testing::{
        config_at, person, utc, RecordingMailer, RecordingQueue, StubTranscriptIndex,
    };

    struct Fixture {
        store: Arc<InMemoryStore>,
        queue: Arc<RecordingQueue>,
        pipeline: PostCallPipeline,
        call: Call,
    }

    async fn fixture(source_inbound: bool) -> Fixture {
        let ada = person("Ada", ScheduleFrequency::Weekly, None);
        let store = Arc::new(InMemoryStore::with_seed(vec![ada.clone()], vec![]));
        let now = utc("2026-05-20T10:00:00Z");
        let mut call = if source_inbound {
            Call::inbound(ada.id, CallType::Standard, "CA1", now)
        } else {
            let mut c = Call::scheduled(ada.id, CallType::Standard, 0, now);
            c.provider_call_id = Some("CA1".into());
            c
        };
        call.status = CallStatus::Completed;
        call.transcript_ref = Some("existing".into());
        store.insert_call(&call).await.unwrap();

        let queue = Arc::new(RecordingQueue::default());
        let escalations = Arc::new(EscalationService::new(
            store.clone(),
            Arc::new(RecordingMailer::default()),
        ));
        let pipeline = PostCallPipeline::new(
            store.clone(),
            queue.clone(),
            escalations,
            Arc::new(StubTranscriptIndex::default()),
            config_at("09:00", "17:00"),
        );
        Fixture {
            store,
            queue,
            pipeline,
            call,
        }
    }

    #[tokio::test]
    async fn missing_assessment_is_not_an_error() {
        let f = fixture(false).await;
        let now = utc("2026-05-20T10:15:00Z");

        let outcome = f.pipeline.run(f.call.id, now).await.unwrap();

        assert_eq!(outcome, PostCallOutcome::NoAssessment);
        let ada = f.store.person(f.call.person_id).await.unwrap().unwrap();
        assert_eq!(ada.last_call_at, Some(now));
        assert!(f.store.escalations_for_person(ada.id).await.unwrap().is_empty());
        assert_eq!(f.queue.immediate(), vec![Job::ProcessNextCall]);
    }

    #[tokio::test]
    async fn scores_overwrite_placeholder_and_raise_escalations() {
        let f = fixture(false).await;
        let now = utc("2026-05-20T10:15:00Z");
        let mut assessment = Assessment::empty(f.call.id, f.call.person_id, now);
        assessment.cssrs_result = Some(CssrsResult::ActiveIdeation);
        assessment.phq2_score = Some(4);
        assessment.flag = Flag::Green;
        assessment.agent_escalation = Some(AgentEscalation {
            tier: EscalationTier::Routine,
            reason: "Asked about a hearing aid".into(),
        });
        f.store.insert_assessment(&assessment).await.unwrap();

        let outcome = f.pipeline.run(f.call.id, now).await.unwrap();

        assert_eq!(
            outcome,
            PostCallOutcome::Scored {
                flag: Flag::Red,
                escalations: 3
            }
        );
        let stored = f.store.assessment_for_call(f.call.id).await.unwrap().unwrap();
        assert_eq!(stored.flag, Flag::Red);
        assert_eq!(stored.scored_at, Some(now));
        let ada = f.store.person(f.call.person_id).await.unwrap().unwrap();
        assert_eq!(ada.flag, Flag::Red);
        let tiers: Vec<EscalationTier> = f
            .store
            .escalations_for_person(ada.id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.tier)
            .collect();
        assert_eq!(
            tiers,
            vec![EscalationTier::Urgent, EscalationTier::Routine, EscalationTier::Routine]
        );
    }

    #[tokio::test]
    async fn redelivery_does_not_duplicate_escalations() {
        let f = fixture(false).await;
        let now = utc("2026-05-20T10:15:00Z");
        let mut assessment = Assessment::empty(f.call.id, f.call.person_id, now);
        assessment.phq2_score = Some(3);
        f.store.insert_assessment(&assessment).await.unwrap();

        f.pipeline.run(f.call.id, now).await.unwrap();
        let again = f.pipeline.run(f.call.id, now).await.unwrap();

        assert_eq!(again, PostCallOutcome::AlreadyScored);
        assert_eq!(
            f.store.escalations_for_person(f.call.person_id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn inbound_calls_do_not_rechain() {
        let f = fixture(true).await;
        f.pipeline.run(f.call.id, utc("2026-05-20T10:15:00Z")).await.unwrap();
        assert!(f.queue.immediate().is_empty());
    }

    #[tokio::test]
    async fn missing_call_fails_the_job() {
        let f = fixture(false).await;
        let err = f.pipeline.run(Uuid::new_v4(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, CoreError::CallNotFound(_)));
    }

    #[tokio::test]
    async fn polling_stores_transcript_once_indexed() {
        let f = fixture(false).await;
        let index = Arc::new(StubTranscriptIndex::with_responses(vec![
            None,
            Some(TranscriptRecord {
                id: "GT1".into(),
                url: "https://transcripts.example.org/GT1".into(),
            }),
        ]));
        let delays = [Duration::ZERO; 4];

        let found = poll_transcript(f.store.clone(), index.clone(), f.call.id, "CA1", &delays)
            .await
            .unwrap();

        assert!(found);
        assert_eq!(index.lookups(), 2);
        let call = f.store.call(f.call.id).await.unwrap().unwrap();
        assert_eq!(
            call.transcript_ref.as_deref(),
            Some("https://transcripts.example.org/GT1")
        );
    }

    #[tokio::test]
    async fn polling_gives_up_after_configured_attempts() {
        let f = fixture(false).await;
        let index = Arc::new(StubTranscriptIndex::default());
        let delays = [Duration::ZERO; 4];

        let found = poll_transcript(f.store.clone(), index.clone(), f.call.id, "CA1", &delays)
            .await
            .unwrap();

        assert!(!found);
        assert_eq!(index.lookups(), 4);
    }

    #[tokio::test]
    async fn callbacks_attach_artifacts() {
        let f = fixture(false).await;
        assert!(record_recording(f.store.as_ref(), "CA1", "https://rec.example.org/RE1")
            .await
            .unwrap());
        assert!(record_transcript(f.store.as_ref(), "CA1", "GT9").await.unwrap());
        assert!(!record_transcript(f.store.as_ref(), "CA404", "GT9").await.unwrap());

        let call = f.store.call(f.call.id).await.unwrap().unwrap();
        assert_eq!(call.recording_url.as_deref(), Some("https://rec.example.org/RE1"));
        assert_eq!(call.transcript_ref.as_deref(), Some("GT9"));
    }
}
