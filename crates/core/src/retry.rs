//! Retry and missed-call policy driven by telephony status callbacks.

use crate::config::CoreConfig;
use crate::escalation::{EscalationService, NewEscalation};
use crate::model::{Call, CallPatch, CallSource, CallStatus, EscalationTier};
use crate::queue::{Job, JobQueue};
use crate::store::Store;
use crate::CoreResult;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Call status vocabulary used by the telephony provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderStatus {
    Queued,
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    NoAnswer,
    Failed,
    Canceled,
}

impl ProviderStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "initiated" => Self::Initiated,
            "ringing" => Self::Ringing,
            "in-progress" | "answered" => Self::InProgress,
            "completed" => Self::Completed,
            "busy" => Self::Busy,
            "no-answer" => Self::NoAnswer,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => return None,
        })
    }
}

/// Answering-machine detection results that mean a machine picked up.
const MACHINE_RESULTS: &[&str] = &[
    "machine_start",
    "machine_end_beep",
    "machine_end_silence",
    "machine_end_other",
    "fax",
];

pub fn answered_by_machine(answered_by: Option<&str>) -> bool {
    answered_by.is_some_and(|a| MACHINE_RESULTS.contains(&a.trim().to_ascii_lowercase().as_str()))
}

/// Map a provider status to a call status; `None` for pre-answer progress events.
///
/// A machine detection result maps to `Voicemail` whatever the provider status says.
pub fn map_status(status: ProviderStatus, answered_by: Option<&str>) -> Option<CallStatus> {
    if answered_by_machine(answered_by) {
        return Some(CallStatus::Voicemail);
    }
    match status {
        ProviderStatus::Queued | ProviderStatus::Initiated | ProviderStatus::Ringing => None,
        ProviderStatus::InProgress => Some(CallStatus::InProgress),
        ProviderStatus::Completed => Some(CallStatus::Completed),
        ProviderStatus::Busy | ProviderStatus::NoAnswer => Some(CallStatus::NoAnswer),
        ProviderStatus::Failed | ProviderStatus::Canceled => Some(CallStatus::Failed),
    }
}

/// A status callback from the telephony provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEvent {
    pub provider_call_id: String,
    pub status: String,
    pub duration_secs: Option<u32>,
    pub answered_by: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Unknown call, progress event or duplicate delivery.
    Ignored,
    Updated(CallStatus),
    PostCallQueued,
    Missed(MissOutcome),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MissOutcome {
    Retried { call_id: Uuid, retry_count: u32 },
    GaveUp { consecutive_misses: usize, escalated: bool },
    /// Cancelled calls are not retried.
    Cancelled,
    /// Inbound misses do not take part in the outbound chain.
    NotOutbound,
}

/// Count misses from the newest call backwards, stopping at the first call that reached
/// the person. Calls still `scheduled` are skipped.
pub fn count_consecutive_misses(calls_newest_first: &[Call]) -> usize {
    let mut misses = 0;
    for call in calls_newest_first {
        match call.status {
            CallStatus::Completed | CallStatus::InProgress => break,
            status if status.is_miss() => misses += 1,
            _ => {}
        }
    }
    misses
}

pub struct CallOutcomePolicy {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
    escalations: Arc<EscalationService>,
    config: Arc<CoreConfig>,
}

impl CallOutcomePolicy {
    pub fn new(
        store: Arc<dyn Store>,
        queue: Arc<dyn JobQueue>,
        escalations: Arc<EscalationService>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            store,
            queue,
            escalations,
            config,
        }
    }

    /// Apply a telephony status callback.
    ///
    /// Completed calls queue the post-call pipeline without waiting on it. Misses on
    /// outbound calls are retried or given up on, and the chain moves to the next person.
    ///
    /// # Errors
    ///
    /// Returns an error if the store, queue or escalation service fails.
    pub async fn on_status(&self, event: StatusEvent, now: DateTime<Utc>) -> CoreResult<StatusOutcome> {
        let Some(call) = self.store.call_by_provider_id(&event.provider_call_id).await? else {
            warn!(provider_call_id = %event.provider_call_id, "status for unknown call");
            return Ok(StatusOutcome::Ignored);
        };
        let Some(provider_status) = ProviderStatus::parse(&event.status) else {
            warn!(call_id = %call.id, status = %event.status, "unrecognised provider status");
            return Ok(StatusOutcome::Ignored);
        };
        let Some(status) = map_status(provider_status, event.answered_by.as_deref()) else {
            debug!(call_id = %call.id, status = %event.status, "progress event");
            return Ok(StatusOutcome::Ignored);
        };
        if call.status.is_terminal() {
            info!(
                call_id = %call.id,
                current = call.status.as_str(),
                incoming = status.as_str(),
                "call already settled, ignoring status"
            );
            return Ok(StatusOutcome::Ignored);
        }

        let mut patch = CallPatch::status(status);
        patch.duration_secs = event.duration_secs;
        if status.is_terminal() {
            patch.completed_at = Some(now);
        } else if call.started_at.is_none() {
            patch.started_at = Some(now);
        }
        let call = self.store.update_call(call.id, patch).await?;
        info!(call_id = %call.id, status = status.as_str(), "call status updated");

        match status {
            CallStatus::Completed => {
                self.queue.enqueue(Job::PostCall { call_id: call.id }).await?;
                Ok(StatusOutcome::PostCallQueued)
            }
            s if s.is_miss() => {
                let outcome = if provider_status == ProviderStatus::Canceled
                    && !answered_by_machine(event.answered_by.as_deref())
                {
                    self.rechain(&call).await?;
                    MissOutcome::Cancelled
                } else {
                    self.on_missed(&call, now).await?
                };
                Ok(StatusOutcome::Missed(outcome))
            }
            s => Ok(StatusOutcome::Updated(s)),
        }
    }

    /// Decide what follows a missed outbound call.
    ///
    /// Inside the window and under the retry budget a fresh attempt is queued after the
    /// retry delay. Otherwise the consecutive-miss count is checked, an unreachability
    /// escalation is raised at the threshold, and the chain moves to the next person.
    ///
    /// # Errors
    ///
    /// Returns an error if the store, queue or escalation service fails.
    pub async fn on_missed(&self, call: &Call, now: DateTime<Utc>) -> CoreResult<MissOutcome> {
        if call.source != CallSource::Outbound {
            return Ok(MissOutcome::NotOutbound);
        }

        if call.retry_count < self.config.max_retries() && self.config.window().is_open(now) {
            let retry = Call::scheduled(call.person_id, call.call_type, call.retry_count + 1, now);
            self.store.insert_call(&retry).await?;
            self.queue
                .enqueue_after(Job::ProcessCall { call_id: retry.id }, self.config.retry_delay())
                .await?;
            info!(
                person_id = %call.person_id,
                call_id = %retry.id,
                retry_count = retry.retry_count,
                "missed call, retry queued"
            );
            return Ok(MissOutcome::Retried {
                call_id: retry.id,
                retry_count: retry.retry_count,
            });
        }

        let lookback = self.config.miss_lookback();
        let since = now - ChronoDuration::days(lookback.days);
        let recent = self
            .store
            .recent_calls(call.person_id, Some(since), lookback.max_calls)
            .await?;
        let consecutive_misses = count_consecutive_misses(&recent);
        let escalated = consecutive_misses >= lookback.threshold;
        if escalated {
            self.escalations
                .create(
                    NewEscalation {
                        person_id: call.person_id,
                        call_id: Some(call.id),
                        tier: EscalationTier::Routine,
                        reason: format!("Unreachable: {consecutive_misses} consecutive missed calls"),
                        details: Some(format!(
                            "Last outcome: {}. No answered call in the last {} attempts.",
                            call.status.as_str(),
                            consecutive_misses
                        )),
                    },
                    now,
                )
                .await?;
        }
        info!(
            person_id = %call.person_id,
            consecutive_misses,
            escalated,
            "giving up on person for this window"
        );
        self.rechain(call).await?;
        Ok(MissOutcome::GaveUp {
            consecutive_misses,
            escalated,
        })
    }

    async fn rechain(&self, call: &Call) -> CoreResult<()> {
        if call.source == CallSource::Outbound {
            self.queue.enqueue(Job::ProcessNextCall).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CallType, ScheduleFrequency};
    use crate::store::InMemoryStore;
    use crate::testing::{config_at, person, utc, RecordingMailer, RecordingQueue};

    struct Fixture {
        store: Arc<InMemoryStore>,
        queue: Arc<RecordingQueue>,
        policy: CallOutcomePolicy,
        person_id: Uuid,
    }

    fn fixture() -> Fixture {
        let ada = person("Ada", ScheduleFrequency::Weekly, None);
        let person_id = ada.id;
        let store = Arc::new(InMemoryStore::with_seed(vec![ada], vec![]));
        let queue = Arc::new(RecordingQueue::default());
        let escalations = Arc::new(EscalationService::new(
            store.clone(),
            Arc::new(RecordingMailer::default()),
        ));
        let policy = CallOutcomePolicy::new(
            store.clone(),
            queue.clone(),
            escalations,
            config_at("09:00", "17:00"),
        );
        Fixture {
            store,
            queue,
            policy,
            person_id,
        }
    }

    async fn in_progress_call(f: &Fixture, retry_count: u32, sid: &str, at: DateTime<Utc>) -> Call {
        let mut call = Call::scheduled(f.person_id, CallType::Standard, retry_count, at);
        call.status = CallStatus::InProgress;
        call.provider_call_id = Some(sid.into());
        f.store.insert_call(&call).await.unwrap();
        call
    }

    async fn settled_call(f: &Fixture, status: CallStatus, at: DateTime<Utc>) {
        let mut call = Call::scheduled(f.person_id, CallType::Standard, 0, at);
        call.status = status;
        f.store.insert_call(&call).await.unwrap();
    }

    fn event(sid: &str, status: &str, answered_by: Option<&str>) -> StatusEvent {
        StatusEvent {
            provider_call_id: sid.into(),
            status: status.into(),
            duration_secs: None,
            answered_by: answered_by.map(String::from),
        }
    }

    #[test]
    fn machine_detection_overrides_provider_status() {
        assert_eq!(
            map_status(ProviderStatus::Completed, Some("machine_end_beep")),
            Some(CallStatus::Voicemail)
        );
        assert_eq!(map_status(ProviderStatus::Completed, Some("human")), Some(CallStatus::Completed));
        assert_eq!(map_status(ProviderStatus::Busy, None), Some(CallStatus::NoAnswer));
        assert_eq!(map_status(ProviderStatus::Ringing, None), None);
    }

    #[test]
    fn consecutive_miss_scan_stops_at_reached_call() {
        let pid = Uuid::new_v4();
        let now = utc("2026-05-20T10:00:00Z");
        let with = |status| {
            let mut c = Call::scheduled(pid, CallType::Standard, 0, now);
            c.status = status;
            c
        };
        let three = [
            with(CallStatus::NoAnswer),
            with(CallStatus::Voicemail),
            with(CallStatus::Failed),
        ];
        assert_eq!(count_consecutive_misses(&three), 3);

        let broken = [
            with(CallStatus::NoAnswer),
            with(CallStatus::NoAnswer),
            with(CallStatus::Completed),
            with(CallStatus::NoAnswer),
        ];
        assert_eq!(count_consecutive_misses(&broken), 2);

        let skips_scheduled = [with(CallStatus::Scheduled), with(CallStatus::NoAnswer)];
        assert_eq!(count_consecutive_misses(&skips_scheduled), 1);
    }

    #[tokio::test]
    async fn first_miss_in_window_queues_one_retry() {
        let f = fixture();
        let now = utc("2026-05-20T10:00:00Z");
        in_progress_call(&f, 0, "CA1", now).await;

        let outcome = f.policy.on_status(event("CA1", "no-answer", None), now).await.unwrap();

        let StatusOutcome::Missed(MissOutcome::Retried { call_id, retry_count }) = outcome else {
            panic!("expected a retry, got {outcome:?}");
        };
        assert_eq!(retry_count, 1);
        assert_eq!(
            f.queue.delayed(),
            vec![(Job::ProcessCall { call_id }, f.policy.config.retry_delay())]
        );
        assert!(f.queue.immediate().is_empty());
        let retry = f.store.call(call_id).await.unwrap().unwrap();
        assert_eq!(retry.status, CallStatus::Scheduled);
        assert_eq!(retry.retry_count, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_escalate_after_three_misses() {
        let f = fixture();
        let now = utc("2026-05-20T10:30:00Z");
        settled_call(&f, CallStatus::NoAnswer, utc("2026-05-20T10:00:00Z")).await;
        settled_call(&f, CallStatus::NoAnswer, utc("2026-05-20T10:15:00Z")).await;
        in_progress_call(&f, 2, "CA3", now).await;

        let outcome = f.policy.on_status(event("CA3", "no-answer", None), now).await.unwrap();

        assert_eq!(
            outcome,
            StatusOutcome::Missed(MissOutcome::GaveUp {
                consecutive_misses: 3,
                escalated: true
            })
        );
        assert!(f.queue.delayed().is_empty());
        assert_eq!(f.queue.immediate(), vec![Job::ProcessNextCall]);
        let escalations = f.store.escalations_for_person(f.person_id).await.unwrap();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].tier, EscalationTier::Routine);
    }

    #[tokio::test]
    async fn misses_after_a_completed_call_do_not_escalate() {
        let f = fixture();
        let now = utc("2026-05-20T10:30:00Z");
        settled_call(&f, CallStatus::Completed, utc("2026-05-13T10:00:00Z")).await;
        settled_call(&f, CallStatus::NoAnswer, utc("2026-05-20T10:00:00Z")).await;
        in_progress_call(&f, 2, "CA3", now).await;

        f.policy.on_status(event("CA3", "busy", None), now).await.unwrap();

        assert!(f.store.escalations_for_person(f.person_id).await.unwrap().is_empty());
        assert_eq!(f.queue.immediate(), vec![Job::ProcessNextCall]);
    }

    #[tokio::test]
    async fn miss_after_window_end_gives_up_without_retry() {
        let f = fixture();
        let now = utc("2026-05-20T17:05:00Z");
        in_progress_call(&f, 0, "CA1", now).await;

        let outcome = f.policy.on_status(event("CA1", "no-answer", None), now).await.unwrap();

        assert!(matches!(
            outcome,
            StatusOutcome::Missed(MissOutcome::GaveUp { escalated: false, .. })
        ));
        assert!(f.queue.delayed().is_empty());
        assert_eq!(f.queue.immediate(), vec![Job::ProcessNextCall]);
    }

    #[tokio::test]
    async fn completed_human_call_queues_post_call() {
        let f = fixture();
        let now = utc("2026-05-20T10:00:00Z");
        let call = in_progress_call(&f, 0, "CA1", now).await;

        let mut completed = event("CA1", "completed", Some("human"));
        completed.duration_secs = Some(312);
        let outcome = f.policy.on_status(completed, now).await.unwrap();

        assert_eq!(outcome, StatusOutcome::PostCallQueued);
        assert_eq!(f.queue.immediate(), vec![Job::PostCall { call_id: call.id }]);
        let stored = f.store.call(call.id).await.unwrap().unwrap();
        assert_eq!(stored.duration_secs, Some(312));
        assert_eq!(stored.completed_at, Some(now));
    }

    #[tokio::test]
    async fn voicemail_is_a_miss_even_when_completed() {
        let f = fixture();
        let now = utc("2026-05-20T10:00:00Z");
        let call = in_progress_call(&f, 0, "CA1", now).await;

        let outcome = f
            .policy
            .on_status(event("CA1", "completed", Some("machine_start")), now)
            .await
            .unwrap();

        assert!(matches!(outcome, StatusOutcome::Missed(MissOutcome::Retried { .. })));
        let stored = f.store.call(call.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CallStatus::Voicemail);
    }

    #[tokio::test]
    async fn cancelled_call_is_not_retried_but_chain_continues() {
        let f = fixture();
        let now = utc("2026-05-20T10:00:00Z");
        in_progress_call(&f, 0, "CA1", now).await;

        let outcome = f.policy.on_status(event("CA1", "canceled", None), now).await.unwrap();

        assert_eq!(outcome, StatusOutcome::Missed(MissOutcome::Cancelled));
        assert!(f.queue.delayed().is_empty());
        assert_eq!(f.queue.immediate(), vec![Job::ProcessNextCall]);
    }

    #[tokio::test]
    async fn duplicate_terminal_status_is_ignored() {
        let f = fixture();
        let now = utc("2026-05-20T10:00:00Z");
        in_progress_call(&f, 0, "CA1", now).await;

        f.policy.on_status(event("CA1", "no-answer", None), now).await.unwrap();
        let again = f.policy.on_status(event("CA1", "no-answer", None), now).await.unwrap();

        assert_eq!(again, StatusOutcome::Ignored);
        assert_eq!(f.queue.delayed().len(), 1);
    }

    #[tokio::test]
    async fn inbound_miss_does_not_rechain() {
        let f = fixture();
        let now = utc("2026-05-20T10:00:00Z");
        let call = Call::inbound(f.person_id, CallType::CheckIn, "CA9", now);
        f.store.insert_call(&call).await.unwrap();

        let outcome = f.policy.on_status(event("CA9", "failed", None), now).await.unwrap();

        assert_eq!(outcome, StatusOutcome::Missed(MissOutcome::NotOutbound));
        assert!(f.queue.immediate().is_empty());
    }

    #[tokio::test]
    async fn unknown_provider_call_is_ignored() {
        let f = fixture();
        let outcome = f
            .policy
            .on_status(event("CA404", "completed", None), utc("2026-05-20T10:00:00Z"))
            .await
            .unwrap();
        assert_eq!(outcome, StatusOutcome::Ignored);
    }
}
