//! Call scheduler.
//!
//! The scheduler places at most one outbound call per invocation. It runs once at window
//! start and is re-invoked after every call outcome, so calls are initiated one at a time
//! until the window closes or nobody is due.

use crate::config::CoreConfig;
use crate::model::{Call, CallType, Person, PersonPatch};
use crate::queue::{Job, JobQueue};
use crate::store::Store;
use crate::window::CallWindow;
use crate::CoreResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

pub struct CallScheduler {
    store: Arc<dyn Store>,
    queue: Arc<dyn JobQueue>,
    config: Arc<CoreConfig>,
}

impl CallScheduler {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn JobQueue>, config: Arc<CoreConfig>) -> Self {
        Self {
            store,
            queue,
            config,
        }
    }

    /// Select the next due person, create a scheduled call and enqueue its initiation.
    ///
    /// # Returns
    ///
    /// `true` if a call was enqueued; `false` outside the call window or when nobody is due.
    ///
    /// # Errors
    ///
    /// Returns an error if the store or queue fails.
    pub async fn schedule_next(&self, now: DateTime<Utc>) -> CoreResult<bool> {
        let window = self.config.window();
        if window.is_past_end(now) {
            info!(at = %now, "call window over for the day, chain stops");
            return Ok(false);
        }
        if !window.is_open(now) {
            info!(at = %now, "call window not yet open");
            return Ok(false);
        }

        let persons = self.store.active_persons().await?;
        let Some(person) = select_due(&persons, now) else {
            info!("no one is due a call");
            return Ok(false);
        };

        let call_type = CallType::for_call_count(person.call_count, self.config.comprehensive_every());
        let call = Call::scheduled(person.id, call_type, 0, now);
        self.store.insert_call(&call).await?;
        // Stamped now so a person whose attempts all miss is not picked again in this chain.
        self.store
            .update_person(
                person.id,
                PersonPatch {
                    last_call_at: Some(now),
                    ..Default::default()
                },
            )
            .await?;
        self.queue.enqueue(Job::ProcessCall { call_id: call.id }).await?;

        info!(
            person_id = %person.id,
            call_id = %call.id,
            call_type = call_type.as_str(),
            "call scheduled"
        );
        Ok(true)
    }
}

/// The due person with the oldest last call; never-called persons come first.
pub fn select_due(persons: &[Person], now: DateTime<Utc>) -> Option<&Person> {
    persons
        .iter()
        .filter(|p| p.is_due(now))
        .min_by_key(|p| p.last_call_at)
}

/// Enqueue `schedule-calls` at every window start, forever.
///
/// If the window is already open when this starts, the chain is kicked off immediately.
pub async fn run_daily_trigger(queue: Arc<dyn JobQueue>, window: CallWindow) {
    if window.is_open(Utc::now()) {
        if let Err(e) = queue.enqueue(Job::ScheduleCalls).await {
            warn!("could not start scheduling chain: {e}");
        }
    }
    loop {
        let now = Utc::now();
        let next = window.next_start_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(next_start = %next, "waiting for call window");
        tokio::time::sleep(wait).await;
        if let Err(e) = queue.enqueue(Job::ScheduleCalls).await {
            warn!("could not start scheduling chain: {e}");
        }
    }
}
