use crate::initiator::CallInitiator;
use crate::post_call::PostCallPipeline;
use crate::queue::{Job, JobHandler};
use crate::scheduler::CallScheduler;
use crate::CoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Routes queued jobs to the scheduler, initiator and post-call pipeline.
pub struct JobDispatcher {
    scheduler: Arc<CallScheduler>,
    initiator: Arc<CallInitiator>,
    post_call: Arc<PostCallPipeline>,
    clock: fn() -> DateTime<Utc>,
}

impl JobDispatcher {
    pub fn new(
        scheduler: Arc<CallScheduler>,
        initiator: Arc<CallInitiator>,
        post_call: Arc<PostCallPipeline>,
    ) -> Self {
        Self {
            scheduler,
            initiator,
            post_call,
            clock: Utc::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }
}

#[async_trait]
impl JobHandler for JobDispatcher {
    async fn handle(&self, job: &Job) -> CoreResult<()> {
        let now = (self.clock)();
        match job {
            Job::ScheduleCalls | Job::ProcessNextCall => {
                let scheduled = self.scheduler.schedule_next(now).await?;
                info!(job = job.name(), scheduled, "scheduler ran");
            }
            Job::ProcessCall { call_id } => {
                let outcome = self.initiator.process(*call_id, now).await?;
                info!(job = job.name(), %call_id, ?outcome, "initiation handled");
            }
            Job::PostCall { call_id } => {
                let outcome = self.post_call.run(*call_id, now).await?;
                info!(job = job.name(), %call_id, ?outcome, "post-call handled");
            }
        }
        Ok(())
    }
}
