//! Job queue and worker loop.
//!
//! Jobs are delivered at least once. A handler that returns an error is retried with a
//! linear backoff until the attempt budget runs out, after which the job is dead-lettered
//! to the error log.

use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// A unit of orchestration work.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload", rename_all = "kebab-case")]
pub enum Job {
    /// Window-start trigger; starts the scheduling chain.
    ScheduleCalls,
    #[serde(rename_all = "camelCase")]
    ProcessCall { call_id: Uuid },
    #[serde(rename_all = "camelCase")]
    PostCall { call_id: Uuid },
    /// Re-chain after a call outcome.
    ProcessNextCall,
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::ScheduleCalls => "schedule-calls",
            Job::ProcessCall { .. } => "process-call",
            Job::PostCall { .. } => "post-call",
            Job::ProcessNextCall => "process-next-call",
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> CoreResult<()>;

    /// Deliver `job` once `delay` has elapsed.
    async fn enqueue_after(&self, job: Job, delay: Duration) -> CoreResult<()>;
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> CoreResult<()>;
}

#[derive(Debug)]
struct Envelope {
    job: Job,
    attempt: u32,
}

/// In-process queue backed by an unbounded channel.
#[derive(Clone)]
pub struct LocalQueue {
    tx: mpsc::UnboundedSender<Envelope>,
}

/// Receiving half of a [`LocalQueue`], consumed by [`QueueWorker`].
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl LocalQueue {
    pub fn new() -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, JobReceiver { rx })
    }

    fn send(&self, envelope: Envelope) -> CoreResult<()> {
        self.tx
            .send(envelope)
            .map_err(|e| CoreError::Queue(format!("queue closed, dropped {}", e.0.job.name())))
    }

    fn send_after(&self, envelope: Envelope, delay: Duration) {
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let name = envelope.job.name();
            if let Err(e) = queue.send(envelope) {
                warn!(job = name, "delayed job lost: {e}");
            }
        });
    }
}

#[async_trait]
impl JobQueue for LocalQueue {
    async fn enqueue(&self, job: Job) -> CoreResult<()> {
        debug!(job = job.name(), "enqueue");
        self.send(Envelope { job, attempt: 1 })
    }

    async fn enqueue_after(&self, job: Job, delay: Duration) -> CoreResult<()> {
        debug!(job = job.name(), delay_secs = delay.as_secs(), "enqueue delayed");
        if self.tx.is_closed() {
            return Err(CoreError::Queue(format!("queue closed, dropped {}", job.name())));
        }
        self.send_after(Envelope { job, attempt: 1 }, delay);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct WorkerOptions {
    /// Jobs handled in parallel.
    pub concurrency: usize,
    /// Total attempts per job, including the first.
    pub max_attempts: u32,
    /// Retry delay per attempt already made.
    pub backoff: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_attempts: 3,
            backoff: Duration::from_secs(10),
        }
    }
}

pub struct QueueWorker {
    queue: LocalQueue,
    receiver: JobReceiver,
    handler: Arc<dyn JobHandler>,
    options: WorkerOptions,
}

impl QueueWorker {
    pub fn new(
        queue: LocalQueue,
        receiver: JobReceiver,
        handler: Arc<dyn JobHandler>,
        options: WorkerOptions,
    ) -> Self {
        Self {
            queue,
            receiver,
            handler,
            options,
        }
    }

    /// Pull jobs until every sender is gone.
    pub async fn run(self) {
        let Self {
            queue,
            mut receiver,
            handler,
            options,
        } = self;
        let permits = Arc::new(Semaphore::new(options.concurrency.max(1)));
        // Retries re-enter through a weak handle so the loop ends once producers are gone.
        let retry_tx = queue.tx.downgrade();
        drop(queue);

        while let Some(envelope) = receiver.rx.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let handler = handler.clone();
            let retry_tx = retry_tx.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let Envelope { job, attempt } = envelope;
                let Err(e) = handler.handle(&job).await else {
                    return;
                };
                if attempt >= options.max_attempts {
                    error!(job = job.name(), attempts = attempt, payload = ?job, "job dead-lettered: {e}");
                    return;
                }
                warn!(job = job.name(), attempt, "job failed, will retry: {e}");
                let Some(tx) = retry_tx.upgrade() else {
                    error!(job = job.name(), "queue closed before retry: {e}");
                    return;
                };
                LocalQueue { tx }.send_after(
                    Envelope {
                        job,
                        attempt: attempt + 1,
                    },
                    options.backoff * attempt,
                );
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FlakyHandler {
        fail_first: usize,
        attempts: AtomicUsize,
        seen: Mutex<Vec<Job>>,
        done: Option<mpsc::UnboundedSender<()>>,
    }

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(&self, job: &Job) -> CoreResult<()> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().push(job.clone());
            if let Some(done) = &self.done {
                let _ = done.send(());
            }
            if n < self.fail_first {
                Err(CoreError::Queue("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    fn fast() -> WorkerOptions {
        WorkerOptions {
            concurrency: 2,
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    async fn wait_for(done: &mut mpsc::UnboundedReceiver<()>, n: usize) {
        for _ in 0..n {
            tokio::time::timeout(Duration::from_secs(2), done.recv())
                .await
                .expect("handler should be invoked")
                .expect("channel open");
        }
    }

    #[test]
    fn job_wire_format_uses_task_names() {
        let id = Uuid::nil();
        let json = serde_json::to_value(Job::ProcessCall { call_id: id }).unwrap();
        assert_eq!(json["name"], "process-call");
        assert_eq!(json["payload"]["callId"], id.to_string());
        let parsed: Job = serde_json::from_str(r#"{"name":"process-next-call"}"#).unwrap();
        assert_eq!(parsed, Job::ProcessNextCall);
    }

    #[tokio::test]
    async fn failed_job_is_retried_until_it_succeeds() {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(FlakyHandler {
            fail_first: 2,
            done: Some(done_tx),
            ..Default::default()
        });
        let (queue, receiver) = LocalQueue::new();
        queue.enqueue(Job::ScheduleCalls).await.unwrap();
        tokio::spawn(QueueWorker::new(queue.clone(), receiver, handler.clone(), fast()).run());

        wait_for(&mut done_rx, 3).await;
        assert_eq!(handler.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn job_is_dead_lettered_after_max_attempts() {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(FlakyHandler {
            fail_first: usize::MAX,
            done: Some(done_tx),
            ..Default::default()
        });
        let (queue, receiver) = LocalQueue::new();
        queue.enqueue(Job::ProcessNextCall).await.unwrap();
        tokio::spawn(QueueWorker::new(queue.clone(), receiver, handler.clone(), fast()).run());

        wait_for(&mut done_rx, 3).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn delayed_jobs_arrive_after_immediate_ones() {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let handler = Arc::new(FlakyHandler {
            done: Some(done_tx),
            ..Default::default()
        });
        let (queue, receiver) = LocalQueue::new();
        queue
            .enqueue_after(Job::ProcessNextCall, Duration::from_millis(30))
            .await
            .unwrap();
        queue.enqueue(Job::ScheduleCalls).await.unwrap();
        tokio::spawn(QueueWorker::new(queue.clone(), receiver, handler.clone(), fast()).run());

        wait_for(&mut done_rx, 2).await;
        assert_eq!(
            *handler.seen.lock(),
            vec![Job::ScheduleCalls, Job::ProcessNextCall]
        );
    }
}
