//! Test fixtures and in-process doubles for the external collaborators.

use crate::config::CoreConfig;
use crate::model::{Flag, Person, PersonStatus, ScheduleFrequency, VoicePreference};
use crate::providers::{
    Email, LanguageModel, Mailer, ModelReply, ModelRequest, OriginateRequest, Telephony,
    TranscriptIndex, TranscriptRecord,
};
use crate::queue::{Job, JobQueue};
use crate::window::CallWindow;
use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;
use wellcall_types::{NonEmptyText, PhoneNumber};

pub(crate) fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

pub(crate) fn person(
    name: &str,
    schedule: ScheduleFrequency,
    last_call_at: Option<DateTime<Utc>>,
) -> Person {
    let id = Uuid::new_v4();
    let phone = format!("+4477009{:05}", id.as_u128() % 100_000);
    Person {
        id,
        coordinator_id: Uuid::new_v4(),
        name: NonEmptyText::new(name).expect("non-empty name"),
        phone: PhoneNumber::parse(phone).expect("valid phone"),
        status: PersonStatus::Active,
        schedule,
        flag: Flag::Green,
        last_call_at,
        last_contact_at: None,
        call_count: 0,
        care_notes: None,
        language: "en-GB".into(),
        voice: VoicePreference::default(),
    }
}

/// Config with a UTC call window and the default pacing.
pub(crate) fn config_at(start: &str, end: &str) -> Arc<CoreConfig> {
    let window = CallWindow::parse(start, end, "UTC").expect("valid window");
    Arc::new(CoreConfig::new("https://calls.example.org", window).expect("valid config"))
}

#[derive(Default)]
pub(crate) struct RecordingQueue {
    immediate: Mutex<Vec<Job>>,
    delayed: Mutex<Vec<(Job, Duration)>>,
}

impl RecordingQueue {
    pub(crate) fn immediate(&self) -> Vec<Job> {
        self.immediate.lock().clone()
    }

    pub(crate) fn take_immediate(&self) -> Vec<Job> {
        std::mem::take(&mut *self.immediate.lock())
    }

    pub(crate) fn delayed(&self) -> Vec<(Job, Duration)> {
        self.delayed.lock().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: Job) -> CoreResult<()> {
        self.immediate.lock().push(job);
        Ok(())
    }

    async fn enqueue_after(&self, job: Job, delay: Duration) -> CoreResult<()> {
        self.delayed.lock().push((job, delay));
        Ok(())
    }
}

/// Language model that replays queued replies in order.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<CoreResult<ModelReply>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub(crate) fn push(&self, reply: CoreResult<ModelReply>) {
        self.replies.lock().push_back(reply);
    }

    pub(crate) fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: ModelRequest) -> CoreResult<ModelReply> {
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(CoreError::Model("script exhausted".into())))
    }
}

/// Scripted model whose next request can be held until the test releases it.
#[derive(Default)]
pub(crate) struct GatedModel {
    script: ScriptedModel,
    hold: AtomicBool,
    held: Notify,
    released: Notify,
}

impl GatedModel {
    pub(crate) fn push(&self, reply: CoreResult<ModelReply>) {
        self.script.push(reply);
    }

    pub(crate) fn hold_next(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub(crate) async fn wait_held(&self) {
        self.held.notified().await;
    }

    pub(crate) fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl LanguageModel for GatedModel {
    async fn complete(&self, request: ModelRequest) -> CoreResult<ModelReply> {
        if self.hold.swap(false, Ordering::SeqCst) {
            self.held.notify_one();
            self.released.notified().await;
        }
        self.script.complete(request).await
    }
}

pub(crate) struct StubTelephony {
    result: Result<String, String>,
    requests: Mutex<Vec<OriginateRequest>>,
}

impl StubTelephony {
    pub(crate) fn accepting(provider_call_id: &str) -> Self {
        Self {
            result: Ok(provider_call_id.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn rejecting(message: &str) -> Self {
        Self {
            result: Err(message.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<OriginateRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Telephony for StubTelephony {
    async fn originate(&self, request: OriginateRequest) -> CoreResult<String> {
        self.requests.lock().push(request);
        self.result.clone().map_err(CoreError::Telephony)
    }
}

#[derive(Default)]
pub(crate) struct RecordingMailer {
    fail: bool,
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn sent(&self) -> Vec<Email> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> CoreResult<()> {
        if self.fail {
            return Err(CoreError::Notification("mail service unavailable".into()));
        }
        self.sent.lock().push(email);
        Ok(())
    }
}

/// Transcript index that answers from a queue, then reports "not yet indexed".
#[derive(Default)]
pub(crate) struct StubTranscriptIndex {
    responses: Mutex<VecDeque<Option<TranscriptRecord>>>,
    lookups: AtomicUsize,
}

impl StubTranscriptIndex {
    pub(crate) fn with_responses(responses: Vec<Option<TranscriptRecord>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            lookups: AtomicUsize::new(0),
        }
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptIndex for StubTranscriptIndex {
    async fn find(&self, _provider_call_id: &str) -> CoreResult<Option<TranscriptRecord>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.responses.lock().pop_front().flatten())
    }
}
