use super::phase::PhaseTracker;
use crate::model::CallType;
use crate::providers::{ChatMessage, ChatRole};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Call-scoped conversation state, alive only while the transport is connected.
#[derive(Debug)]
pub struct Session {
    pub call_id: Uuid,
    pub person_id: Uuid,
    pub provider_call_id: String,
    pub first_name: String,
    pub persona: &'static str,
    pub call_type: CallType,
    pub tracker: PhaseTracker,
    pub history: Vec<ChatMessage>,
    pub memory: String,
    /// Set once a submission has been handled; later prompts are ignored.
    pub completed: bool,
}

impl Session {
    pub fn push_person(&mut self, text: &str) {
        self.tracker.observe_person(text);
        self.history.push(ChatMessage::user(text));
    }

    pub fn push_agent(&mut self, text: &str) {
        self.history.push(ChatMessage::assistant(text));
    }

    /// Cut the most recent agent turn down to what the person heard before interrupting.
    pub fn truncate_last_agent(&mut self, heard: &str) {
        let Some(last) = self
            .history
            .iter_mut()
            .rev()
            .find(|m| m.role == ChatRole::Assistant)
        else {
            return;
        };
        let heard = heard.trim();
        if heard.is_empty() {
            last.content = "…".into();
        } else if let Some(pos) = last.content.find(heard) {
            last.content.truncate(pos + heard.len());
        } else {
            last.content = heard.to_string();
        }
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

struct LiveSession {
    person_id: Uuid,
    handle: SessionHandle,
}

/// Live sessions keyed by provider call id.
///
/// Each entry is locked for the duration of a turn, so turns within one session run one
/// at a time while separate sessions proceed in parallel. Removal never waits on a turn.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, LiveSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session; returns `false` if one is already live for the call.
    pub fn insert(&self, session: Session) -> bool {
        use dashmap::mapref::entry::Entry;
        match self.sessions.entry(session.provider_call_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(LiveSession {
                    person_id: session.person_id,
                    handle: Arc::new(Mutex::new(session)),
                });
                true
            }
        }
    }

    pub fn get(&self, provider_call_id: &str) -> Option<SessionHandle> {
        self.sessions
            .get(provider_call_id)
            .map(|s| s.value().handle.clone())
    }

    pub fn contains(&self, provider_call_id: &str) -> bool {
        self.sessions.contains_key(provider_call_id)
    }

    /// Drop the session; returns the person it belonged to.
    pub fn remove(&self, provider_call_id: &str) -> Option<Uuid> {
        self.sessions
            .remove(provider_call_id)
            .map(|(_, live)| live.person_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
