//! # Wellcall Core
//!
//! Call orchestration for automated wellness-check phone calls.
//!
//! This crate holds the domain model and every service that decides *when* a call happens,
//! *how* a conversation progresses and *what* follows from its outcome:
//! - [`scheduler`]: paces outbound calls one at a time across the daily call window
//! - [`initiator`]: asks the telephony provider to dial and records the provider call id
//! - [`conversation`]: per-call interview state machine driven by a language model
//! - [`scoring`]: deterministic flag and escalation cascade
//! - [`escalation`]: persists escalations and notifies reviewers
//! - [`retry`]: status callbacks, retries and missed-call tracking
//! - [`post_call`] and [`worker`]: the job chain that closes the loop
//!
//! **No API concerns**: HTTP routing, webhook signature checks and session tokens belong in
//! `api-rest` and `api-shared`.

pub mod answer;
pub mod config;
pub mod constants;
pub mod conversation;
pub mod error;
pub mod escalation;
pub mod initiator;
pub mod model;
pub mod post_call;
pub mod providers;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod scoring;
pub mod store;
pub mod voices;
pub mod window;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use answer::{AnswerPlan, AnswerService};
pub use config::{CoreConfig, MissLookback};
pub use error::{CoreError, CoreResult};
pub use escalation::{EscalationService, NewEscalation};
pub use initiator::{CallInitiator, InitiateOutcome};
pub use post_call::{PostCallOutcome, PostCallPipeline};
pub use queue::{Job, JobHandler, JobQueue, LocalQueue, QueueWorker, WorkerOptions};
pub use retry::{CallOutcomePolicy, StatusEvent, StatusOutcome};
pub use scheduler::CallScheduler;
pub use store::{InMemoryStore, Store};
pub use window::CallWindow;
pub use worker::JobDispatcher;
