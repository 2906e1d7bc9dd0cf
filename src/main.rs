//! Wellness-call service binary.
//!
//! Resolves configuration from the environment once, loads the roster, wires the
//! provider clients into the orchestration core, then runs the job worker, the daily
//! call-window trigger and the HTTP server side by side.

use anyhow::Context;
use chrono::Utc;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use api_shared::SessionTokens;
use wellcall_core::constants::{
    DEFAULT_COMPREHENSIVE_EVERY, DEFAULT_END_CALL_GRACE, DEFAULT_MAX_RETRIES,
    DEFAULT_MISS_LOOKBACK_CALLS, DEFAULT_MISS_LOOKBACK_DAYS, DEFAULT_MISS_THRESHOLD,
    DEFAULT_RETRY_DELAY, DEFAULT_SESSION_TOKEN_TTL, DEFAULT_WINDOW_END, DEFAULT_WINDOW_START,
    DEFAULT_WINDOW_TZ,
};
use wellcall_core::conversation::{ConversationEngine, SessionRegistry};
use wellcall_core::providers::{AnthropicModel, HttpMailer, HttpTelephony, HttpTranscriptIndex};
use wellcall_core::scheduler::run_daily_trigger;
use wellcall_core::store::seed::load_seed;
use wellcall_core::{
    AnswerService, CallInitiator, CallOutcomePolicy, CallScheduler, CallWindow, CoreConfig,
    EscalationService, InMemoryStore, JobDispatcher, JobQueue, LocalQueue, MissLookback,
    PostCallPipeline, QueueWorker, Store, WorkerOptions,
};
use wellcall_types::PhoneNumber;

const TOKEN_PURGE_INTERVAL: Duration = Duration::from_secs(60);

fn var(name: &str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

fn parsed_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name}: invalid value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

fn secs_or(name: &str, default: Duration) -> anyhow::Result<Duration> {
    parsed_or(name, default.as_secs()).map(Duration::from_secs)
}

fn core_config() -> anyhow::Result<CoreConfig> {
    let window = CallWindow::parse(
        &var_or("CALL_WINDOW_START", DEFAULT_WINDOW_START),
        &var_or("CALL_WINDOW_END", DEFAULT_WINDOW_END),
        &var_or("CALL_WINDOW_TZ", DEFAULT_WINDOW_TZ),
    )?;
    let lookback = MissLookback {
        max_calls: parsed_or("MISS_LOOKBACK_CALLS", DEFAULT_MISS_LOOKBACK_CALLS)?,
        days: parsed_or("MISS_LOOKBACK_DAYS", DEFAULT_MISS_LOOKBACK_DAYS)?,
        threshold: parsed_or("MISS_THRESHOLD", DEFAULT_MISS_THRESHOLD)?,
    };
    let config = CoreConfig::new(var("PUBLIC_BASE_URL")?, window)?
        .with_comprehensive_every(parsed_or("COMPREHENSIVE_EVERY", DEFAULT_COMPREHENSIVE_EVERY)?)?
        .with_retries(
            parsed_or("MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            secs_or("RETRY_DELAY_SECS", DEFAULT_RETRY_DELAY)?,
        )
        .with_miss_lookback(lookback)?
        .with_end_call_grace(secs_or("END_CALL_GRACE_SECS", DEFAULT_END_CALL_GRACE)?)
        .with_session_token_ttl(secs_or("SESSION_TOKEN_TTL_SECS", DEFAULT_SESSION_TOKEN_TTL)?);
    Ok(config)
}

/// Main entry point for the wellness-call service.
///
/// # Environment Variables
/// - `WELLCALL_REST_ADDR`: server address (default: "0.0.0.0:3000")
/// - `PUBLIC_BASE_URL`: externally reachable base URL used for webhooks and the transport
/// - `WELLCALL_SEED_FILE`: YAML roster of persons and reviewers (default: "seed.yaml")
/// - provider credentials: `TELEPHONY_*`, `MODEL_*`, `MAIL_*`, `TRANSCRIPT_API_BASE`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - a required variable is missing or a value is invalid,
/// - the seed file cannot be read or parsed,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wellcall_run=info".parse()?)
                .add_directive("wellcall_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = var_or("WELLCALL_REST_ADDR", "0.0.0.0:3000");
    let config = Arc::new(core_config()?);

    let seed_path = PathBuf::from(var_or("WELLCALL_SEED_FILE", "seed.yaml"));
    let seed = load_seed(&seed_path)
        .with_context(|| format!("loading seed file {}", seed_path.display()))?;
    tracing::info!(
        persons = seed.persons.len(),
        reviewers = seed.reviewers.len(),
        "roster loaded"
    );
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::with_seed(seed.persons, seed.reviewers));

    let telephony = Arc::new(HttpTelephony::new(
        var_or("TELEPHONY_API_BASE", "https://api.twilio.com"),
        var("TELEPHONY_ACCOUNT_SID")?,
        var("TELEPHONY_AUTH_TOKEN")?,
        PhoneNumber::parse(var("TELEPHONY_FROM_NUMBER")?)?,
    )?);
    let webhook_secret: Arc<str> = Arc::from(var("TELEPHONY_AUTH_TOKEN")?);
    let model_base = var_or("MODEL_API_BASE", "https://api.anthropic.com");
    let model_key = var("MODEL_API_KEY")?;
    let conversational = Arc::new(AnthropicModel::new(
        model_base.clone(),
        model_key.clone(),
        var("CONVERSATION_MODEL")?,
    )?);
    let scorer = Arc::new(AnthropicModel::new(
        model_base,
        model_key,
        var("SCORING_MODEL")?,
    )?);
    let mailer = Arc::new(HttpMailer::new(
        var_or("MAIL_API_BASE", "https://api.resend.com"),
        var("MAIL_API_KEY")?,
        var("MAIL_FROM")?,
    )?);
    let transcripts = Arc::new(HttpTranscriptIndex::new(var("TRANSCRIPT_API_BASE")?)?);

    let (local_queue, receiver) = LocalQueue::new();
    let queue: Arc<dyn JobQueue> = Arc::new(local_queue.clone());

    let escalations = Arc::new(EscalationService::new(store.clone(), mailer));
    let policy = Arc::new(CallOutcomePolicy::new(
        store.clone(),
        queue.clone(),
        escalations.clone(),
        config.clone(),
    ));
    let scheduler = Arc::new(CallScheduler::new(store.clone(), queue.clone(), config.clone()));
    let initiator = Arc::new(CallInitiator::new(
        store.clone(),
        telephony,
        policy.clone(),
        queue.clone(),
        config.clone(),
    ));
    let post_call = Arc::new(PostCallPipeline::new(
        store.clone(),
        queue.clone(),
        escalations.clone(),
        transcripts,
        config.clone(),
    ));
    let engine = Arc::new(ConversationEngine::new(
        store.clone(),
        conversational,
        scorer,
        escalations,
        Arc::new(SessionRegistry::new()),
        config.clone(),
    ));

    let options = WorkerOptions {
        concurrency: parsed_or("QUEUE_CONCURRENCY", WorkerOptions::default().concurrency)?,
        max_attempts: parsed_or("QUEUE_MAX_ATTEMPTS", WorkerOptions::default().max_attempts)?,
        ..WorkerOptions::default()
    };
    let dispatcher = Arc::new(JobDispatcher::new(scheduler, initiator, post_call));
    tokio::spawn(QueueWorker::new(local_queue, receiver, dispatcher, options).run());
    tokio::spawn(run_daily_trigger(queue, *config.window()));

    let tokens = Arc::new(SessionTokens::new(config.session_token_ttl()));
    let purge = tokens.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TOKEN_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let purged = purge.purge_expired(Utc::now());
            if purged > 0 {
                tracing::debug!(purged, "expired session tokens purged");
            }
        }
    });

    let state = AppState {
        answers: Arc::new(AnswerService::new(store.clone(), config.clone())),
        config,
        store,
        policy,
        engine,
        tokens,
        webhook_secret,
    };
    let app = api_rest::router(state);

    tracing::info!("-- Starting wellness-call service on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
