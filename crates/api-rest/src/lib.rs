//! # API REST
//!
//! HTTP surface of the wellness-call service.
//!
//! Handles:
//! - Telephony webhooks (voice answer, status, recording, transcript)
//! - The real-time conversation transport over WebSocket
//! - OpenAPI/Swagger documentation and CORS
//!
//! Uses `api-shared` for signature validation and session tokens.

#![warn(rust_2018_idioms)]

pub mod transport;
pub mod twiml;
pub mod webhooks;

use api_shared::{HealthRes, HealthService, SessionTokens};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use wellcall_core::conversation::ConversationEngine;
use wellcall_core::{AnswerService, CallOutcomePolicy, CoreConfig, Store};

/// Shared state for every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CoreConfig>,
    pub store: Arc<dyn Store>,
    pub answers: Arc<AnswerService>,
    pub policy: Arc<CallOutcomePolicy>,
    pub engine: Arc<ConversationEngine>,
    pub tokens: Arc<SessionTokens>,
    pub webhook_secret: Arc<str>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        webhooks::voice,
        webhooks::status,
        webhooks::recording,
        webhooks::transcript,
        transport::connect,
    ),
    components(schemas(HealthRes))
)]
pub struct ApiDoc;

/// Build the application router with documentation and CORS attached.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/voice", post(webhooks::voice))
        .route("/webhooks/status", post(webhooks::status))
        .route("/webhooks/recording", post(webhooks::recording))
        .route("/webhooks/transcript", post(webhooks::transcript))
        .route("/ws", get(transport::connect))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}
