//! Telephony provider webhooks.
//!
//! Every handler validates the provider signature over the public URL and form
//! parameters before touching any state.

use crate::twiml;
use crate::AppState;
use api_shared::auth::SIGNATURE_HEADER;
use api_shared::{validate_webhook_signature, TokenGrant};
use axum::{
    extract::{Form, OriginalUri, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use wellcall_core::answer::AnswerPlan;
use wellcall_core::post_call::{record_recording, record_transcript};
use wellcall_core::StatusEvent;

type Params = Vec<(String, String)>;
type HandlerError = (StatusCode, &'static str);

fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn verify(state: &AppState, headers: &HeaderMap, uri: &OriginalUri, params: &Params) -> Result<(), HandlerError> {
    let path = uri.0.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = state.config.webhook_url(path);
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    validate_webhook_signature(&state.webhook_secret, &url, params, signature).map_err(|e| {
        tracing::warn!("rejected webhook {path}: {e}");
        (StatusCode::FORBIDDEN, "Invalid signature")
    })
}

fn xml(body: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/xml")], body)
}

fn internal(context: &'static str) -> impl FnOnce(wellcall_core::CoreError) -> HandlerError {
    move |e| {
        tracing::error!("{context}: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceQuery {
    call_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/webhooks/voice",
    params(("callId" = Option<String>, Query, description = "Internal call id for outbound calls")),
    responses(
        (status = 200, description = "Call-control document (text/xml)"),
        (status = 400, description = "Missing CallSid"),
        (status = 403, description = "Invalid signature")
    )
)]
/// Voice-answer webhook.
///
/// Outbound calls are resolved by the `callId` query parameter; inbound calls by the
/// caller's number. Either way the response bridges the call to `/ws` with a fresh
/// single-use token, or declines an unknown caller.
pub async fn voice(
    State(state): State<AppState>,
    Query(query): Query<VoiceQuery>,
    uri: OriginalUri,
    headers: HeaderMap,
    Form(params): Form<Params>,
) -> Result<impl IntoResponse, HandlerError> {
    verify(&state, &headers, &uri, &params)?;
    let call_sid = param(&params, "CallSid").ok_or((StatusCode::BAD_REQUEST, "Missing CallSid"))?;
    let now = Utc::now();

    let plan = match query.call_id {
        Some(call_id) => state.answers.outbound(call_id, call_sid).await,
        None => {
            let from = param(&params, "From").unwrap_or_default();
            state.answers.inbound(from, call_sid, now).await
        }
    };
    let plan = match plan {
        Ok(plan) => plan,
        Err(e) => {
            tracing::error!("voice answer failed for {call_sid}: {e}");
            return Ok(xml(twiml::say_and_hangup(
                "Sorry, we can't take this call right now. Goodbye.",
            )));
        }
    };

    let body = match plan {
        AnswerPlan::Connect {
            person_id,
            call_id,
            voice,
            language,
            ..
        } => {
            let token = state.tokens.issue(TokenGrant { person_id, call_id }, now);
            twiml::connect_relay(&state.config.transport_url(&token), voice, &language)
        }
        AnswerPlan::Decline { message } => twiml::say_and_hangup(message),
    };
    Ok(xml(body))
}

#[utoipa::path(
    post,
    path = "/webhooks/status",
    responses(
        (status = 204, description = "Status applied"),
        (status = 400, description = "Missing CallSid or CallStatus"),
        (status = 403, description = "Invalid signature"),
        (status = 500, description = "Internal server error")
    )
)]
/// Call status callback. Post-call work is queued, never awaited here.
pub async fn status(
    State(state): State<AppState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Form(params): Form<Params>,
) -> Result<StatusCode, HandlerError> {
    verify(&state, &headers, &uri, &params)?;
    let (Some(call_sid), Some(call_status)) = (param(&params, "CallSid"), param(&params, "CallStatus")) else {
        return Err((StatusCode::BAD_REQUEST, "Missing CallSid or CallStatus"));
    };
    let event = StatusEvent {
        provider_call_id: call_sid.to_string(),
        status: call_status.to_string(),
        duration_secs: param(&params, "CallDuration").and_then(|d| d.parse().ok()),
        answered_by: param(&params, "AnsweredBy").map(String::from),
    };
    state
        .policy
        .on_status(event, Utc::now())
        .await
        .map_err(internal("status callback failed"))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/webhooks/recording",
    responses(
        (status = 204, description = "Recording stored"),
        (status = 400, description = "Missing CallSid or RecordingUrl"),
        (status = 403, description = "Invalid signature"),
        (status = 500, description = "Internal server error")
    )
)]
/// Recording-ready callback.
pub async fn recording(
    State(state): State<AppState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Form(params): Form<Params>,
) -> Result<StatusCode, HandlerError> {
    verify(&state, &headers, &uri, &params)?;
    let (Some(call_sid), Some(url)) = (param(&params, "CallSid"), param(&params, "RecordingUrl")) else {
        return Err((StatusCode::BAD_REQUEST, "Missing CallSid or RecordingUrl"));
    };
    record_recording(state.store.as_ref(), call_sid, url)
        .await
        .map_err(internal("recording callback failed"))?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/webhooks/transcript",
    responses(
        (status = 204, description = "Transcript reference stored"),
        (status = 400, description = "Missing CallSid or TranscriptSid"),
        (status = 403, description = "Invalid signature"),
        (status = 500, description = "Internal server error")
    )
)]
/// Transcript-ready callback from the indexing service.
pub async fn transcript(
    State(state): State<AppState>,
    uri: OriginalUri,
    headers: HeaderMap,
    Form(params): Form<Params>,
) -> Result<StatusCode, HandlerError> {
    verify(&state, &headers, &uri, &params)?;
    let (Some(call_sid), Some(transcript_sid)) =
        (param(&params, "CallSid"), param(&params, "TranscriptSid"))
    else {
        return Err((StatusCode::BAD_REQUEST, "Missing CallSid or TranscriptSid"));
    };
    record_transcript(state.store.as_ref(), call_sid, transcript_sid)
        .await
        .map_err(internal("transcript callback failed"))?;
    Ok(StatusCode::NO_CONTENT)
}
