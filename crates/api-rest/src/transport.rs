//! Real-time conversation transport.
//!
//! The telephony provider opens a WebSocket to `/ws?token=...` once the call is bridged.
//! The token is checked before the upgrade; each socket then carries exactly one
//! conversation session.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use wellcall_core::conversation::{ConversationEngine, InboundMessage, OutboundMessage, Reply, SessionGrant};

#[derive(Debug, Deserialize)]
pub struct TransportQuery {
    token: Option<String>,
}

#[utoipa::path(
    get,
    path = "/ws",
    params(("token" = String, Query, description = "Single-use session token from the voice webhook")),
    responses(
        (status = 101, description = "Switching to the conversation transport"),
        (status = 400, description = "Not a WebSocket upgrade"),
        (status = 401, description = "Missing, unknown or expired token")
    )
)]
pub async fn connect(
    State(state): State<AppState>,
    Query(query): Query<TransportQuery>,
    upgrade: Option<WebSocketUpgrade>,
) -> Response {
    let Some(token) = query.token else {
        return (StatusCode::UNAUTHORIZED, "Missing token").into_response();
    };
    if let Err(e) = state.tokens.check(&token, Utc::now()) {
        tracing::warn!("transport connection refused: {e}");
        return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
    }
    // A request that cannot upgrade leaves the token unspent.
    let Some(upgrade) = upgrade else {
        return (StatusCode::BAD_REQUEST, "Expected a WebSocket upgrade").into_response();
    };
    let grant = match state.tokens.consume(&token, Utc::now()) {
        Ok(grant) => grant,
        Err(e) => {
            tracing::warn!("transport connection refused: {e}");
            return (StatusCode::UNAUTHORIZED, "Invalid token").into_response();
        }
    };

    let grant = SessionGrant {
        person_id: grant.person_id,
        call_id: grant.call_id,
    };
    let engine = state.engine.clone();
    upgrade.on_upgrade(move |socket| run(socket, engine, grant))
}

fn deliver(tx: &mpsc::UnboundedSender<OutboundMessage>, reply: Reply) {
    let _ = tx.send(OutboundMessage::say(reply.say));
    if let Some(grace) = reply.end_after {
        let tx = tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let _ = tx.send(OutboundMessage::End);
        });
    }
}

/// Socket reader. Session events go to [`run_turns`] so a close is seen even while a
/// turn is waiting on the model.
async fn run(socket: WebSocket, engine: Arc<ConversationEngine>, grant: SessionGrant) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("could not encode transport message: {e}");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let (events_tx, events_rx) = mpsc::unbounded_channel::<InboundMessage>();
    let turns = tokio::spawn(run_turns(engine.clone(), grant, events_rx, tx.clone()));

    let mut provider_call_id: Option<String> = None;
    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(call_id = %grant.call_id, "transport read failed: {e}");
                break;
            }
        };
        let message: InboundMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(call_id = %grant.call_id, "unreadable transport message: {e}");
                continue;
            }
        };

        match &message {
            InboundMessage::Setup { call_sid, .. } => {
                provider_call_id.get_or_insert_with(|| call_sid.clone());
            }
            InboundMessage::Dtmf { digit } => {
                if let Some(id) = provider_call_id.as_deref() {
                    engine.on_dtmf(id, digit);
                }
                continue;
            }
            InboundMessage::Error { description } => {
                tracing::warn!(call_id = %grant.call_id, "transport reported error: {description}");
                continue;
            }
            InboundMessage::Unknown => continue,
            InboundMessage::Prompt { .. } | InboundMessage::Interrupt { .. } => {}
        }
        if events_tx.send(message).is_err() {
            break;
        }
    }

    // Any turn still in flight finds its session gone and discards the reply.
    if let Some(id) = provider_call_id.as_deref() {
        engine.on_close(id, Utc::now()).await;
    }
    drop(events_tx);
    drop(tx);
    if let Err(e) = turns.await {
        tracing::error!(call_id = %grant.call_id, "turn task failed: {e}");
    }
    let _ = writer.await;
}

/// Apply session events one at a time, in arrival order.
async fn run_turns(
    engine: Arc<ConversationEngine>,
    grant: SessionGrant,
    mut events: mpsc::UnboundedReceiver<InboundMessage>,
    tx: mpsc::UnboundedSender<OutboundMessage>,
) {
    let mut provider_call_id: Option<String> = None;
    while let Some(event) = events.recv().await {
        match event {
            InboundMessage::Setup { call_sid, .. } => {
                if provider_call_id.is_some() {
                    tracing::warn!(%call_sid, "repeated setup ignored");
                    continue;
                }
                match engine.on_setup(grant, &call_sid, Utc::now()).await {
                    Ok(reply) => deliver(&tx, reply),
                    Err(e) => {
                        tracing::error!(call_id = %grant.call_id, "session setup failed: {e}");
                        let _ = tx.send(OutboundMessage::End);
                    }
                }
                provider_call_id = Some(call_sid);
            }
            InboundMessage::Prompt {
                voice_prompt, last, ..
            } => {
                let Some(id) = provider_call_id.as_deref() else {
                    tracing::warn!(call_id = %grant.call_id, "prompt before setup dropped");
                    continue;
                };
                match engine.on_prompt(id, &voice_prompt, last, Utc::now()).await {
                    Ok(Some(reply)) => deliver(&tx, reply),
                    Ok(None) => {}
                    Err(e) => tracing::error!(call_id = %grant.call_id, "turn failed: {e}"),
                }
            }
            InboundMessage::Interrupt {
                utterance_until_interrupt,
                ..
            } => {
                if let Some(id) = provider_call_id.as_deref() {
                    engine.on_interrupt(id, &utterance_until_interrupt).await;
                }
            }
            InboundMessage::Dtmf { .. } | InboundMessage::Error { .. } | InboundMessage::Unknown => {}
        }
    }

    // A setup still running when the socket closed registers its session late.
    if let Some(id) = provider_call_id {
        engine.on_close(&id, Utc::now()).await;
    }
}
