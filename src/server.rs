//! WebSocket server: accepts connections, drives each session's
//! request/response loop, and guarantees cleanup when the loop exits.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::dispatch;
use crate::protocol;
use crate::registry::{SessionId, SessionRegistry};

/// Shared state handed to every connection task.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            sessions: SessionRegistry::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/healthz", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

/// Per-connection task: create a session, run the receive loop, and clean
/// up on every exit path.
///
/// The loop is strictly request-response: the next inbound message is not
/// read until the current response has been sent.
async fn handle_connection(socket: WebSocket, state: AppState) {
    let (session_id, cancel) = state.sessions.create();
    tracing::info!(%session_id, "new connection established");

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(%session_id, payload = %text.as_str(), "received message");
                        let response = dispatch::dispatch(&state, session_id, text.as_str()).await;
                        let encoded = protocol::encode(&response);
                        if ws_tx.send(Message::Text(encoded.into())).await.is_err() {
                            tracing::warn!(%session_id, "failed to send response, closing");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!(%session_id, "connection closed");
                        break;
                    }
                    // Binary frames are not part of the protocol; ping/pong
                    // are answered by axum automatically.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::warn!(%session_id, ?e, "connection closed with error");
                        break;
                    }
                }
            }

            // DISCONNECT_SERVER cancels the session token; close politely.
            _ = cancel.cancelled() => {
                let close_frame = CloseFrame {
                    code: close_code::NORMAL,
                    reason: "session disconnected".into(),
                };
                let _ = ws_tx.send(Message::Close(Some(close_frame))).await;
                break;
            }
        }
    }

    cleanup(&state, session_id).await;
}

/// Runs exactly once per session, on every exit path of the receive loop.
/// Takes the record out of the registry and terminates the supervised
/// process, if any.
async fn cleanup(state: &AppState, session_id: SessionId) {
    let Some(mut record) = state.sessions.remove(&session_id) else {
        tracing::warn!(%session_id, "no session found to clean up");
        return;
    };
    if let Some(mut process) = record.process.take() {
        process.terminate().await;
    }
    tracing::info!(%session_id, "cleaned up session");
}
