use axum::{
    body::{Body, Bytes},
    extract::{
        ws::{close_code, CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;

use colloquy_llm::Message;
use colloquy_relay::{RelayEvent, TurnRequest};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Terminal frame closing every turn on the persistent channel
pub const END_OF_STREAM_MARKER: &str = "[END_OF_STREAM]";

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub messages: Vec<Message>,
    pub model: Option<String>,
    pub thread_id: Option<String>,
}

/// One-shot relay endpoint
///
/// Streams the reply as plain text chunks, closing with a single JSON
/// usage object. An upstream failure mid-stream degrades to an inline
/// `Error: ...` chunk with no usage object.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequestBody>,
) -> ApiResult<Response> {
    if req.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".to_string()));
    }

    let model = req
        .model
        .unwrap_or_else(|| state.config.llm.model.clone());

    let rx = state.relay.spawn_turn(TurnRequest {
        thread_id: req.thread_id,
        model,
        messages: req.messages,
    });

    let body_stream = ReceiverStream::new(rx).filter_map(|event| async move {
        let chunk = match event {
            RelayEvent::Token { content } => content,
            RelayEvent::Error { message } => format!("Error: {}", message),
            RelayEvent::Usage { usage } => {
                serde_json::to_string(&RelayEvent::Usage { usage }).ok()?
            }
            // The one-shot body simply ends; no marker on this surface
            RelayEvent::EndOfStream => return None,
        };
        Some(Ok::<_, Infallible>(Bytes::from(chunk)))
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream))
        .map_err(|_| ApiError::Internal)
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Transport-level model override, below request-level and above the
    /// configured default
    pub model: Option<String>,
}

/// Persistent-channel endpoint
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.model))
}

#[derive(Debug, Deserialize)]
struct WsTurnBody {
    messages: Vec<Message>,
    model: Option<String>,
    thread_id: Option<String>,
}

/// Session loop: one request, one streamed turn, repeat
///
/// An upstream failure ends the turn, not the session. A protocol error
/// (malformed frame, missing thread id) closes the channel with a
/// distinct code instead of guessing.
async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, transport_model: Option<String>) {
    while let Some(msg) = socket.recv().await {
        let text = match msg {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Err(_) => break,
            _ => continue,
        };

        let body: WsTurnBody = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) => {
                let _ = socket
                    .send(WsMessage::Close(Some(CloseFrame {
                        code: close_code::UNSUPPORTED,
                        reason: format!("invalid request: {}", e).into(),
                    })))
                    .await;
                break;
            }
        };

        let Some(thread_id) = body.thread_id else {
            // Fail closed: defaulting the thread would silently merge
            // unrelated conversations' memory
            let _ = socket
                .send(WsMessage::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "thread_id is required".into(),
                })))
                .await;
            break;
        };

        let model = body
            .model
            .or_else(|| transport_model.clone())
            .unwrap_or_else(|| state.config.llm.model.clone());

        let mut rx = state.relay.spawn_turn(TurnRequest {
            thread_id: Some(thread_id),
            model,
            messages: body.messages,
        });

        let mut client_gone = false;
        while let Some(event) = rx.recv().await {
            let frame = match event {
                RelayEvent::Token { content } => content,
                RelayEvent::Error { message } => format!("Error: {}", message),
                RelayEvent::Usage { usage } => {
                    match serde_json::to_string(&RelayEvent::Usage { usage }) {
                        Ok(json) => json,
                        Err(_) => continue,
                    }
                }
                RelayEvent::EndOfStream => END_OF_STREAM_MARKER.to_string(),
            };

            if socket.send(WsMessage::Text(frame)).await.is_err() {
                // Dropping rx cancels the in-flight turn
                client_gone = true;
                break;
            }
        }

        if client_gone {
            break;
        }
    }

    tracing::debug!("websocket session closed");
}
