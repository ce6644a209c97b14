//! Chat routes: posting messages, reading history and following a chat live.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Json, Router, routing::get};
use parley_messaging::application::dispatcher::{ConnectionRegistry, connection_channel};
use parley_messaging::application::{command_handlers, query_handlers};
use parley_messaging::domain::commands;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Request body for POST /{chat_id}/messages.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// The sender.
    pub user_id: i64,
    /// The message body.
    pub message_text: String,
    /// Joins an existing causal chain instead of starting a new one.
    pub correlation_id: Option<Uuid>,
}

/// Response body returned once the message is durably logged.
#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    /// ID of the `incoming-message` event.
    pub event_id: Uuid,
    /// Log position assigned by the event store.
    pub log_id: Option<i64>,
    /// The causal chain the message belongs to.
    pub correlation_id: Uuid,
}

/// Query string for GET /{chat_id}/messages.
#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    /// Maximum number of messages to return.
    pub limit: Option<i64>,
}

/// POST /{chat_id}/messages
#[instrument(skip(state, request), fields(user_id = request.user_id))]
async fn send_message(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>), ApiError> {
    let command = commands::SendMessage {
        correlation_id: request.correlation_id.unwrap_or_else(Uuid::new_v4),
        chat_id,
        user_id: request.user_id,
        message_text: request.message_text,
    };

    info!(correlation_id = %command.correlation_id, "handling send_message command");

    let confirmed =
        command_handlers::handle_send_message(&command, state.clock.as_ref(), &state.bus).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            event_id: confirmed.event_id(),
            log_id: confirmed.log_id(),
            correlation_id: confirmed.metadata().correlation_id,
        }),
    ))
}

/// GET /{chat_id}/messages
async fn get_history(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<query_handlers::ChatHistoryView>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let view = query_handlers::get_chat_history(chat_id, limit, state.messages.as_ref()).await?;
    Ok(Json(view))
}

/// GET /{chat_id}/ws
async fn follow_chat(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
) -> Response {
    ws.on_upgrade(move |socket| stream_chat(socket, chat_id, state.connections))
}

/// Pushes every frame dispatched for `chat_id` to the socket until either
/// side closes.
async fn stream_chat(mut socket: WebSocket, chat_id: i64, connections: Arc<dyn ConnectionRegistry>) {
    let (tx, mut rx) = connection_channel();
    let connection_id = connections.join(chat_id, tx).await;

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                // Inbound frames are ignored; messages are posted over HTTP.
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    connections.leave(chat_id, connection_id).await;
    debug!(chat_id, %connection_id, "websocket closed");
}

/// Returns the router for chat routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{chat_id}/messages", get(get_history).post(send_message))
        .route("/{chat_id}/ws", get(follow_chat))
}
