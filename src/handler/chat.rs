use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Path, Query, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::{delete, get, put},
    Extension, Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::jobdtos::{ApiResponse, PaginationQuery},
    error::HttpError,
    middleware::JwtAuthMiddleware,
    models::chatmodel::{Chat, Message},
    service::chat_service::{ChatService, PendingMessage},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct OpenChatDto {
    pub job_id: Uuid,
    pub other_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageDto {
    /// Client-generated reference for reconciling the local echo; a fresh
    /// one is assigned when omitted.
    pub client_ref: Option<Uuid>,

    #[validate(length(min = 1, max = 4000, message = "Message must be between 1 and 4000 characters"))]
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct ReadReceiptResponse {
    pub marked_read: u64,
}

pub fn chat_handler() -> Router {
    Router::new()
        .route("/", get(list_chats).post(open_chat))
        .route("/unread", get(unread_count))
        .route("/outbox", get(failed_drafts))
        .route("/outbox/:client_ref", delete(discard_draft))
        .route("/:chat_id/messages", get(chat_history).post(send_message))
        .route("/:chat_id/read", put(mark_read))
        .route("/:chat_id/ws", get(chat_feed))
}

pub async fn open_chat(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
    Json(body): Json<OpenChatDto>,
) -> Result<impl IntoResponse, HttpError> {
    let chat = app_state
        .chat_service
        .open_or_create(&user.profile, body.job_id, body.other_id)
        .await?;
    Ok(Json(ApiResponse::success("Chat ready", chat)))
}

pub async fn list_chats(
    Query(query): Query<PaginationQuery>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let (limit, offset) = query.limit_offset();
    let chats = app_state
        .chat_service
        .list_chats(&user.profile, limit, offset)
        .await?;
    let response: ApiResponse<Vec<Chat>> = ApiResponse::success("Chats retrieved", chats);
    Ok(Json(response))
}

pub async fn unread_count(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let unread = app_state.chat_service.unread_count(&user.profile).await?;
    Ok(Json(ApiResponse::success(
        "Unread count retrieved",
        UnreadCountResponse { unread },
    )))
}

pub async fn failed_drafts(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let drafts = app_state.chat_service.failed_drafts(user.profile.id);
    let response: ApiResponse<Vec<PendingMessage>> =
        ApiResponse::success("Pending drafts retrieved", drafts);
    Ok(Json(response))
}

pub async fn discard_draft(
    Path(client_ref): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    if !app_state.chat_service.discard_draft(user.profile.id, client_ref) {
        return Err(HttpError::not_found("Draft not found".to_string()));
    }
    Ok(Json(ApiResponse::success("Draft discarded", ())))
}

pub async fn chat_history(
    Path(chat_id): Path<Uuid>,
    Query(query): Query<PaginationQuery>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let (limit, offset) = query.limit_offset();
    let messages = app_state
        .chat_service
        .history(&user.profile, chat_id, limit, offset)
        .await?;
    let response: ApiResponse<Vec<Message>> = ApiResponse::success("Messages retrieved", messages);
    Ok(Json(response))
}

pub async fn send_message(
    Path(chat_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
    Json(body): Json<SendMessageDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let client_ref = body.client_ref.unwrap_or_else(Uuid::new_v4);
    let receipt = app_state
        .chat_service
        .send(&user.profile, chat_id, client_ref, body.body)
        .await?;
    Ok(Json(ApiResponse::success("Message sent", receipt)))
}

pub async fn mark_read(
    Path(chat_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let marked_read = app_state
        .chat_service
        .mark_read(&user.profile, chat_id)
        .await?;
    Ok(Json(ApiResponse::success(
        "Messages marked read",
        ReadReceiptResponse { marked_read },
    )))
}

/// Upgrade to a live feed of the chat's messages. Participation is checked
/// before the upgrade; the socket then forwards every broadcast message
/// until either side closes.
pub async fn chat_feed(
    ws: WebSocketUpgrade,
    Path(chat_id): Path<Uuid>,
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JwtAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let receiver = app_state
        .chat_service
        .subscribe(&user.profile, chat_id)
        .await?;
    let chat_service = app_state.chat_service.clone();
    Ok(ws.on_upgrade(move |socket| forward_feed(socket, chat_id, receiver, chat_service)))
}

async fn forward_feed(
    socket: WebSocket,
    chat_id: Uuid,
    mut receiver: broadcast::Receiver<Message>,
    chat_service: Arc<ChatService>,
) {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Ok(message) => {
                    let payload = match serde_json::to_string(&message) {
                        Ok(payload) => payload,
                        Err(err) => {
                            tracing::error!(%chat_id, error = %err, "failed to encode feed message");
                            continue;
                        }
                    };
                    if sink.send(WsMessage::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Slow consumer: it catches up from history, the feed
                    // keeps going.
                    tracing::warn!(%chat_id, skipped, "chat feed lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    drop(receiver);
    chat_service.release_channel(chat_id);
    tracing::debug!(%chat_id, "chat feed closed");
}
