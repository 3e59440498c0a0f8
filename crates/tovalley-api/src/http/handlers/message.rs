//! Chat message handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use tovalley_core::chat::NotificationTicket;
use tovalley_observe::chat_attrs;
use tovalley_types::chat::{ChatMessage, ChatMessagePage, OutgoingMessage};

use crate::http::error::AppError;
use crate::http::extractors::member::CurrentMember;
use crate::http::extractors::query::PageQuery;
use crate::http::handlers::{parse_room_id, room_href};
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Body of `POST /api/v1/chat/rooms/{id}/messages`.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Result of a send as seen by the HTTP caller.
#[derive(Debug, Serialize)]
pub struct SentMessage {
    pub message: ChatMessage,
    pub all_present: bool,
    /// A notification for the absent recipient is being dispatched.
    pub notification_pending: bool,
}

/// Result of an explicit read acknowledgement.
#[derive(Debug, Serialize)]
pub struct ReadAck {
    pub marked_read: u64,
}

/// GET /api/v1/chat/rooms/{id}/messages - A page of room history, newest first.
#[tracing::instrument(skip_all, fields(operation = chat_attrs::OP_LIST_MESSAGES, member_id = %member.id(), room_id = %id))]
pub async fn list_messages(
    State(state): State<AppState>,
    member: CurrentMember,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<ChatMessagePage>>, AppError> {
    let timer = RequestTimer::start();
    let room_id = parse_room_id(&id)?;

    let page = state
        .chat_service
        .get_messages(member.id(), room_id, query.into_request())
        .await?;

    Ok(Json(
        timer
            .finish(page)
            .with_link("room", room_href(room_id))
            .with_link("self", format!("{}/messages", room_href(room_id))),
    ))
}

/// POST /api/v1/chat/rooms/{id}/messages - Send a message to the room.
#[tracing::instrument(skip_all, fields(operation = chat_attrs::OP_SEND_MESSAGE, member_id = %member.id(), room_id = %id))]
pub async fn send_message(
    State(state): State<AppState>,
    member: CurrentMember,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SentMessage>>), AppError> {
    let timer = RequestTimer::start();
    let room_id = parse_room_id(&id)?;

    let receipt = state
        .chat_service
        .send_message(
            member.id(),
            OutgoingMessage {
                chat_room_id: room_id,
                content: body.content,
            },
        )
        .await?;

    // The dispatch task keeps running detached once the ticket is dropped.
    let sent = SentMessage {
        notification_pending: matches!(receipt.notification, NotificationTicket::Pending(_)),
        all_present: receipt.all_present,
        message: receipt.message,
    };

    let resp = timer
        .finish(sent)
        .with_link("messages", format!("{}/messages", room_href(room_id)));
    Ok((StatusCode::CREATED, Json(resp)))
}

/// POST /api/v1/chat/rooms/{id}/read - Mark messages sent to the caller as read.
#[tracing::instrument(skip_all, fields(operation = chat_attrs::OP_MARK_READ, member_id = %member.id(), room_id = %id))]
pub async fn mark_read(
    State(state): State<AppState>,
    member: CurrentMember,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ReadAck>>, AppError> {
    let timer = RequestTimer::start();
    let room_id = parse_room_id(&id)?;

    let marked_read = state.chat_service.mark_read(member.id(), room_id).await?;

    Ok(Json(timer.finish(ReadAck { marked_read })))
}
