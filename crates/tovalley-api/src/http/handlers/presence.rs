//! Presence handlers for clients that track room focus over plain HTTP.

use axum::Json;
use axum::extract::{Path, State};

use tovalley_core::chat::RoomEntry;
use tovalley_observe::chat_attrs;

use crate::http::error::AppError;
use crate::http::extractors::member::CurrentMember;
use crate::http::handlers::parse_room_id;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// PUT /api/v1/chat/rooms/{id}/presence - The caller has the room open.
#[tracing::instrument(skip_all, fields(operation = chat_attrs::OP_ENTER_ROOM, member_id = %member.id(), room_id = %id))]
pub async fn enter_room(
    State(state): State<AppState>,
    member: CurrentMember,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<RoomEntry>>, AppError> {
    let timer = RequestTimer::start();
    let room_id = parse_room_id(&id)?;

    let entry = state.chat_service.enter_room(member.id(), room_id).await?;

    Ok(Json(timer.finish(entry)))
}

/// DELETE /api/v1/chat/presence - The caller closed every room.
#[tracing::instrument(skip_all, fields(operation = chat_attrs::OP_LEAVE, member_id = %member.id()))]
pub async fn leave(
    State(state): State<AppState>,
    member: CurrentMember,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();

    state.chat_service.leave(member.id()).await?;

    Ok(Json(timer.finish(serde_json::json!({ "left": true }))))
}
