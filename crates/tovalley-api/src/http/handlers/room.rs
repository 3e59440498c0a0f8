//! Chat room handlers.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use tovalley_observe::chat_attrs;
use tovalley_types::chat::{ChatRoomView, RoomCreation};
use tovalley_types::page::Slice;

use crate::http::error::AppError;
use crate::http::extractors::member::CurrentMember;
use crate::http::extractors::query::PageQuery;
use crate::http::handlers::room_href;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Body of `POST /api/v1/chat/rooms`.
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub recipient_nick: String,
}

/// POST /api/v1/chat/rooms - Open the room shared with another member.
///
/// 201 when the room was created by this call, 200 when it already existed.
#[tracing::instrument(skip_all, fields(operation = chat_attrs::OP_CREATE_ROOM, member_id = %member.id()))]
pub async fn create_room(
    State(state): State<AppState>,
    member: CurrentMember,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RoomCreation>>), AppError> {
    let timer = RequestTimer::start();

    let creation = state
        .chat_service
        .create_or_get_room(member.id(), &body.recipient_nick)
        .await?;

    let status = if creation.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let href = room_href(creation.chat_room_id);
    let resp = timer
        .finish(creation)
        .with_link("messages", format!("{href}/messages"))
        .with_link("socket", format!("/ws/chat/rooms/{}", creation.chat_room_id));

    Ok((status, Json(resp)))
}

/// GET /api/v1/chat/rooms - The caller's rooms, most recently active first.
#[tracing::instrument(skip_all, fields(operation = chat_attrs::OP_LIST_ROOMS, member_id = %member.id()))]
pub async fn list_rooms(
    State(state): State<AppState>,
    member: CurrentMember,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Slice<ChatRoomView>>>, AppError> {
    let timer = RequestTimer::start();

    let rooms = state
        .chat_service
        .get_room_list(member.id(), query.into_request())
        .await?;

    Ok(Json(timer.finish(rooms).with_link("self", "/api/v1/chat/rooms")))
}
