//! Notification inbox handler.

use axum::Json;
use axum::extract::{Query, State};

use tovalley_observe::chat_attrs;
use tovalley_types::chat::ChatNotification;
use tovalley_types::page::Slice;

use crate::http::error::AppError;
use crate::http::extractors::member::CurrentMember;
use crate::http::extractors::query::PageQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// GET /api/v1/notifications - The caller's notification inbox, newest first.
#[tracing::instrument(skip_all, fields(operation = chat_attrs::OP_LIST_NOTIFICATIONS, member_id = %member.id()))]
pub async fn list_notifications(
    State(state): State<AppState>,
    member: CurrentMember,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Slice<ChatNotification>>>, AppError> {
    let timer = RequestTimer::start();

    let inbox = state
        .chat_service
        .list_notifications(member.id(), query.into_request())
        .await?;

    Ok(Json(timer.finish(inbox).with_link("self", "/api/v1/notifications")))
}
