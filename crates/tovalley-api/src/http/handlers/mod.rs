//! HTTP and WebSocket request handlers.

pub mod message;
pub mod notification;
pub mod presence;
pub mod room;
pub mod ws;

use tovalley_types::chat::RoomId;

use crate::http::error::AppError;

/// Parse a `{id}` path segment as a room id.
pub(crate) fn parse_room_id(raw: &str) -> Result<RoomId, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation(format!("Invalid chat room id '{raw}'")))
}

/// Canonical path of a room's resource.
pub(crate) fn room_href(room_id: RoomId) -> String {
    format!("/api/v1/chat/rooms/{room_id}")
}
