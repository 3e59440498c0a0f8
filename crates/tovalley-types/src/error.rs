use thiserror::Error;

use crate::chat::RoomId;
use crate::member::MemberId;

/// Errors surfaced by chat operations to the caller.
///
/// None of these are retried; each carries a user-facing message.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat room {0} not found")]
    RoomNotFound(RoomId),

    #[error("member not found: {0}")]
    MemberNotFound(String),

    #[error("member {member_id} is not a participant of chat room {room_id}")]
    Forbidden { member_id: MemberId, room_id: RoomId },

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl ChatError {
    /// `true` for the not-found family (unknown room or member).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChatError::RoomNotFound(_) | ChatError::MemberNotFound(_))
    }
}

/// Errors from repository operations (used by trait definitions in tovalley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("conflict: {0}")]
    Conflict(String),
}
