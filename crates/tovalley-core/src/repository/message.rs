//! Message store trait definition.
//!
//! Append-only store of chat messages keyed by room. The only mutation
//! after append is the bulk unread-to-read transition in `mark_read`.

use tovalley_types::chat::{ChatMessage, RoomId};
use tovalley_types::error::RepositoryError;
use tovalley_types::member::MemberId;
use tovalley_types::page::{PageRequest, Slice};

/// Repository trait for chat message persistence.
pub trait ChatMessageRepository: Send + Sync {
    /// Append a stamped message. Each append is atomic.
    fn append(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Messages of a room, most recent first.
    fn list_by_room(
        &self,
        room_id: RoomId,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Slice<ChatMessage>, RepositoryError>> + Send;

    /// The most recent message of a room, if any.
    fn latest_in_room(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;

    /// Count unread messages in the room that were sent to `member_id`
    /// (unread flag set and sender is someone else).
    fn count_unread(
        &self,
        room_id: RoomId,
        member_id: MemberId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Mark every unread message sent to `member_id` in the room as read.
    ///
    /// Single conditional bulk update; returns the number of messages
    /// changed (zero on repeated calls).
    fn mark_read(
        &self,
        room_id: RoomId,
        member_id: MemberId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
