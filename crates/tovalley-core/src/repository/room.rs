//! Room registry trait definition.
//!
//! Durable store of two-party chat rooms. At most one room exists per
//! unordered member pair; every lookup by pair is symmetric.

use tovalley_types::chat::{ChatRoom, ChatRoomSummary, ChatRoomWithMembers, RoomId};
use tovalley_types::error::RepositoryError;
use tovalley_types::member::MemberId;
use tovalley_types::page::{PageRequest, Slice};
use tovalley_types::time::ChatTime;

/// Result of inserting a room for a member pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInsert {
    pub room: ChatRoom,
    /// `false` when the pair already had a room (e.g. a concurrent create won).
    pub created: bool,
}

/// Repository trait for chat room membership.
///
/// Implementations live in tovalley-infra (e.g., `SqliteChatRoomRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ChatRoomRepository: Send + Sync {
    /// Find the room shared by `member_id` and the member nicknamed
    /// `other_nickname`, regardless of which one opened it.
    fn find_by_member_and_nickname(
        &self,
        member_id: MemberId,
        other_nickname: &str,
    ) -> impl std::future::Future<Output = Result<Option<ChatRoom>, RepositoryError>> + Send;

    /// Create a room for the pair, or return the existing one unmodified.
    fn create(
        &self,
        sender_id: MemberId,
        recipient_id: MemberId,
        created_at: &ChatTime,
    ) -> impl std::future::Future<Output = Result<RoomInsert, RepositoryError>> + Send;

    /// Get a room by its ID.
    fn find_by_id(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<Option<ChatRoom>, RepositoryError>> + Send;

    /// Get a room with both member records resolved.
    fn find_with_members(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<Option<ChatRoomWithMembers>, RepositoryError>> + Send;

    /// List the rooms a member belongs to, newest room first.
    fn list_for_member(
        &self,
        member_id: MemberId,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Slice<ChatRoomSummary>, RepositoryError>> + Send;

    /// Whether `member_id` is one of the two members of `room_id`.
    fn is_member(
        &self,
        member_id: MemberId,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
