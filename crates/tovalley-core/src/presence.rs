//! Presence tracker trait.
//!
//! Ephemeral key-value record of which members currently have which room
//! open. Presence is advisory: losing it entirely (e.g. on restart) only
//! degrades the read-count heuristic to "always notify".
//! Implementations live in tovalley-infra.

use std::collections::BTreeSet;

use tovalley_types::chat::RoomId;
use tovalley_types::error::RepositoryError;
use tovalley_types::member::MemberId;

/// Trait for the presence key-value service.
///
/// Join and leave are idempotent and commutative; concurrent calls for the
/// same member need no coordination.
pub trait PresenceTracker: Send + Sync {
    /// Record that `member_id` has `room_id` open (upsert).
    fn join(
        &self,
        member_id: MemberId,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove every presence record of `member_id`. No-op if none exist.
    fn leave_all(
        &self,
        member_id: MemberId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Members currently present in `room_id`.
    fn participants_of(
        &self,
        room_id: RoomId,
    ) -> impl std::future::Future<Output = Result<BTreeSet<MemberId>, RepositoryError>> + Send;

    /// A present member of `room_id` other than `member_id`, if any.
    fn other_participant(
        &self,
        room_id: RoomId,
        member_id: MemberId,
    ) -> impl std::future::Future<Output = Result<Option<MemberId>, RepositoryError>> + Send;

    /// `true` iff the number of distinct present members equals `expected_size`.
    fn is_fully_attended(
        &self,
        room_id: RoomId,
        expected_size: usize,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
