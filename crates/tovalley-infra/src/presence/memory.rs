//! In-memory presence tracker backed by `DashMap`.
//!
//! Presence is process-local and lost on restart; a lost record only means
//! the next message to that room is stored unread and notified.

use std::collections::BTreeSet;

use dashmap::DashMap;
use tracing::debug;

use tovalley_core::presence::PresenceTracker;
use tovalley_types::chat::{ChatRoomParticipant, RoomId};
use tovalley_types::error::RepositoryError;
use tovalley_types::member::MemberId;

/// Presence records indexed both by room and by member.
///
/// The two indexes are never locked at the same time.
#[derive(Default)]
pub struct InMemoryPresenceTracker {
    by_room: DashMap<RoomId, BTreeSet<MemberId>>,
    by_member: DashMap<MemberId, BTreeSet<RoomId>>,
}

impl InMemoryPresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every current presence record.
    pub fn snapshot(&self) -> Vec<ChatRoomParticipant> {
        self.by_room
            .iter()
            .flat_map(|entry| {
                let chat_room_id = *entry.key();
                entry
                    .value()
                    .iter()
                    .map(move |&member_id| ChatRoomParticipant {
                        member_id,
                        chat_room_id,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn remove_from_room(&self, room_id: RoomId, member_id: MemberId) {
        if let Some(mut members) = self.by_room.get_mut(&room_id) {
            members.remove(&member_id);
        }
        self.by_room.remove_if(&room_id, |_, members| members.is_empty());
    }
}

impl PresenceTracker for InMemoryPresenceTracker {
    async fn join(&self, member_id: MemberId, room_id: RoomId) -> Result<(), RepositoryError> {
        self.by_room.entry(room_id).or_default().insert(member_id);
        self.by_member.entry(member_id).or_default().insert(room_id);
        debug!(%member_id, %room_id, "presence recorded");
        Ok(())
    }

    async fn leave_all(&self, member_id: MemberId) -> Result<(), RepositoryError> {
        let Some((_, rooms)) = self.by_member.remove(&member_id) else {
            return Ok(());
        };
        for room_id in &rooms {
            self.remove_from_room(*room_id, member_id);
        }
        debug!(%member_id, rooms = rooms.len(), "presence cleared");
        Ok(())
    }

    async fn participants_of(&self, room_id: RoomId) -> Result<BTreeSet<MemberId>, RepositoryError> {
        Ok(self
            .by_room
            .get(&room_id)
            .map(|members| members.clone())
            .unwrap_or_default())
    }

    async fn other_participant(
        &self,
        room_id: RoomId,
        member_id: MemberId,
    ) -> Result<Option<MemberId>, RepositoryError> {
        Ok(self
            .by_room
            .get(&room_id)
            .and_then(|members| members.iter().copied().find(|m| *m != member_id)))
    }

    async fn is_fully_attended(
        &self,
        room_id: RoomId,
        expected_size: usize,
    ) -> Result<bool, RepositoryError> {
        let present = self.by_room.get(&room_id).map_or(0, |members| members.len());
        Ok(present == expected_size)
    }
}
