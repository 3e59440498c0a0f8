//! Chat room, message, presence and notification types.
//!
//! Rooms are strictly two-party. Messages carry a read-count flag that is
//! set at append time from a presence snapshot and only ever transitions
//! from unread to read. Notifications are append-only inbox records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::member::{Member, MemberId};
use crate::page::Slice;
use crate::time::ChatTime;

/// Number of members in every chat room.
pub const MAX_PARTICIPANTS_PER_ROOM: usize = 2;

/// Numeric chat room identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub i64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoomId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// A two-party chat room.
///
/// `sender_id` is the member who opened the room; lookups are symmetric so
/// the roles carry no meaning after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoom {
    pub id: RoomId,
    pub sender_id: MemberId,
    pub recipient_id: MemberId,
    pub created_at: ChatTime,
}

impl ChatRoom {
    pub fn has_member(&self, member_id: MemberId) -> bool {
        self.sender_id == member_id || self.recipient_id == member_id
    }

    /// The other member of the room, if `member_id` belongs to it.
    pub fn counterpart_of(&self, member_id: MemberId) -> Option<MemberId> {
        if self.sender_id == member_id {
            Some(self.recipient_id)
        } else if self.recipient_id == member_id {
            Some(self.sender_id)
        } else {
            None
        }
    }
}

/// A chat room with both member records resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoomWithMembers {
    pub id: RoomId,
    pub sender: Member,
    pub recipient: Member,
    pub created_at: ChatTime,
}

impl ChatRoomWithMembers {
    /// Split into `(author, counterpart)` from the point of view of `member_id`.
    ///
    /// Returns `None` when `member_id` is not part of the room.
    pub fn perspective_of(&self, member_id: MemberId) -> Option<(&Member, &Member)> {
        if self.sender.id == member_id {
            Some((&self.sender, &self.recipient))
        } else if self.recipient.id == member_id {
            Some((&self.recipient, &self.sender))
        } else {
            None
        }
    }
}

/// Room row as listed for one member: the room and who is on the other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoomSummary {
    pub room_id: RoomId,
    pub other_member_id: MemberId,
    pub other_member_nickname: String,
    pub created_at: ChatTime,
}

/// Snippet of the most recent message in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub created_at: ChatTime,
}

/// Room list entry with derived fields, built once all fields are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRoomView {
    pub chat_room_id: RoomId,
    pub other_member_id: MemberId,
    pub other_member_nickname: String,
    pub created_at: ChatTime,
    pub unread_message_count: u64,
    pub last_message: Option<LastMessage>,
}

impl ChatRoomView {
    pub fn last_message_time(&self) -> Option<&ChatTime> {
        self.last_message.as_ref().map(|m| &m.created_at)
    }
}

/// Outcome of create-or-get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCreation {
    /// `true` if a new room was created by this call.
    pub created: bool,
    pub chat_room_id: RoomId,
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Read-state flag of a message.
///
/// `Read` (0) once every recipient has seen it; `Unread` (1) while the
/// non-sender has not. Serialized as the numeric flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ReadCount {
    Read,
    Unread,
}

impl ReadCount {
    /// Read-count policy applied at append time.
    pub fn for_attendance(all_present: bool) -> Self {
        if all_present {
            ReadCount::Read
        } else {
            ReadCount::Unread
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            ReadCount::Read => 0,
            ReadCount::Unread => 1,
        }
    }
}

impl From<ReadCount> for u8 {
    fn from(rc: ReadCount) -> Self {
        rc.as_i64() as u8
    }
}

impl TryFrom<u8> for ReadCount {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(v))
    }
}

impl TryFrom<i64> for ReadCount {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(ReadCount::Read),
            1 => Ok(ReadCount::Unread),
            other => Err(format!("invalid read count: {other}")),
        }
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// UUID v7; orders messages appended within the same instant.
    pub id: Uuid,
    pub chat_room_id: RoomId,
    pub sender_id: MemberId,
    pub content: String,
    pub created_at: ChatTime,
    pub read_count: ReadCount,
}

/// A message as submitted by a client, before stamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub chat_room_id: RoomId,
    pub content: String,
}

/// A message projected for one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageView {
    pub chat_message_id: Uuid,
    pub sender_id: MemberId,
    /// `true` if the viewer sent this message.
    pub my_msg: bool,
    pub content: String,
    pub created_at: ChatTime,
    pub read_count: ReadCount,
}

impl ChatMessageView {
    pub fn for_viewer(message: ChatMessage, viewer: MemberId) -> Self {
        Self {
            chat_message_id: message.id,
            sender_id: message.sender_id,
            my_msg: message.sender_id == viewer,
            content: message.content,
            created_at: message.created_at,
            read_count: message.read_count,
        }
    }
}

/// A page of messages for one viewer in one room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessagePage {
    pub member_id: MemberId,
    pub chat_room_id: RoomId,
    pub chat_messages: Slice<ChatMessageView>,
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Ephemeral record of a member having a room open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatRoomParticipant {
    pub member_id: MemberId,
    pub chat_room_id: RoomId,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Kind of notification carried on the notification topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    Chat,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationType::Chat => write!(f, "CHAT"),
        }
    }
}

/// Notification record before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChatNotification {
    pub sender_id: MemberId,
    pub sender_nickname: String,
    pub recipient_id: MemberId,
    pub chat_room_id: RoomId,
    pub content: String,
    pub created_at: ChatTime,
}

/// Persisted inbox record for a message the recipient was not present for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatNotification {
    pub id: i64,
    pub sender_id: MemberId,
    pub sender_nickname: String,
    pub recipient_id: MemberId,
    pub chat_room_id: RoomId,
    pub content: String,
    pub created_at: ChatTime,
}

/// Event published on the notification topic, keyed by recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub chat_room_id: RoomId,
    pub recipient_id: MemberId,
    pub sender_nick: String,
    pub created_at: ChatTime,
    pub content: String,
    pub notification_type: NotificationType,
}

impl NotificationEvent {
    pub fn from_notification(notification: &ChatNotification) -> Self {
        Self {
            chat_room_id: notification.chat_room_id,
            recipient_id: notification.recipient_id,
            sender_nick: notification.sender_nickname.clone(),
            created_at: notification.created_at,
            content: notification.content.clone(),
            notification_type: NotificationType::Chat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time;

    fn member(id: i64, nickname: &str) -> Member {
        Member {
            id: MemberId(id),
            nickname: nickname.to_string(),
        }
    }

    #[test]
    fn test_read_count_policy() {
        assert_eq!(ReadCount::for_attendance(true), ReadCount::Read);
        assert_eq!(ReadCount::for_attendance(false), ReadCount::Unread);
    }

    #[test]
    fn test_read_count_serializes_as_flag() {
        assert_eq!(serde_json::to_string(&ReadCount::Unread).unwrap(), "1");
        let parsed: ReadCount = serde_json::from_str("0").unwrap();
        assert_eq!(parsed, ReadCount::Read);
        assert!(serde_json::from_str::<ReadCount>("2").is_err());
    }

    #[test]
    fn test_counterpart_of() {
        let room = ChatRoom {
            id: RoomId(1),
            sender_id: MemberId(10),
            recipient_id: MemberId(20),
            created_at: time::now(),
        };
        assert_eq!(room.counterpart_of(MemberId(10)), Some(MemberId(20)));
        assert_eq!(room.counterpart_of(MemberId(20)), Some(MemberId(10)));
        assert_eq!(room.counterpart_of(MemberId(30)), None);
        assert!(!room.has_member(MemberId(30)));
    }

    #[test]
    fn test_perspective_of_is_symmetric() {
        let room = ChatRoomWithMembers {
            id: RoomId(1),
            sender: member(1, "alice"),
            recipient: member(2, "bob"),
            created_at: time::now(),
        };
        let (me, other) = room.perspective_of(MemberId(2)).unwrap();
        assert_eq!(me.nickname, "bob");
        assert_eq!(other.nickname, "alice");
        assert!(room.perspective_of(MemberId(3)).is_none());
    }

    #[test]
    fn test_message_view_flags_viewer() {
        let msg = ChatMessage {
            id: Uuid::now_v7(),
            chat_room_id: RoomId(1),
            sender_id: MemberId(1),
            content: "hi".to_string(),
            created_at: time::now(),
            read_count: ReadCount::Unread,
        };
        assert!(ChatMessageView::for_viewer(msg.clone(), MemberId(1)).my_msg);
        assert!(!ChatMessageView::for_viewer(msg, MemberId(2)).my_msg);
    }

    #[test]
    fn test_notification_event_type_is_chat() {
        let notification = ChatNotification {
            id: 1,
            sender_id: MemberId(1),
            sender_nickname: "alice".to_string(),
            recipient_id: MemberId(2),
            chat_room_id: RoomId(5),
            content: "hello".to_string(),
            created_at: time::now(),
        };
        let event = NotificationEvent::from_notification(&notification);
        assert_eq!(event.recipient_id, MemberId(2));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"notification_type\":\"CHAT\""));
    }
}
