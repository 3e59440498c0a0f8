//! Field values for chat logging.
//!
//! Request and connection logs carry an `operation` field naming what the
//! caller asked for; these are the values used across the API layer so log
//! queries can filter on a stable vocabulary.

/// Open (or find) the room shared with another member.
pub const OP_CREATE_ROOM: &str = "chat.create_room";

/// List a member's rooms.
pub const OP_LIST_ROOMS: &str = "chat.list_rooms";

/// Read a page of room history.
pub const OP_LIST_MESSAGES: &str = "chat.list_messages";

/// Send a message.
pub const OP_SEND_MESSAGE: &str = "chat.send_message";

/// Acknowledge unread messages.
pub const OP_MARK_READ: &str = "chat.mark_read";

/// Record presence in a room.
pub const OP_ENTER_ROOM: &str = "chat.enter_room";

/// Drop all presence of a member.
pub const OP_LEAVE: &str = "chat.leave";

/// Read the notification inbox.
pub const OP_LIST_NOTIFICATIONS: &str = "chat.list_notifications";

/// Live room connection over WebSocket.
pub const OP_ROOM_SOCKET: &str = "chat.room_socket";
