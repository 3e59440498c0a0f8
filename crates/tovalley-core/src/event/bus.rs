//! In-process chat event bus built on `tokio::sync::broadcast`.
//!
//! The chat-message topic is a single broadcast channel; subscribers filter
//! by room. The notification topic has one broadcast sender per recipient,
//! created lazily on subscribe and pruned once its last receiver is gone.
//! Publishing with no subscribers is a successful no-op (delivery count 0).

use tokio::sync::broadcast;
use tracing::debug;

use dashmap::DashMap;
use thiserror::Error;
use tovalley_types::chat::{ChatMessage, NotificationEvent, RoomId};
use tovalley_types::member::MemberId;

/// Logical name of the chat-message topic.
pub const CHAT_TOPIC: &str = "chat";

/// Logical name of the notification topic; events are keyed per recipient.
pub const NOTIFICATION_TOPIC: &str = "notification";

/// Default channel capacity for both topics.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Topic key under which a recipient's notifications are published.
pub fn notification_key(recipient_id: MemberId) -> String {
    format!("{NOTIFICATION_TOPIC}.{recipient_id}")
}

/// Errors a bus implementation may report on publish.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus rejected or could not accept the event.
    #[error("publish to '{topic}' failed: {reason}")]
    PublishFailed { topic: String, reason: String },
}

/// Publishing side of the event bus.
///
/// Publishing is synchronous and non-blocking; the returned count is the
/// number of live subscribers that received the event.
pub trait ChatEventPublisher: Send + Sync {
    /// Publish an appended message on the chat-message topic.
    fn publish_message(&self, message: &ChatMessage) -> Result<usize, BusError>;

    /// Publish a notification on the recipient's notification topic.
    fn publish_notification(&self, event: &NotificationEvent) -> Result<usize, BusError>;
}

/// Multi-consumer in-process event bus.
pub struct ChatEventBus {
    messages: broadcast::Sender<ChatMessage>,
    notifications: DashMap<MemberId, broadcast::Sender<NotificationEvent>>,
    capacity: usize,
}

impl ChatEventBus {
    /// Create a new bus with the given per-channel capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (messages, _) = broadcast::channel(capacity);
        Self {
            messages,
            notifications: DashMap::new(),
            capacity,
        }
    }

    /// Subscribe to the chat-message topic, filtered to one room.
    pub fn subscribe_room(&self, room_id: RoomId) -> RoomSubscription {
        RoomSubscription {
            room_id,
            receiver: self.messages.subscribe(),
        }
    }

    /// Subscribe to a recipient's notification topic, creating it if needed.
    pub fn subscribe_notifications(
        &self,
        recipient_id: MemberId,
    ) -> broadcast::Receiver<NotificationEvent> {
        self.notifications
            .entry(recipient_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of recipients with a live notification topic.
    pub fn notification_topic_count(&self) -> usize {
        self.notifications.len()
    }
}

impl Default for ChatEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChatEventPublisher for ChatEventBus {
    fn publish_message(&self, message: &ChatMessage) -> Result<usize, BusError> {
        match self.messages.send(message.clone()) {
            Ok(count) => {
                debug!(topic = CHAT_TOPIC, room_id = %message.chat_room_id, count, "published chat message");
                Ok(count)
            }
            Err(_) => {
                debug!(topic = CHAT_TOPIC, room_id = %message.chat_room_id, "no active subscribers on chat topic");
                Ok(0)
            }
        }
    }

    fn publish_notification(&self, event: &NotificationEvent) -> Result<usize, BusError> {
        let recipient_id = event.recipient_id;
        let key = notification_key(recipient_id);

        let delivered = match self.notifications.get(&recipient_id) {
            Some(sender) => sender.send(event.clone()).unwrap_or(0),
            None => 0,
        };

        if delivered == 0 {
            // Drop the topic once nobody listens so idle recipients cost nothing.
            self.notifications
                .remove_if(&recipient_id, |_, sender| sender.receiver_count() == 0);
            debug!(topic = %key, "no active subscribers for notification");
        } else {
            debug!(topic = %key, count = delivered, "published notification");
        }

        Ok(delivered)
    }
}

impl std::fmt::Debug for ChatEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEventBus")
            .field("message_receivers", &self.messages.receiver_count())
            .field("notification_topics", &self.notifications.len())
            .finish()
    }
}

/// Receiver of chat-topic messages for a single room.
pub struct RoomSubscription {
    room_id: RoomId,
    receiver: broadcast::Receiver<ChatMessage>,
}

impl RoomSubscription {
    /// Wait for the next message of this room.
    ///
    /// Messages of other rooms are skipped. A lagged receiver skips the
    /// overwritten messages and keeps going; `None` means the bus is gone.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if message.chat_room_id == self.room_id => return Some(message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(room_id = %self.room_id, skipped, "room subscription lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }
}
