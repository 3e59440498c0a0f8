//! Notification dispatch for messages the recipient was not present for.
//!
//! For each such message the dispatcher resolves both members from the room
//! registry, persists one `ChatNotification` inbox record and publishes a
//! `NotificationEvent` keyed by the recipient. The inbox record is the
//! durable part: a publish failure never removes it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use tovalley_types::chat::{
    ChatMessage, ChatNotification, NewChatNotification, NotificationEvent, RoomId,
};
use tovalley_types::error::RepositoryError;
use tovalley_types::member::MemberId;
use tovalley_types::page::{PageRequest, Slice};
use tovalley_types::time;

use crate::chat::best_effort::suppress;
use crate::event::bus::{BusError, ChatEventPublisher};
use crate::repository::notification::ChatNotificationRepository;
use crate::repository::room::ChatRoomRepository;

/// Why a notification could not be dispatched.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("chat room {0} does not exist")]
    RoomNotFound(RoomId),

    #[error("sender {sender_id} is not a member of chat room {room_id}")]
    SenderNotInRoom { sender_id: MemberId, room_id: RoomId },

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The inbox record was saved but the event could not be published.
    #[error("notification saved but not published: {source}")]
    Publish {
        notification: Box<ChatNotification>,
        #[source]
        source: BusError,
    },
}

/// Persists and publishes chat notifications.
pub struct NotificationDispatcher<R: ChatRoomRepository, N: ChatNotificationRepository> {
    rooms: Arc<R>,
    notifications: N,
    publisher: Arc<dyn ChatEventPublisher>,
}

impl<R: ChatRoomRepository, N: ChatNotificationRepository> NotificationDispatcher<R, N> {
    pub fn new(rooms: Arc<R>, notifications: N, publisher: Arc<dyn ChatEventPublisher>) -> Self {
        Self {
            rooms,
            notifications,
            publisher,
        }
    }

    /// Access the notification repository.
    pub fn notifications(&self) -> &N {
        &self.notifications
    }

    /// Dispatch a notification for `message`, isolating every failure.
    ///
    /// Returns the persisted record (also when only the publish failed), or
    /// `None` when dispatch failed before persistence. Errors are logged and
    /// never propagated.
    pub async fn on_message_sent(
        &self,
        message: &ChatMessage,
        sender_id: MemberId,
        room_id: RoomId,
    ) -> Option<ChatNotification> {
        match self.try_dispatch(message, sender_id, room_id).await {
            Ok(notification) => Some(notification),
            Err(DispatchError::Publish {
                notification,
                source,
            }) => {
                warn!(
                    %room_id,
                    notification_id = notification.id,
                    error = %source,
                    "notification persisted but not published"
                );
                Some(*notification)
            }
            Err(e) => suppress("chat.notification", Err::<ChatNotification, _>(e)),
        }
    }

    /// Dispatch a notification for `message`, surfacing failures.
    pub async fn try_dispatch(
        &self,
        message: &ChatMessage,
        sender_id: MemberId,
        room_id: RoomId,
    ) -> Result<ChatNotification, DispatchError> {
        let room = self
            .rooms
            .find_with_members(room_id)
            .await?
            .ok_or(DispatchError::RoomNotFound(room_id))?;

        let (sender, recipient) = room
            .perspective_of(sender_id)
            .ok_or(DispatchError::SenderNotInRoom { sender_id, room_id })?;

        let record = NewChatNotification {
            sender_id: sender.id,
            sender_nickname: sender.nickname.clone(),
            recipient_id: recipient.id,
            chat_room_id: room_id,
            content: message.content.clone(),
            created_at: time::now(),
        };
        let notification = self.notifications.save(&record).await?;

        let event = NotificationEvent::from_notification(&notification);
        if let Err(source) = self.publisher.publish_notification(&event) {
            return Err(DispatchError::Publish {
                notification: Box::new(notification),
                source,
            });
        }

        info!(
            %room_id,
            recipient_id = %recipient.id,
            notification_id = notification.id,
            "chat notification dispatched"
        );
        Ok(notification)
    }

    /// A member's notification inbox, newest first.
    pub async fn list_for_recipient(
        &self,
        recipient_id: MemberId,
        page: PageRequest,
    ) -> Result<Slice<ChatNotification>, RepositoryError> {
        self.notifications.list_for_recipient(recipient_id, page).await
    }
}
