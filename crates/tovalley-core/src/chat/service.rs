//! Chat service orchestrating rooms, messages, presence and notifications.
//!
//! `ChatService` coordinates the room registry, the message store, the
//! presence tracker and the notification dispatcher. Sending a message
//! snapshots presence, stamps and persists the message, hands the
//! notification off to a bounded best-effort task when the room is not
//! fully attended, and always publishes the message for live delivery.

use std::cmp::Ordering;
use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tovalley_types::chat::{
    ChatMessage, ChatMessagePage, ChatMessageView, ChatNotification, ChatRoomSummary,
    ChatRoomView, LastMessage, MAX_PARTICIPANTS_PER_ROOM, OutgoingMessage, ReadCount, RoomCreation,
    RoomId,
};
use tovalley_types::error::ChatError;
use tovalley_types::member::{Member, MemberId};
use tovalley_types::page::{PageRequest, Slice};
use tovalley_types::time;

use crate::chat::best_effort::{BestEffortRunner, suppress};
use crate::chat::dispatcher::NotificationDispatcher;
use crate::event::bus::ChatEventPublisher;
use crate::presence::PresenceTracker;
use crate::repository::member::MemberDirectory;
use crate::repository::message::ChatMessageRepository;
use crate::repository::notification::ChatNotificationRepository;
use crate::repository::room::ChatRoomRepository;

/// Tunables of the chat orchestrator.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Number of members a room needs present to count as fully attended.
    pub room_size: usize,
    /// Maximum number of notification dispatches in flight.
    pub notification_concurrency: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            room_size: MAX_PARTICIPANTS_PER_ROOM,
            notification_concurrency: 64,
        }
    }
}

/// Handle on the notification side effect of a send.
///
/// Dropping the ticket does not cancel the dispatch.
#[derive(Debug)]
pub enum NotificationTicket {
    /// Every member was present; no notification was needed.
    NotNeeded,
    /// A notification was needed but the dispatch limit was reached.
    Dropped,
    /// Dispatch is running in the background.
    Pending(tokio::task::JoinHandle<Option<ChatNotification>>),
}

impl NotificationTicket {
    /// Wait for the dispatch to finish and return the persisted record.
    pub async fn wait(self) -> Option<ChatNotification> {
        match self {
            NotificationTicket::Pending(handle) => handle.await.ok().flatten(),
            NotificationTicket::NotNeeded | NotificationTicket::Dropped => None,
        }
    }

    pub fn is_needed(&self) -> bool {
        !matches!(self, NotificationTicket::NotNeeded)
    }
}

/// Result of a successful send.
#[derive(Debug)]
pub struct SendReceipt {
    /// The persisted message.
    pub message: ChatMessage,
    /// Presence snapshot taken before the append.
    pub all_present: bool,
    /// Live subscribers the message was published to.
    pub delivered_live: usize,
    pub notification: NotificationTicket,
}

/// Result of a member opening a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomEntry {
    pub chat_room_id: RoomId,
    /// Messages transitioned from unread to read by entering.
    pub marked_read: u64,
    /// The counterpart, if they currently have the room open.
    pub other_participant: Option<MemberId>,
}

/// Orchestrates the chat messaging core.
///
/// Generic over every port to maintain clean architecture (tovalley-core
/// never depends on tovalley-infra).
pub struct ChatService<R, M, N, P, D>
where
    R: ChatRoomRepository,
    M: ChatMessageRepository,
    N: ChatNotificationRepository,
    P: PresenceTracker,
    D: MemberDirectory,
{
    rooms: Arc<R>,
    messages: M,
    presence: P,
    members: D,
    publisher: Arc<dyn ChatEventPublisher>,
    dispatcher: Arc<NotificationDispatcher<R, N>>,
    runner: BestEffortRunner,
    settings: ChatSettings,
}

impl<R, M, N, P, D> ChatService<R, M, N, P, D>
where
    R: ChatRoomRepository + 'static,
    M: ChatMessageRepository,
    N: ChatNotificationRepository + 'static,
    P: PresenceTracker,
    D: MemberDirectory,
{
    /// Create a new chat service wired to the given ports.
    pub fn new(
        rooms: R,
        messages: M,
        notifications: N,
        presence: P,
        members: D,
        publisher: Arc<dyn ChatEventPublisher>,
        settings: ChatSettings,
    ) -> Self {
        let rooms = Arc::new(rooms);
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&rooms),
            notifications,
            Arc::clone(&publisher),
        ));
        Self {
            rooms,
            messages,
            presence,
            members,
            publisher,
            dispatcher,
            runner: BestEffortRunner::new(settings.notification_concurrency),
            settings,
        }
    }

    /// Access the room registry.
    pub fn rooms(&self) -> &R {
        &self.rooms
    }

    /// Access the message store.
    pub fn messages(&self) -> &M {
        &self.messages
    }

    /// Access the presence tracker.
    pub fn presence(&self) -> &P {
        &self.presence
    }

    /// Access the member directory.
    pub fn members(&self) -> &D {
        &self.members
    }

    /// Access the notification repository.
    pub fn notifications(&self) -> &N {
        self.dispatcher.notifications()
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    // --- Rooms ---

    /// Return the room shared with `recipient_nick`, creating it if needed.
    ///
    /// An existing room is returned unmodified whichever member opened it.
    pub async fn create_or_get_room(
        &self,
        sender_id: MemberId,
        recipient_nick: &str,
    ) -> Result<RoomCreation, ChatError> {
        let recipient_nick = recipient_nick.trim();
        if recipient_nick.is_empty() {
            return Err(ChatError::Validation(
                "recipient nickname must not be empty".to_string(),
            ));
        }

        if let Some(room) = self
            .rooms
            .find_by_member_and_nickname(sender_id, recipient_nick)
            .await?
        {
            return Ok(RoomCreation {
                created: false,
                chat_room_id: room.id,
            });
        }

        let candidates = self
            .members
            .find_by_id_or_nickname(sender_id, recipient_nick)
            .await?;
        let (sender, recipient) = resolve_pair(&candidates, sender_id, recipient_nick)?;

        let insert = self
            .rooms
            .create(sender.id, recipient.id, &time::now())
            .await?;

        if insert.created {
            info!(
                room_id = %insert.room.id,
                sender_id = %sender.id,
                recipient_id = %recipient.id,
                "chat room created"
            );
        }

        Ok(RoomCreation {
            created: insert.created,
            chat_room_id: insert.room.id,
        })
    }

    /// Rooms of a member with unread count and last message, most recently
    /// active first; rooms without messages come last.
    ///
    /// Sorting applies within the fetched page; `has_next` is the one of the
    /// underlying room page.
    pub async fn get_room_list(
        &self,
        member_id: MemberId,
        page: PageRequest,
    ) -> Result<Slice<ChatRoomView>, ChatError> {
        let rooms = self.rooms.list_for_member(member_id, page).await?;

        let views = try_join_all(
            rooms
                .content
                .iter()
                .map(|summary| self.room_view(summary, member_id)),
        )
        .await?;

        Ok(rooms.with_content(sort_by_last_message(views)))
    }

    async fn room_view(
        &self,
        summary: &ChatRoomSummary,
        member_id: MemberId,
    ) -> Result<ChatRoomView, ChatError> {
        let (unread_message_count, latest) = tokio::try_join!(
            self.messages.count_unread(summary.room_id, member_id),
            self.messages.latest_in_room(summary.room_id),
        )?;

        Ok(ChatRoomView {
            chat_room_id: summary.room_id,
            other_member_id: summary.other_member_id,
            other_member_nickname: summary.other_member_nickname.clone(),
            created_at: summary.created_at,
            unread_message_count,
            last_message: latest.map(|m| LastMessage {
                content: m.content,
                created_at: m.created_at,
            }),
        })
    }

    // --- Messages ---

    /// A page of a room's messages, newest first, flagged per viewer.
    pub async fn get_messages(
        &self,
        member_id: MemberId,
        room_id: RoomId,
        page: PageRequest,
    ) -> Result<ChatMessagePage, ChatError> {
        self.authorize(member_id, room_id).await?;

        let messages = self.messages.list_by_room(room_id, page).await?;

        Ok(ChatMessagePage {
            member_id,
            chat_room_id: room_id,
            chat_messages: messages.map(|m| ChatMessageView::for_viewer(m, member_id)),
        })
    }

    /// Send a message to a room.
    ///
    /// The send succeeds once the message is persisted; notification and
    /// live delivery are best-effort and never fail it.
    pub async fn send_message(
        &self,
        sender_id: MemberId,
        outgoing: OutgoingMessage,
    ) -> Result<SendReceipt, ChatError> {
        let room_id = outgoing.chat_room_id;
        if outgoing.content.trim().is_empty() {
            return Err(ChatError::Validation(
                "message content must not be empty".to_string(),
            ));
        }

        self.authorize(sender_id, room_id).await?;

        let all_present = self.snapshot_attendance(room_id).await;

        let message = ChatMessage {
            id: Uuid::now_v7(),
            chat_room_id: room_id,
            sender_id,
            content: outgoing.content,
            created_at: time::now(),
            read_count: ReadCount::for_attendance(all_present),
        };
        let message = self.messages.append(&message).await?;

        let notification = if all_present {
            NotificationTicket::NotNeeded
        } else {
            let dispatcher = Arc::clone(&self.dispatcher);
            let snapshot = message.clone();
            let task = self.runner.spawn("chat.notification", async move {
                dispatcher
                    .on_message_sent(&snapshot, sender_id, room_id)
                    .await
            });
            match task {
                Some(handle) => NotificationTicket::Pending(handle),
                None => NotificationTicket::Dropped,
            }
        };

        let delivered_live = suppress(
            "chat.publish_message",
            self.publisher.publish_message(&message),
        )
        .unwrap_or(0);

        debug!(
            %room_id,
            %sender_id,
            message_id = %message.id,
            all_present,
            delivered_live,
            "chat message sent"
        );

        Ok(SendReceipt {
            message,
            all_present,
            delivered_live,
            notification,
        })
    }

    /// Mark every message sent to `member_id` in the room as read.
    pub async fn mark_read(&self, member_id: MemberId, room_id: RoomId) -> Result<u64, ChatError> {
        self.authorize(member_id, room_id).await?;
        Ok(self.messages.mark_read(room_id, member_id).await?)
    }

    // --- Presence ---

    /// A member opens a room: record presence and acknowledge unread messages.
    pub async fn enter_room(
        &self,
        member_id: MemberId,
        room_id: RoomId,
    ) -> Result<RoomEntry, ChatError> {
        self.authorize(member_id, room_id).await?;

        suppress(
            "chat.presence_join",
            self.presence.join(member_id, room_id).await,
        );
        let marked_read = self.messages.mark_read(room_id, member_id).await?;
        let other_participant = suppress(
            "chat.presence_lookup",
            self.presence.other_participant(room_id, member_id).await,
        )
        .flatten();

        info!(%room_id, %member_id, marked_read, "member entered chat room");

        Ok(RoomEntry {
            chat_room_id: room_id,
            marked_read,
            other_participant,
        })
    }

    /// A member disconnects: drop every presence record they hold.
    pub async fn leave(&self, member_id: MemberId) -> Result<(), ChatError> {
        self.presence.leave_all(member_id).await?;
        debug!(%member_id, "member left all chat rooms");
        Ok(())
    }

    /// The counterpart currently present in the room, if any.
    pub async fn other_participant(
        &self,
        room_id: RoomId,
        member_id: MemberId,
    ) -> Result<Option<MemberId>, ChatError> {
        Ok(self.presence.other_participant(room_id, member_id).await?)
    }

    // --- Notifications ---

    /// A member's notification inbox, newest first.
    pub async fn list_notifications(
        &self,
        member_id: MemberId,
        page: PageRequest,
    ) -> Result<Slice<ChatNotification>, ChatError> {
        Ok(self.dispatcher.list_for_recipient(member_id, page).await?)
    }

    // --- Helpers ---

    /// `RoomNotFound` for an unknown room, `Forbidden` for a non-member.
    async fn authorize(&self, member_id: MemberId, room_id: RoomId) -> Result<(), ChatError> {
        if self.rooms.is_member(member_id, room_id).await? {
            return Ok(());
        }

        if self.rooms.find_by_id(room_id).await?.is_none() {
            return Err(ChatError::RoomNotFound(room_id));
        }

        warn!(%member_id, %room_id, "member is not a participant of chat room");
        Err(ChatError::Forbidden { member_id, room_id })
    }

    /// Presence snapshot; an unavailable tracker counts as "not attended".
    async fn snapshot_attendance(&self, room_id: RoomId) -> bool {
        suppress(
            "chat.presence_snapshot",
            self.presence
                .is_fully_attended(room_id, self.settings.room_size)
                .await,
        )
        .unwrap_or(false)
    }
}

/// Pick sender and recipient out of the directory lookup.
fn resolve_pair<'a>(
    candidates: &'a [Member],
    sender_id: MemberId,
    recipient_nick: &str,
) -> Result<(&'a Member, &'a Member), ChatError> {
    let sender = candidates
        .iter()
        .find(|m| m.id == sender_id)
        .ok_or_else(|| ChatError::MemberNotFound(format!("member {sender_id}")))?;

    let recipient = match candidates
        .iter()
        .find(|m| m.id != sender_id && m.nickname == recipient_nick)
    {
        Some(recipient) => recipient,
        None if sender.nickname == recipient_nick => {
            return Err(ChatError::Validation(
                "cannot open a chat room with yourself".to_string(),
            ));
        }
        None => return Err(ChatError::MemberNotFound(recipient_nick.to_string())),
    };

    if candidates.len() != MAX_PARTICIPANTS_PER_ROOM {
        return Err(ChatError::Validation(format!(
            "expected {MAX_PARTICIPANTS_PER_ROOM} distinct members, resolved {}",
            candidates.len()
        )));
    }

    Ok((sender, recipient))
}

/// Order rooms by last message time, newest first, rooms without messages
/// last. Ties keep their fetched order.
pub fn sort_by_last_message(mut views: Vec<ChatRoomView>) -> Vec<ChatRoomView> {
    views.sort_by(|a, b| match (a.last_message_time(), b.last_message_time()) {
        (Some(x), Some(y)) => y.cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    views
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use tovalley_types::chat::{
        ChatRoom, ChatRoomWithMembers, NewChatNotification, NotificationEvent, NotificationType,
    };
    use tovalley_types::error::RepositoryError;

    use crate::event::bus::BusError;
    use crate::repository::room::RoomInsert;

    // --- Mock ports for testing ---

    fn member(id: i64, nickname: &str) -> Member {
        Member {
            id: MemberId(id),
            nickname: nickname.to_string(),
        }
    }

    fn directory() -> Vec<Member> {
        vec![member(1, "alice"), member(2, "bob"), member(3, "carol")]
    }

    struct MockMembers {
        members: Vec<Member>,
    }

    impl MemberDirectory for MockMembers {
        async fn find_by_id(&self, member_id: MemberId) -> Result<Option<Member>, RepositoryError> {
            Ok(self.members.iter().find(|m| m.id == member_id).cloned())
        }

        async fn find_by_id_or_nickname(
            &self,
            member_id: MemberId,
            nickname: &str,
        ) -> Result<Vec<Member>, RepositoryError> {
            Ok(self
                .members
                .iter()
                .filter(|m| m.id == member_id || m.nickname == nickname)
                .cloned()
                .collect())
        }
    }

    struct MockRooms {
        members: Vec<Member>,
        rooms: Mutex<Vec<ChatRoom>>,
    }

    impl MockRooms {
        fn nickname_of(&self, id: MemberId) -> Option<String> {
            self.members
                .iter()
                .find(|m| m.id == id)
                .map(|m| m.nickname.clone())
        }

        fn member(&self, id: MemberId) -> Option<Member> {
            self.members.iter().find(|m| m.id == id).cloned()
        }
    }

    impl ChatRoomRepository for MockRooms {
        async fn find_by_member_and_nickname(
            &self,
            member_id: MemberId,
            other_nickname: &str,
        ) -> Result<Option<ChatRoom>, RepositoryError> {
            let rooms = self.rooms.lock().unwrap();
            Ok(rooms
                .iter()
                .find(|r| {
                    r.counterpart_of(member_id)
                        .and_then(|other| self.nickname_of(other))
                        .is_some_and(|nick| nick == other_nickname)
                })
                .cloned())
        }

        async fn create(
            &self,
            sender_id: MemberId,
            recipient_id: MemberId,
            created_at: &time::ChatTime,
        ) -> Result<RoomInsert, RepositoryError> {
            let mut rooms = self.rooms.lock().unwrap();
            if let Some(existing) = rooms
                .iter()
                .find(|r| r.has_member(sender_id) && r.has_member(recipient_id))
            {
                return Ok(RoomInsert {
                    room: existing.clone(),
                    created: false,
                });
            }
            let room = ChatRoom {
                id: RoomId(rooms.len() as i64 + 1),
                sender_id,
                recipient_id,
                created_at: *created_at,
            };
            rooms.push(room.clone());
            Ok(RoomInsert {
                room,
                created: true,
            })
        }

        async fn find_by_id(&self, room_id: RoomId) -> Result<Option<ChatRoom>, RepositoryError> {
            Ok(self
                .rooms
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == room_id)
                .cloned())
        }

        async fn find_with_members(
            &self,
            room_id: RoomId,
        ) -> Result<Option<ChatRoomWithMembers>, RepositoryError> {
            let room = self
                .rooms
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.id == room_id)
                .cloned();
            Ok(room.and_then(|r| {
                Some(ChatRoomWithMembers {
                    id: r.id,
                    sender: self.member(r.sender_id)?,
                    recipient: self.member(r.recipient_id)?,
                    created_at: r.created_at,
                })
            }))
        }

        async fn list_for_member(
            &self,
            member_id: MemberId,
            page: PageRequest,
        ) -> Result<Slice<ChatRoomSummary>, RepositoryError> {
            let rooms = self.rooms.lock().unwrap();
            let rows: Vec<ChatRoomSummary> = rooms
                .iter()
                .rev()
                .filter_map(|r| {
                    let other = r.counterpart_of(member_id)?;
                    Some(ChatRoomSummary {
                        room_id: r.id,
                        other_member_id: other,
                        other_member_nickname: self.nickname_of(other)?,
                        created_at: r.created_at,
                    })
                })
                .skip(page.offset() as usize)
                .take(page.fetch_limit() as usize)
                .collect();
            Ok(Slice::from_overfetch(rows, page))
        }

        async fn is_member(
            &self,
            member_id: MemberId,
            room_id: RoomId,
        ) -> Result<bool, RepositoryError> {
            Ok(self
                .rooms
                .lock()
                .unwrap()
                .iter()
                .any(|r| r.id == room_id && r.has_member(member_id)))
        }
    }

    #[derive(Default)]
    struct MockMessages {
        messages: Mutex<Vec<ChatMessage>>,
    }

    impl ChatMessageRepository for MockMessages {
        async fn append(&self, message: &ChatMessage) -> Result<ChatMessage, RepositoryError> {
            self.messages.lock().unwrap().push(message.clone());
            Ok(message.clone())
        }

        async fn list_by_room(
            &self,
            room_id: RoomId,
            page: PageRequest,
        ) -> Result<Slice<ChatMessage>, RepositoryError> {
            let mut rows: Vec<ChatMessage> = self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.chat_room_id == room_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            let rows = rows
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.fetch_limit() as usize)
                .collect();
            Ok(Slice::from_overfetch(rows, page))
        }

        async fn latest_in_room(
            &self,
            room_id: RoomId,
        ) -> Result<Option<ChatMessage>, RepositoryError> {
            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.chat_room_id == room_id)
                .max_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)))
                .cloned())
        }

        async fn count_unread(
            &self,
            room_id: RoomId,
            member_id: MemberId,
        ) -> Result<u64, RepositoryError> {
            Ok(self
                .messages
                .lock()
                .unwrap()
                .iter()
                .filter(|m| {
                    m.chat_room_id == room_id
                        && m.read_count == ReadCount::Unread
                        && m.sender_id != member_id
                })
                .count() as u64)
        }

        async fn mark_read(
            &self,
            room_id: RoomId,
            member_id: MemberId,
        ) -> Result<u64, RepositoryError> {
            let mut changed = 0;
            for m in self.messages.lock().unwrap().iter_mut() {
                if m.chat_room_id == room_id
                    && m.read_count == ReadCount::Unread
                    && m.sender_id != member_id
                {
                    m.read_count = ReadCount::Read;
                    changed += 1;
                }
            }
            Ok(changed)
        }
    }

    #[derive(Default)]
    struct MockNotifications {
        records: Mutex<Vec<ChatNotification>>,
        fail: bool,
    }

    impl ChatNotificationRepository for MockNotifications {
        async fn save(
            &self,
            notification: &NewChatNotification,
        ) -> Result<ChatNotification, RepositoryError> {
            if self.fail {
                return Err(RepositoryError::Connection);
            }
            let mut records = self.records.lock().unwrap();
            let saved = ChatNotification {
                id: records.len() as i64 + 1,
                sender_id: notification.sender_id,
                sender_nickname: notification.sender_nickname.clone(),
                recipient_id: notification.recipient_id,
                chat_room_id: notification.chat_room_id,
                content: notification.content.clone(),
                created_at: notification.created_at,
            };
            records.push(saved.clone());
            Ok(saved)
        }

        async fn list_for_recipient(
            &self,
            recipient_id: MemberId,
            page: PageRequest,
        ) -> Result<Slice<ChatNotification>, RepositoryError> {
            let rows = self
                .records
                .lock()
                .unwrap()
                .iter()
                .rev()
                .filter(|n| n.recipient_id == recipient_id)
                .skip(page.offset() as usize)
                .take(page.fetch_limit() as usize)
                .cloned()
                .collect();
            Ok(Slice::from_overfetch(rows, page))
        }
    }

    #[derive(Default)]
    struct MockPresence {
        records: Mutex<BTreeSet<(RoomId, MemberId)>>,
        fail: bool,
    }

    impl PresenceTracker for MockPresence {
        async fn join(&self, member_id: MemberId, room_id: RoomId) -> Result<(), RepositoryError> {
            self.records.lock().unwrap().insert((room_id, member_id));
            Ok(())
        }

        async fn leave_all(&self, member_id: MemberId) -> Result<(), RepositoryError> {
            self.records.lock().unwrap().retain(|(_, m)| *m != member_id);
            Ok(())
        }

        async fn participants_of(
            &self,
            room_id: RoomId,
        ) -> Result<BTreeSet<MemberId>, RepositoryError> {
            if self.fail {
                return Err(RepositoryError::Connection);
            }
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|(r, _)| *r == room_id)
                .map(|(_, m)| *m)
                .collect())
        }

        async fn other_participant(
            &self,
            room_id: RoomId,
            member_id: MemberId,
        ) -> Result<Option<MemberId>, RepositoryError> {
            Ok(self
                .participants_of(room_id)
                .await?
                .into_iter()
                .find(|m| *m != member_id))
        }

        async fn is_fully_attended(
            &self,
            room_id: RoomId,
            expected_size: usize,
        ) -> Result<bool, RepositoryError> {
            Ok(self.participants_of(room_id).await?.len() == expected_size)
        }
    }

    #[derive(Default)]
    struct RecordingPublisher {
        messages: Mutex<Vec<ChatMessage>>,
        notifications: Mutex<Vec<NotificationEvent>>,
        fail_notifications: bool,
    }

    impl ChatEventPublisher for RecordingPublisher {
        fn publish_message(&self, message: &ChatMessage) -> Result<usize, BusError> {
            self.messages.lock().unwrap().push(message.clone());
            Ok(1)
        }

        fn publish_notification(&self, event: &NotificationEvent) -> Result<usize, BusError> {
            if self.fail_notifications {
                return Err(BusError::PublishFailed {
                    topic: "notification".to_string(),
                    reason: "broker unavailable".to_string(),
                });
            }
            self.notifications.lock().unwrap().push(event.clone());
            Ok(1)
        }
    }

    type TestService =
        ChatService<MockRooms, MockMessages, MockNotifications, MockPresence, MockMembers>;

    fn service_with(
        notifications: MockNotifications,
        presence: MockPresence,
        publisher: Arc<RecordingPublisher>,
    ) -> TestService {
        ChatService::new(
            MockRooms {
                members: directory(),
                rooms: Mutex::new(Vec::new()),
            },
            MockMessages::default(),
            notifications,
            presence,
            MockMembers {
                members: directory(),
            },
            publisher,
            ChatSettings::default(),
        )
    }

    fn service() -> (TestService, Arc<RecordingPublisher>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let svc = service_with(
            MockNotifications::default(),
            MockPresence::default(),
            Arc::clone(&publisher),
        );
        (svc, publisher)
    }

    fn outgoing(room_id: RoomId, content: &str) -> OutgoingMessage {
        OutgoingMessage {
            chat_room_id: room_id,
            content: content.to_string(),
        }
    }

    const ALICE: MemberId = MemberId(1);
    const BOB: MemberId = MemberId(2);
    const CAROL: MemberId = MemberId(3);

    // --- Rooms ---

    #[tokio::test]
    async fn create_or_get_room_is_symmetric() {
        let (svc, _) = service();

        let first = svc.create_or_get_room(ALICE, "bob").await.unwrap();
        assert!(first.created);

        let second = svc.create_or_get_room(BOB, "alice").await.unwrap();
        assert!(!second.created);
        assert_eq!(second.chat_room_id, first.chat_room_id);

        let again = svc.create_or_get_room(ALICE, "bob").await.unwrap();
        assert!(!again.created);
        assert_eq!(again.chat_room_id, first.chat_room_id);
    }

    #[tokio::test]
    async fn create_or_get_room_unknown_recipient_is_not_found() {
        let (svc, _) = service();
        let err = svc.create_or_get_room(ALICE, "mallory").await.unwrap_err();
        assert!(matches!(err, ChatError::MemberNotFound(ref nick) if nick == "mallory"));
    }

    #[tokio::test]
    async fn create_or_get_room_unknown_sender_is_not_found() {
        let (svc, _) = service();
        let err = svc.create_or_get_room(MemberId(99), "bob").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn create_or_get_room_with_self_is_rejected() {
        let (svc, _) = service();
        let err = svc.create_or_get_room(ALICE, "alice").await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    // --- Sending ---

    #[tokio::test]
    async fn send_to_absent_recipient_is_unread_and_notifies() {
        let (svc, publisher) = service();
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;

        let receipt = svc.send_message(ALICE, outgoing(room, "hello")).await.unwrap();
        assert!(!receipt.all_present);
        assert_eq!(receipt.message.read_count, ReadCount::Unread);
        assert!(receipt.notification.is_needed());

        let notification = receipt.notification.wait().await.expect("notification persisted");
        assert_eq!(notification.recipient_id, BOB);
        assert_eq!(notification.sender_nickname, "alice");
        assert_eq!(notification.content, "hello");

        assert_eq!(svc.notifications().records.lock().unwrap().len(), 1);
        let events = publisher.notifications.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].notification_type, NotificationType::Chat);
        assert_eq!(events[0].recipient_id, BOB);
        assert_eq!(publisher.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_with_both_present_is_read_without_notification() {
        let (svc, publisher) = service();
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;
        svc.enter_room(ALICE, room).await.unwrap();
        svc.enter_room(BOB, room).await.unwrap();

        let receipt = svc.send_message(ALICE, outgoing(room, "hi")).await.unwrap();
        assert!(receipt.all_present);
        assert_eq!(receipt.message.read_count, ReadCount::Read);
        assert!(!receipt.notification.is_needed());
        assert!(receipt.notification.wait().await.is_none());

        assert!(svc.notifications().records.lock().unwrap().is_empty());
        assert!(publisher.notifications.lock().unwrap().is_empty());
        assert_eq!(publisher.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_succeeds_when_notification_publish_fails() {
        let publisher = Arc::new(RecordingPublisher {
            fail_notifications: true,
            ..Default::default()
        });
        let svc = service_with(
            MockNotifications::default(),
            MockPresence::default(),
            Arc::clone(&publisher),
        );
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;

        let receipt = svc.send_message(ALICE, outgoing(room, "hello")).await.unwrap();
        let notification = receipt.notification.wait().await;

        // The inbox record survives the failed publish.
        assert!(notification.is_some());
        assert_eq!(svc.notifications().records.lock().unwrap().len(), 1);
        assert_eq!(svc.messages().messages.lock().unwrap().len(), 1);
        assert_eq!(publisher.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn send_succeeds_when_notification_store_fails() {
        let publisher = Arc::new(RecordingPublisher::default());
        let svc = service_with(
            MockNotifications {
                fail: true,
                ..Default::default()
            },
            MockPresence::default(),
            Arc::clone(&publisher),
        );
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;

        let receipt = svc.send_message(ALICE, outgoing(room, "hello")).await.unwrap();
        assert!(receipt.notification.wait().await.is_none());

        assert_eq!(svc.messages().messages.lock().unwrap().len(), 1);
        assert!(publisher.notifications.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_with_presence_unavailable_degrades_to_notify() {
        let publisher = Arc::new(RecordingPublisher::default());
        let svc = service_with(
            MockNotifications::default(),
            MockPresence {
                fail: true,
                ..Default::default()
            },
            Arc::clone(&publisher),
        );
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;

        let receipt = svc.send_message(ALICE, outgoing(room, "hello")).await.unwrap();
        assert_eq!(receipt.message.read_count, ReadCount::Unread);
        assert!(receipt.notification.wait().await.is_some());
    }

    #[tokio::test]
    async fn send_by_outsider_is_forbidden() {
        let (svc, publisher) = service();
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;

        let err = svc.send_message(CAROL, outgoing(room, "hey")).await.unwrap_err();
        assert!(matches!(err, ChatError::Forbidden { member_id, .. } if member_id == CAROL));
        assert!(svc.messages().messages.lock().unwrap().is_empty());
        assert!(publisher.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let (svc, publisher) = service();
        svc.create_or_get_room(ALICE, "bob").await.unwrap();
        let missing = RoomId(4242);

        let err = svc
            .get_messages(ALICE, missing, PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::RoomNotFound(id) if id == missing));

        let err = svc.send_message(ALICE, outgoing(missing, "hello")).await.unwrap_err();
        assert!(matches!(err, ChatError::RoomNotFound(id) if id == missing));
        assert!(err.is_not_found());

        assert!(matches!(
            svc.mark_read(ALICE, missing).await.unwrap_err(),
            ChatError::RoomNotFound(_)
        ));
        assert!(matches!(
            svc.enter_room(ALICE, missing).await.unwrap_err(),
            ChatError::RoomNotFound(_)
        ));
        assert!(svc.messages().messages.lock().unwrap().is_empty());
        assert!(publisher.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_empty_content_is_rejected() {
        let (svc, _) = service();
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;
        let err = svc.send_message(ALICE, outgoing(room, "   ")).await.unwrap_err();
        assert!(matches!(err, ChatError::Validation(_)));
    }

    // --- Read tracking ---

    #[tokio::test]
    async fn unread_count_and_mark_read_are_idempotent() {
        let (svc, _) = service();
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;
        for i in 0..3 {
            let receipt = svc
                .send_message(ALICE, outgoing(room, &format!("m{i}")))
                .await
                .unwrap();
            assert!(receipt.notification.wait().await.is_some());
        }

        // Exactly one inbox record per message sent to the absent recipient.
        let inbox = svc.list_notifications(BOB, PageRequest::default()).await.unwrap();
        assert_eq!(inbox.content.len(), 3);
        assert_eq!(svc.notifications().records.lock().unwrap().len(), 3);

        let list = svc.get_room_list(BOB, PageRequest::default()).await.unwrap();
        assert_eq!(list.content[0].unread_message_count, 3);

        // The sender has nothing unread in their own room.
        let list = svc.get_room_list(ALICE, PageRequest::default()).await.unwrap();
        assert_eq!(list.content[0].unread_message_count, 0);

        assert_eq!(svc.mark_read(BOB, room).await.unwrap(), 3);
        assert_eq!(svc.mark_read(BOB, room).await.unwrap(), 0);

        let list = svc.get_room_list(BOB, PageRequest::default()).await.unwrap();
        assert_eq!(list.content[0].unread_message_count, 0);
    }

    #[tokio::test]
    async fn enter_room_joins_presence_and_marks_read() {
        let (svc, _) = service();
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;
        svc.send_message(ALICE, outgoing(room, "ping")).await.unwrap();
        svc.enter_room(ALICE, room).await.unwrap();

        let entry = svc.enter_room(BOB, room).await.unwrap();
        assert_eq!(entry.marked_read, 1);
        assert_eq!(entry.other_participant, Some(ALICE));
        assert_eq!(svc.other_participant(room, ALICE).await.unwrap(), Some(BOB));
    }

    #[tokio::test]
    async fn leave_drops_presence() {
        let (svc, _) = service();
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;
        svc.enter_room(ALICE, room).await.unwrap();
        svc.enter_room(BOB, room).await.unwrap();

        svc.leave(BOB).await.unwrap();
        svc.leave(BOB).await.unwrap();
        assert_eq!(svc.other_participant(room, ALICE).await.unwrap(), None);

        let receipt = svc.send_message(ALICE, outgoing(room, "gone?")).await.unwrap();
        assert_eq!(receipt.message.read_count, ReadCount::Unread);
    }

    #[tokio::test]
    async fn enter_room_by_outsider_is_forbidden() {
        let (svc, _) = service();
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;
        let err = svc.enter_room(CAROL, room).await.unwrap_err();
        assert!(matches!(err, ChatError::Forbidden { .. }));
    }

    // --- Listing ---

    #[tokio::test]
    async fn room_list_puts_empty_rooms_last() {
        let (svc, _) = service();
        let with_messages = svc.create_or_get_room(BOB, "alice").await.unwrap().chat_room_id;
        let empty = svc.create_or_get_room(BOB, "carol").await.unwrap().chat_room_id;
        svc.send_message(ALICE, outgoing(with_messages, "hi bob"))
            .await
            .unwrap();

        let list = svc.get_room_list(BOB, PageRequest::default()).await.unwrap();
        let ids: Vec<RoomId> = list.content.iter().map(|r| r.chat_room_id).collect();
        assert_eq!(ids, vec![with_messages, empty]);

        let first = &list.content[0];
        assert_eq!(first.other_member_nickname, "alice");
        assert_eq!(first.last_message.as_ref().unwrap().content, "hi bob");
        assert!(list.content[1].last_message.is_none());
    }

    #[tokio::test]
    async fn room_list_keeps_has_next_of_room_page() {
        let (svc, _) = service();
        svc.create_or_get_room(BOB, "alice").await.unwrap();
        svc.create_or_get_room(BOB, "carol").await.unwrap();

        let list = svc.get_room_list(BOB, PageRequest::new(0, 1)).await.unwrap();
        assert_eq!(list.content.len(), 1);
        assert!(list.has_next);
    }

    #[tokio::test]
    async fn get_messages_flags_viewer_and_orders_newest_first() {
        let (svc, _) = service();
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;
        svc.send_message(ALICE, outgoing(room, "first")).await.unwrap();
        svc.send_message(BOB, outgoing(room, "second")).await.unwrap();

        let page = svc
            .get_messages(ALICE, room, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.member_id, ALICE);
        let contents: Vec<&str> = page
            .chat_messages
            .content
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["second", "first"]);
        assert!(!page.chat_messages.content[0].my_msg);
        assert!(page.chat_messages.content[1].my_msg);

        let err = svc
            .get_messages(CAROL, room, PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn notifications_are_listed_for_recipient() {
        let (svc, _) = service();
        let room = svc.create_or_get_room(ALICE, "bob").await.unwrap().chat_room_id;
        let receipt = svc.send_message(ALICE, outgoing(room, "inbox")).await.unwrap();
        receipt.notification.wait().await;

        let inbox = svc.list_notifications(BOB, PageRequest::default()).await.unwrap();
        assert_eq!(inbox.content.len(), 1);
        assert_eq!(inbox.content[0].content, "inbox");
        assert!(svc
            .list_notifications(ALICE, PageRequest::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn sort_by_last_message_orders_nulls_last() {
        let t0 = time::now();
        let t1 = t0 + chrono::Duration::seconds(5);
        let view = |id: i64, at: Option<time::ChatTime>| ChatRoomView {
            chat_room_id: RoomId(id),
            other_member_id: MemberId(id),
            other_member_nickname: format!("m{id}"),
            created_at: t0,
            unread_message_count: 0,
            last_message: at.map(|created_at| LastMessage {
                content: "x".to_string(),
                created_at,
            }),
        };

        let sorted = sort_by_last_message(vec![
            view(1, None),
            view(2, Some(t0)),
            view(3, None),
            view(4, Some(t1)),
        ]);
        let ids: Vec<i64> = sorted.iter().map(|v| v.chat_room_id.0).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
    }
}
