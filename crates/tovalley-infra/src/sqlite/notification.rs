//! SQLite notification inbox implementation.

use sqlx::Row;

use tovalley_core::repository::notification::ChatNotificationRepository;
use tovalley_types::chat::{ChatNotification, NewChatNotification, RoomId};
use tovalley_types::error::RepositoryError;
use tovalley_types::member::MemberId;
use tovalley_types::page::{PageRequest, Slice};

use super::convert::{format_time, parse_time};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatNotificationRepository`.
pub struct SqliteChatNotificationRepository {
    pool: DatabasePool,
}

impl SqliteChatNotificationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ChatNotificationRow {
    id: i64,
    sender_id: i64,
    sender_nickname: String,
    recipient_id: i64,
    chat_room_id: i64,
    content: String,
    created_at: String,
}

impl ChatNotificationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            sender_nickname: row.try_get("sender_nickname")?,
            recipient_id: row.try_get("recipient_id")?,
            chat_room_id: row.try_get("chat_room_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_domain(self) -> Result<ChatNotification, RepositoryError> {
        Ok(ChatNotification {
            id: self.id,
            sender_id: MemberId(self.sender_id),
            sender_nickname: self.sender_nickname,
            recipient_id: MemberId(self.recipient_id),
            chat_room_id: RoomId(self.chat_room_id),
            content: self.content,
            created_at: parse_time(&self.created_at)?,
        })
    }
}

impl ChatNotificationRepository for SqliteChatNotificationRepository {
    async fn save(
        &self,
        notification: &NewChatNotification,
    ) -> Result<ChatNotification, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO chat_notifications (sender_id, sender_nickname, recipient_id, chat_room_id, content, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(notification.sender_id.0)
        .bind(&notification.sender_nickname)
        .bind(notification.recipient_id.0)
        .bind(notification.chat_room_id.0)
        .bind(&notification.content)
        .bind(format_time(&notification.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(ChatNotification {
            id: result.last_insert_rowid(),
            sender_id: notification.sender_id,
            sender_nickname: notification.sender_nickname.clone(),
            recipient_id: notification.recipient_id,
            chat_room_id: notification.chat_room_id,
            content: notification.content.clone(),
            created_at: notification.created_at,
        })
    }

    async fn list_for_recipient(
        &self,
        recipient_id: MemberId,
        page: PageRequest,
    ) -> Result<Slice<ChatNotification>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM chat_notifications
               WHERE recipient_id = ?
               ORDER BY id DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(recipient_id.0)
        .bind(page.fetch_limit())
        .bind(page.offset())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut notifications = Vec::with_capacity(rows.len());
        for row in &rows {
            let n_row = ChatNotificationRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            notifications.push(n_row.into_domain()?);
        }

        Ok(Slice::from_overfetch(notifications, page))
    }
}
