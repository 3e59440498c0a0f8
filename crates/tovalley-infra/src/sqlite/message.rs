//! SQLite message store implementation.
//!
//! Implements `ChatMessageRepository` from `tovalley-core`. Messages are
//! ordered by `(created_at, id)`; both columns sort lexicographically in
//! time order (fixed-precision RFC 3339 text and UUID v7).

use sqlx::Row;
use uuid::Uuid;

use tovalley_core::repository::message::ChatMessageRepository;
use tovalley_types::chat::{ChatMessage, ReadCount, RoomId};
use tovalley_types::error::RepositoryError;
use tovalley_types::member::MemberId;
use tovalley_types::page::{PageRequest, Slice};

use super::convert::{count, format_time, parse_time};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatMessageRepository`.
pub struct SqliteChatMessageRepository {
    pool: DatabasePool,
}

impl SqliteChatMessageRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain ChatMessage.
struct ChatMessageRow {
    id: String,
    chat_room_id: i64,
    sender_id: i64,
    content: String,
    created_at: String,
    read_count: i64,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_room_id: row.try_get("chat_room_id")?,
            sender_id: row.try_get("sender_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            read_count: row.try_get("read_count")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let read_count = ReadCount::try_from(self.read_count).map_err(RepositoryError::Query)?;

        Ok(ChatMessage {
            id,
            chat_room_id: RoomId(self.chat_room_id),
            sender_id: MemberId(self.sender_id),
            content: self.content,
            created_at: parse_time(&self.created_at)?,
            read_count,
        })
    }
}

fn decode_all(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ChatMessage>, RepositoryError> {
    let mut messages = Vec::with_capacity(rows.len());
    for row in rows {
        let msg_row =
            ChatMessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        messages.push(msg_row.into_message()?);
    }
    Ok(messages)
}

impl ChatMessageRepository for SqliteChatMessageRepository {
    async fn append(&self, message: &ChatMessage) -> Result<ChatMessage, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO chat_messages (id, chat_room_id, sender_id, content, created_at, read_count)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.chat_room_id.0)
        .bind(message.sender_id.0)
        .bind(&message.content)
        .bind(format_time(&message.created_at))
        .bind(message.read_count.as_i64())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(message.clone())
    }

    async fn list_by_room(
        &self,
        room_id: RoomId,
        page: PageRequest,
    ) -> Result<Slice<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM chat_messages
               WHERE chat_room_id = ?
               ORDER BY created_at DESC, id DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(room_id.0)
        .bind(page.fetch_limit())
        .bind(page.offset())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(Slice::from_overfetch(decode_all(&rows)?, page))
    }

    async fn latest_in_room(&self, room_id: RoomId) -> Result<Option<ChatMessage>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT * FROM chat_messages
               WHERE chat_room_id = ?
               ORDER BY created_at DESC, id DESC
               LIMIT 1"#,
        )
        .bind(room_id.0)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let msg_row = ChatMessageRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(msg_row.into_message()?))
            }
            None => Ok(None),
        }
    }

    async fn count_unread(
        &self,
        room_id: RoomId,
        member_id: MemberId,
    ) -> Result<u64, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) AS cnt FROM chat_messages
               WHERE chat_room_id = ? AND read_count = 1 AND sender_id <> ?"#,
        )
        .bind(room_id.0)
        .bind(member_id.0)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count(cnt))
    }

    async fn mark_read(&self, room_id: RoomId, member_id: MemberId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE chat_messages SET read_count = 0
               WHERE chat_room_id = ? AND read_count = 1 AND sender_id <> ?"#,
        )
        .bind(room_id.0)
        .bind(member_id.0)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}
