//! SQLite room registry implementation.
//!
//! Implements `ChatRoomRepository` from `tovalley-core`. Pair uniqueness is
//! enforced by a unique expression index on the unordered member pair, so a
//! concurrent create for the same pair resolves to the room that won.

use sqlx::Row;
use tracing::debug;

use tovalley_core::repository::room::{ChatRoomRepository, RoomInsert};
use tovalley_types::chat::{ChatRoom, ChatRoomSummary, ChatRoomWithMembers, RoomId};
use tovalley_types::error::RepositoryError;
use tovalley_types::member::{Member, MemberId};
use tovalley_types::page::{PageRequest, Slice};
use tovalley_types::time::ChatTime;

use super::convert::{format_time, parse_time};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRoomRepository`.
pub struct SqliteChatRoomRepository {
    pool: DatabasePool,
}

impl SqliteChatRoomRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn find_by_pair(
        &self,
        a: MemberId,
        b: MemberId,
    ) -> Result<Option<ChatRoom>, RepositoryError> {
        // Read from the writer so a row committed by a concurrent create is visible.
        let row = sqlx::query(
            r#"SELECT id, sender_id, recipient_id, created_at FROM chat_rooms
               WHERE min(sender_id, recipient_id) = min(?, ?)
                 AND max(sender_id, recipient_id) = max(?, ?)"#,
        )
        .bind(a.0)
        .bind(b.0)
        .bind(a.0)
        .bind(b.0)
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(ChatRoomRow::decode).transpose()
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatRoomRow {
    id: i64,
    sender_id: i64,
    recipient_id: i64,
    created_at: String,
}

impl ChatRoomRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            recipient_id: row.try_get("recipient_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn decode(row: &sqlx::sqlite::SqliteRow) -> Result<ChatRoom, RepositoryError> {
        Self::from_row(row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_room()
    }

    fn into_room(self) -> Result<ChatRoom, RepositoryError> {
        Ok(ChatRoom {
            id: RoomId(self.id),
            sender_id: MemberId(self.sender_id),
            recipient_id: MemberId(self.recipient_id),
            created_at: parse_time(&self.created_at)?,
        })
    }
}

struct RoomWithMembersRow {
    id: i64,
    created_at: String,
    sender_id: i64,
    sender_nickname: String,
    recipient_id: i64,
    recipient_nickname: String,
}

impl RoomWithMembersRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            sender_id: row.try_get("sender_id")?,
            sender_nickname: row.try_get("sender_nickname")?,
            recipient_id: row.try_get("recipient_id")?,
            recipient_nickname: row.try_get("recipient_nickname")?,
        })
    }

    fn into_domain(self) -> Result<ChatRoomWithMembers, RepositoryError> {
        Ok(ChatRoomWithMembers {
            id: RoomId(self.id),
            sender: Member {
                id: MemberId(self.sender_id),
                nickname: self.sender_nickname,
            },
            recipient: Member {
                id: MemberId(self.recipient_id),
                nickname: self.recipient_nickname,
            },
            created_at: parse_time(&self.created_at)?,
        })
    }
}

struct RoomSummaryRow {
    id: i64,
    created_at: String,
    other_member_id: i64,
    other_member_nickname: String,
}

impl RoomSummaryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            other_member_id: row.try_get("other_member_id")?,
            other_member_nickname: row.try_get("other_member_nickname")?,
        })
    }

    fn into_domain(self) -> Result<ChatRoomSummary, RepositoryError> {
        Ok(ChatRoomSummary {
            room_id: RoomId(self.id),
            other_member_id: MemberId(self.other_member_id),
            other_member_nickname: self.other_member_nickname,
            created_at: parse_time(&self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ChatRoomRepository implementation
// ---------------------------------------------------------------------------

impl ChatRoomRepository for SqliteChatRoomRepository {
    async fn find_by_member_and_nickname(
        &self,
        member_id: MemberId,
        other_nickname: &str,
    ) -> Result<Option<ChatRoom>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT r.id, r.sender_id, r.recipient_id, r.created_at
               FROM chat_rooms r
               JOIN members m
                 ON m.id = CASE WHEN r.sender_id = ? THEN r.recipient_id ELSE r.sender_id END
               WHERE (r.sender_id = ? OR r.recipient_id = ?) AND m.nickname = ?
               LIMIT 1"#,
        )
        .bind(member_id.0)
        .bind(member_id.0)
        .bind(member_id.0)
        .bind(other_nickname)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(ChatRoomRow::decode).transpose()
    }

    async fn create(
        &self,
        sender_id: MemberId,
        recipient_id: MemberId,
        created_at: &ChatTime,
    ) -> Result<RoomInsert, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO chat_rooms (sender_id, recipient_id, created_at)
               VALUES (?, ?, ?)
               ON CONFLICT DO NOTHING"#,
        )
        .bind(sender_id.0)
        .bind(recipient_id.0)
        .bind(format_time(created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 1 {
            return Ok(RoomInsert {
                room: ChatRoom {
                    id: RoomId(result.last_insert_rowid()),
                    sender_id,
                    recipient_id,
                    created_at: *created_at,
                },
                created: true,
            });
        }

        debug!(%sender_id, %recipient_id, "room already exists for pair");
        let room = self.find_by_pair(sender_id, recipient_id).await?.ok_or_else(|| {
            RepositoryError::Conflict(format!(
                "room for members {sender_id} and {recipient_id} conflicted but was not found"
            ))
        })?;

        Ok(RoomInsert {
            room,
            created: false,
        })
    }

    async fn find_by_id(&self, room_id: RoomId) -> Result<Option<ChatRoom>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, sender_id, recipient_id, created_at FROM chat_rooms WHERE id = ?",
        )
        .bind(room_id.0)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(ChatRoomRow::decode).transpose()
    }

    async fn find_with_members(
        &self,
        room_id: RoomId,
    ) -> Result<Option<ChatRoomWithMembers>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT r.id, r.created_at,
                      s.id AS sender_id, s.nickname AS sender_nickname,
                      t.id AS recipient_id, t.nickname AS recipient_nickname
               FROM chat_rooms r
               JOIN members s ON s.id = r.sender_id
               JOIN members t ON t.id = r.recipient_id
               WHERE r.id = ?"#,
        )
        .bind(room_id.0)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let room_row = RoomWithMembersRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(room_row.into_domain()?))
            }
            None => Ok(None),
        }
    }

    async fn list_for_member(
        &self,
        member_id: MemberId,
        page: PageRequest,
    ) -> Result<Slice<ChatRoomSummary>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT r.id, r.created_at,
                      m.id AS other_member_id, m.nickname AS other_member_nickname
               FROM chat_rooms r
               JOIN members m
                 ON m.id = CASE WHEN r.sender_id = ? THEN r.recipient_id ELSE r.sender_id END
               WHERE r.sender_id = ? OR r.recipient_id = ?
               ORDER BY r.created_at DESC, r.id DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(member_id.0)
        .bind(member_id.0)
        .bind(member_id.0)
        .bind(page.fetch_limit())
        .bind(page.offset())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let summary_row = RoomSummaryRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            summaries.push(summary_row.into_domain()?);
        }

        Ok(Slice::from_overfetch(summaries, page))
    }

    async fn is_member(
        &self,
        member_id: MemberId,
        room_id: RoomId,
    ) -> Result<bool, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT EXISTS(
                   SELECT 1 FROM chat_rooms
                   WHERE id = ? AND (sender_id = ? OR recipient_id = ?)
               ) AS present"#,
        )
        .bind(room_id.0)
        .bind(member_id.0)
        .bind(member_id.0)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let present: i64 = row
            .try_get("present")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(present != 0)
    }
}
