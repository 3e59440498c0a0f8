//! SQLite member directory.
//!
//! Implements `MemberDirectory` from `tovalley-core`. Registration and
//! listing are used by the `member` CLI commands only; the chat core reads
//! the directory through the trait.

use sqlx::Row;
use tracing::info;

use tovalley_core::repository::member::MemberDirectory;
use tovalley_types::error::RepositoryError;
use tovalley_types::member::{Member, MemberId};
use tovalley_types::time;

use super::convert::format_time;
use super::pool::DatabasePool;

/// SQLite-backed member directory.
pub struct SqliteMemberDirectory {
    pool: DatabasePool,
}

impl SqliteMemberDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Register a member under a unique nickname.
    pub async fn add(&self, nickname: &str) -> Result<Member, RepositoryError> {
        let nickname = nickname.trim();
        let result = sqlx::query("INSERT INTO members (nickname, created_at) VALUES (?, ?)")
            .bind(nickname)
            .bind(format_time(&time::now()))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    RepositoryError::Conflict(format!("nickname '{nickname}' is already taken"))
                }
                other => RepositoryError::Query(other.to_string()),
            })?;

        let member = Member {
            id: MemberId(result.last_insert_rowid()),
            nickname: nickname.to_string(),
        };
        info!(member_id = %member.id, nickname = %member.nickname, "member registered");
        Ok(member)
    }

    /// All members ordered by ID.
    pub async fn list(&self) -> Result<Vec<Member>, RepositoryError> {
        let rows = sqlx::query("SELECT id, nickname FROM members ORDER BY id")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(member_from_row).collect()
    }
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Member, RepositoryError> {
    Ok(Member {
        id: MemberId(
            row.try_get("id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?,
        ),
        nickname: row
            .try_get("nickname")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
    })
}

impl MemberDirectory for SqliteMemberDirectory {
    async fn find_by_id(&self, member_id: MemberId) -> Result<Option<Member>, RepositoryError> {
        let row = sqlx::query("SELECT id, nickname FROM members WHERE id = ?")
            .bind(member_id.0)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(member_from_row).transpose()
    }

    async fn find_by_id_or_nickname(
        &self,
        member_id: MemberId,
        nickname: &str,
    ) -> Result<Vec<Member>, RepositoryError> {
        let rows = sqlx::query("SELECT id, nickname FROM members WHERE id = ? OR nickname = ?")
            .bind(member_id.0)
            .bind(nickname)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(member_from_row).collect()
    }
}
