//! Member directory trait definition.
//!
//! The directory is owned outside the chat core; only the two lookups the
//! chat core depends on are part of the contract.

use tovalley_types::error::RepositoryError;
use tovalley_types::member::{Member, MemberId};

/// Read-only view of the member directory.
pub trait MemberDirectory: Send + Sync {
    /// Look up a member by ID.
    fn find_by_id(
        &self,
        member_id: MemberId,
    ) -> impl std::future::Future<Output = Result<Option<Member>, RepositoryError>> + Send;

    /// Members whose ID is `member_id` or whose nickname is `nickname`.
    ///
    /// Yields at most two members (nicknames are unique).
    fn find_by_id_or_nickname(
        &self,
        member_id: MemberId,
        nickname: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Member>, RepositoryError>> + Send;
}
