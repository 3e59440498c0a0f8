//! Column conversions shared by the SQLite repositories.

use tovalley_types::error::RepositoryError;
use tovalley_types::time::{self, ChatTime};

pub(crate) fn parse_time(s: &str) -> Result<ChatTime, RepositoryError> {
    time::parse(s).map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_time(dt: &ChatTime) -> String {
    time::format(dt)
}

pub(crate) fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}
