//! Member identification extractor.
//!
//! The calling member is named by:
//! - `X-Member-Id: <id>` header
//! - `member_id=<id>` query parameter (for WebSocket clients that cannot
//!   set headers)
//!
//! The id is checked against the member directory; unknown ids are rejected.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use tovalley_core::repository::member::MemberDirectory;
use tovalley_types::member::{Member, MemberId};

use crate::http::error::AppError;
use crate::state::AppState;

/// Header carrying the calling member's id.
pub const MEMBER_ID_HEADER: &str = "x-member-id";

/// The member on whose behalf the request is made.
#[derive(Debug, Clone)]
pub struct CurrentMember(pub Member);

impl CurrentMember {
    pub fn id(&self) -> MemberId {
        self.0.id
    }
}

#[derive(Debug, Deserialize)]
struct MemberIdQuery {
    member_id: Option<String>,
}

impl FromRequestParts<AppState> for CurrentMember {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = extract_member_id(parts)?;
        let member_id: MemberId = raw
            .parse()
            .map_err(|_| AppError::Unauthorized(format!("Invalid member id '{raw}'")))?;

        let member = state
            .chat_service
            .members()
            .find_by_id(member_id)
            .await
            .map_err(|e| AppError::Internal(format!("Member lookup failed: {e}")))?
            .ok_or_else(|| AppError::Unauthorized(format!("Unknown member {member_id}")))?;

        Ok(CurrentMember(member))
    }
}

/// Raw member id from the header, falling back to the query string.
fn extract_member_id(parts: &Parts) -> Result<String, AppError> {
    if let Some(value) = parts.headers.get(MEMBER_ID_HEADER) {
        let value = value.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-Member-Id header encoding".to_string())
        })?;
        return Ok(value.trim().to_string());
    }

    if let Ok(Query(MemberIdQuery {
        member_id: Some(id),
    })) = Query::<MemberIdQuery>::try_from_uri(&parts.uri)
    {
        return Ok(id.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing member id. Provide it via the 'X-Member-Id' header.".to_string(),
    ))
}
