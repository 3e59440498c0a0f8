//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use tovalley_types::error::ChatError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Errors raised by chat operations.
    Chat(ChatError),
    /// Missing or unknown member identity.
    Unauthorized(String),
    /// Malformed request input caught before reaching the service.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl AppError {
    /// Status, machine-readable code and message for this error.
    pub fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(e @ ChatError::RoomNotFound(_)) => {
                (StatusCode::NOT_FOUND, "ROOM_NOT_FOUND", e.to_string())
            }
            AppError::Chat(e @ ChatError::MemberNotFound(_)) => {
                (StatusCode::NOT_FOUND, "MEMBER_NOT_FOUND", e.to_string())
            }
            AppError::Chat(e @ ChatError::Forbidden { .. }) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", e.to_string())
            }
            AppError::Chat(ChatError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(ChatError::Storage(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                "Storage is unavailable".to_string(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            match &self {
                AppError::Chat(e) => tracing::error!(error = %e, code, "request failed"),
                _ => tracing::error!(%message, code, "request failed"),
            }
        }

        (status, Json(ApiResponse::failure(code, &message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tovalley_types::chat::RoomId;
    use tovalley_types::error::RepositoryError;
    use tovalley_types::member::MemberId;

    #[test]
    fn chat_errors_map_to_statuses() {
        let cases = [
            (ChatError::RoomNotFound(RoomId(1)), StatusCode::NOT_FOUND, "ROOM_NOT_FOUND"),
            (
                ChatError::MemberNotFound("bob".to_string()),
                StatusCode::NOT_FOUND,
                "MEMBER_NOT_FOUND",
            ),
            (
                ChatError::Forbidden {
                    member_id: MemberId(3),
                    room_id: RoomId(1),
                },
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
            ),
            (
                ChatError::Validation("empty".to_string()),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                ChatError::Storage(RepositoryError::Connection),
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
            ),
        ];

        for (error, status, code) in cases {
            let (got_status, got_code, _) = AppError::from(error).parts();
            assert_eq!(got_status, status);
            assert_eq!(got_code, code);
        }
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let err = AppError::from(ChatError::Storage(RepositoryError::Query(
            "no such table: chat_rooms".to_string(),
        )));
        let (_, _, message) = err.parts();
        assert!(!message.contains("chat_rooms"));
    }

    #[test]
    fn unauthorized_maps_to_401() {
        let response = AppError::Unauthorized("who?".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
