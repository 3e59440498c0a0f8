//! Notification inbox trait definition.

use tovalley_types::chat::{ChatNotification, NewChatNotification};
use tovalley_types::error::RepositoryError;
use tovalley_types::member::MemberId;
use tovalley_types::page::{PageRequest, Slice};

/// Repository trait for append-only chat notification records.
pub trait ChatNotificationRepository: Send + Sync {
    /// Persist a notification record and return it with its assigned ID.
    fn save(
        &self,
        notification: &NewChatNotification,
    ) -> impl std::future::Future<Output = Result<ChatNotification, RepositoryError>> + Send;

    /// A member's notifications, newest first.
    fn list_for_recipient(
        &self,
        recipient_id: MemberId,
        page: PageRequest,
    ) -> impl std::future::Future<Output = Result<Slice<ChatNotification>, RepositoryError>> + Send;
}
