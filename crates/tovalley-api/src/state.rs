//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and the
//! HTTP/WebSocket API. `ChatService` is generic over its ports; AppState
//! pins it to the SQLite stores and the in-memory presence tracker.

use std::path::PathBuf;
use std::sync::Arc;

use tovalley_core::chat::{ChatService, ChatSettings};
use tovalley_core::event::ChatEventBus;
use tovalley_infra::presence::InMemoryPresenceTracker;
use tovalley_infra::sqlite::member::SqliteMemberDirectory;
use tovalley_infra::sqlite::message::SqliteChatMessageRepository;
use tovalley_infra::sqlite::notification::SqliteChatNotificationRepository;
use tovalley_infra::sqlite::pool::DatabasePool;
use tovalley_infra::sqlite::room::SqliteChatRoomRepository;

use crate::config::AppConfig;

/// Concrete type alias for the chat service pinned to infra implementations.
pub type ConcreteChatService = ChatService<
    SqliteChatRoomRepository,
    SqliteChatMessageRepository,
    SqliteChatNotificationRepository,
    InMemoryPresenceTracker,
    SqliteMemberDirectory,
>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chat_service: Arc<ConcreteChatService>,
    pub event_bus: Arc<ChatEventBus>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        // Ensure data directory exists
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let db_pool = DatabasePool::new(&config.database_url).await?;
        tracing::debug!(data_dir = %config.data_dir.display(), "application state initialized");

        Ok(Self::from_pool(
            db_pool,
            config.data_dir.clone(),
            config.chat.clone(),
            config.bus_capacity,
        ))
    }

    /// Wire services on top of an open pool.
    pub fn from_pool(
        db_pool: DatabasePool,
        data_dir: PathBuf,
        settings: ChatSettings,
        bus_capacity: usize,
    ) -> Self {
        let event_bus = Arc::new(ChatEventBus::new(bus_capacity));

        let chat_service = ChatService::new(
            SqliteChatRoomRepository::new(db_pool.clone()),
            SqliteChatMessageRepository::new(db_pool.clone()),
            SqliteChatNotificationRepository::new(db_pool.clone()),
            InMemoryPresenceTracker::new(),
            SqliteMemberDirectory::new(db_pool),
            event_bus.clone(),
            settings,
        );

        Self {
            chat_service: Arc::new(chat_service),
            event_bus,
            data_dir,
        }
    }
}
