use std::sync::Arc;

use bloch_db::DbPool;
use bloch_events::{NotificationPublisher, NotificationQueryService, PgNotificationStore};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Server configuration (JWT secret, timeouts).
    pub config: Arc<ServerConfig>,
    /// WebSocket connections, group membership and the user registry.
    pub ws_manager: Arc<WsManager>,
    /// Producer side of the notification queue.
    pub publisher: NotificationPublisher,
    /// Read side: history and preferences.
    pub notifications: NotificationQueryService,
}

impl AppState {
    pub fn new(
        pool: DbPool,
        config: Arc<ServerConfig>,
        ws_manager: Arc<WsManager>,
        publisher: NotificationPublisher,
    ) -> Self {
        let notifications =
            NotificationQueryService::new(Arc::new(PgNotificationStore::new(pool.clone())));
        Self {
            pool,
            config,
            ws_manager,
            publisher,
            notifications,
        }
    }
}
