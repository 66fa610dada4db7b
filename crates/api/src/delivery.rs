//! Wiring of the notification pipeline onto the WebSocket transport.

use std::sync::Arc;
use std::time::Duration;

use bloch_db::DbPool;
use bloch_events::{
    NotificationEmitter, NotificationPublisher, NotificationWorker, PgNotificationStore,
};
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Spawn the notification worker and return the publisher feeding it.
///
/// The worker owns its own store handle, so it keeps running after the
/// request that queued a notification has completed. It stops once every
/// clone of the returned publisher is dropped and in-flight emissions finish.
/// Recipient exclusions read the registry owned by `ws_manager`.
pub fn start_notification_pipeline(
    pool: DbPool,
    ws_manager: Arc<WsManager>,
    config: &ServerConfig,
) -> (NotificationPublisher, JoinHandle<()>) {
    let registry = Arc::clone(ws_manager.registry());
    let emitter = NotificationEmitter::new(
        Arc::new(PgNotificationStore::new(pool)),
        ws_manager,
        registry,
    );
    let (publisher, receiver) = NotificationPublisher::channel(config.notification_queue_capacity);
    let worker = NotificationWorker::with_limits(
        Arc::new(emitter),
        config.notification_max_in_flight,
        Duration::from_secs(config.notification_emit_timeout_secs),
    );
    let handle = tokio::spawn(worker.run(receiver));
    tracing::info!(
        capacity = config.notification_queue_capacity,
        max_in_flight = config.notification_max_in_flight,
        emit_timeout_secs = config.notification_emit_timeout_secs,
        "Notification worker started"
    );
    (publisher, handle)
}
