use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ws::manager::WsManager;

/// Ping every socket once per `period` until aborted.
///
/// Ticks with no open sockets send nothing. Each ping round logs the socket
/// count next to the registry's user and connection counts; the two
/// connection counts differ by the anonymous sockets.
pub fn start_heartbeat(ws_manager: Arc<WsManager>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let sockets = ws_manager.connection_count().await;
            if sockets == 0 {
                continue;
            }
            let registry = ws_manager.registry();
            tracing::debug!(
                sockets,
                users = registry.user_count(),
                authenticated = registry.connection_count(),
                "WebSocket heartbeat ping"
            );
            ws_manager.ping_all().await;
        }
    })
}
