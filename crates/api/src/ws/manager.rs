use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::Message;
use bloch_db::models::notification::Notification;
use bloch_events::{ConnectionRegistry, NotificationError, PushEnvelope, PushTransport};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Per-socket state held by the manager.
pub struct WsConnection {
    /// Broadcast groups this connection belongs to (e.g. `client_7`).
    pub groups: HashSet<String>,
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
}

/// Owns the outbound channel and group memberships of every live socket.
///
/// Which user a socket belongs to lives only in the shared
/// [`ConnectionRegistry`]; `add` and `remove` keep the two in step. Wrap in
/// `Arc` and share across the application. Also the production
/// [`PushTransport`].
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
    registry: Arc<ConnectionRegistry>,
}

impl WsManager {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            registry,
        }
    }

    /// The user index this manager writes to.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Register a new connection, and record its user when authenticated.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(
        &self,
        conn_id: String,
        user_id: Option<&str>,
    ) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(user_id) = user_id {
            self.registry.add(user_id, &conn_id);
        }
        let conn = WsConnection {
            groups: HashSet::new(),
            sender: tx,
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID, from both the socket map and the
    /// registry.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
        if let Some(user_id) = self.registry.user_for_connection(conn_id) {
            self.registry.remove_connection(conn_id);
            tracing::debug!(conn_id = %conn_id, user_id = %user_id, "Unregistered user connection");
        }
    }

    /// Add a connection to a group. Returns `false` for unknown connections.
    pub async fn join_group(&self, conn_id: &str, group: &str) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.groups.insert(group.to_string());
                true
            }
            None => false,
        }
    }

    pub async fn leave_group(&self, conn_id: &str, group: &str) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => conn.groups.remove(group),
            None => false,
        }
    }

    /// Connection ids currently in `group`.
    pub async fn group_members(&self, group: &str) -> Vec<String> {
        self.connections
            .read()
            .await
            .iter()
            .filter(|(_, conn)| conn.groups.contains(group))
            .map(|(id, _)| id.clone())
            .collect()
    }

/// Broadcast a message to all connected clients.
    ///
    /// Connections whose send channels are closed are silently skipped
    /// (they will be cleaned up on their next receive loop iteration).
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(message.clone());
        }
    }

    /// Send a message to one connection. Returns `false` when the connection
    /// is unknown or its channel is closed.
    pub async fn push_to_connection(&self, conn_id: &str, message: Message) -> bool {
        self.connections
            .read()
            .await
            .get(conn_id)
            .is_some_and(|conn| conn.sender.send(message).is_ok())
    }

    /// Send a message to every connection the registry lists for `user_id`.
    ///
    /// Returns `(matched, delivered)` connection counts. A registry entry
    /// whose socket is already gone counts as matched but not delivered.
    pub async fn push_to_user(&self, user_id: &str, message: Message) -> (usize, usize) {
        let targets = self.registry.connections_for_user(user_id);
        let conns = self.connections.read().await;
        let delivered = targets
            .iter()
            .filter(|id| {
                conns
                    .get(id.as_str())
                    .is_some_and(|conn| conn.sender.send(message.clone()).is_ok())
            })
            .count();
        (targets.len(), delivered)
    }

    /// Send a message to every member of `group` not listed in `excluded`.
    ///
    /// Returns the number of connections the message was sent to.
    pub async fn push_to_group(&self, group: &str, excluded: &[String], message: Message) -> usize {
        let conns = self.connections.read().await;
        let mut count = 0;
        for (id, conn) in conns.iter() {
            if conn.groups.contains(group) && !excluded.contains(id) {
                let _ = conn.sender.send(message.clone());
                count += 1;
            }
        }
        count
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server stops.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for (id, conn) in conns.drain() {
            let _ = conn.sender.send(Message::Close(None));
            self.registry.remove_connection(&id);
        }
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    ///
    /// Used by the heartbeat task to keep connections alive and detect
    /// stale ones.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

fn notification_frame(notification: &Notification) -> Result<Message, NotificationError> {
    let json = PushEnvelope::receive_notification(notification).to_json()?;
    Ok(Message::Text(json.into()))
}

#[async_trait]
impl PushTransport for WsManager {
    async fn send_to_connection(
        &self,
        connection_id: &str,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        let frame = notification_frame(notification)?;
        if !self.push_to_connection(connection_id, frame).await {
            tracing::debug!(conn_id = %connection_id, "Notification target connection is gone");
        }
        Ok(())
    }

    async fn send_to_user(
        &self,
        user_id: &str,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        let frame = notification_frame(notification)?;
        let (matched, delivered) = self.push_to_user(user_id, frame).await;
        if matched > 0 && delivered == 0 {
            return Err(NotificationError::Transport(format!(
                "all {matched} connections of user {user_id} are closed"
            )));
        }
        Ok(())
    }

    async fn send_to_group(
        &self,
        group: &str,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        let frame = notification_frame(notification)?;
        let count = self.push_to_group(group, &[], frame).await;
        tracing::debug!(group, count, "Pushed notification to group");
        Ok(())
    }

    async fn send_to_group_except(
        &self,
        group: &str,
        excluded: &[String],
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        let frame = notification_frame(notification)?;
        let count = self.push_to_group(group, excluded, frame).await;
        tracing::debug!(
            group,
            count,
            excluded = excluded.len(),
            "Pushed notification to group with exclusions"
        );
        Ok(())
    }

    async fn send_to_all(&self, notification: &Notification) -> Result<(), NotificationError> {
        let frame = notification_frame(notification)?;
        self.broadcast(frame).await;
        Ok(())
    }
}
