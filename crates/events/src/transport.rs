//! Push-transport seam between the emitter and the socket layer.

use async_trait::async_trait;
use bloch_core::notification::RECEIVE_NOTIFICATION_EVENT;
use bloch_db::models::notification::Notification;
use serde::Serialize;

use crate::error::NotificationError;

/// Real-time delivery primitives used by [`NotificationEmitter`](crate::NotificationEmitter).
///
/// Implementations send [`PushEnvelope::receive_notification`] frames. A send
/// to a target with no live connection is not an error.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send_to_connection(
        &self,
        connection_id: &str,
        notification: &Notification,
    ) -> Result<(), NotificationError>;

    /// Every live connection of one user.
    async fn send_to_user(
        &self,
        user_id: &str,
        notification: &Notification,
    ) -> Result<(), NotificationError>;

    async fn send_to_group(
        &self,
        group: &str,
        notification: &Notification,
    ) -> Result<(), NotificationError>;

    /// Every member of `group` whose connection id is not in `excluded`.
    async fn send_to_group_except(
        &self,
        group: &str,
        excluded: &[String],
        notification: &Notification,
    ) -> Result<(), NotificationError>;

    async fn send_to_all(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Wire frame pushed to clients: `{"event": "...", "data": {...}}`.
#[derive(Debug, Serialize)]
pub struct PushEnvelope<'a> {
    pub event: &'static str,
    pub data: &'a Notification,
}

impl<'a> PushEnvelope<'a> {
    pub fn receive_notification(notification: &'a Notification) -> Self {
        Self {
            event: RECEIVE_NOTIFICATION_EVENT,
            data: notification,
        }
    }

    pub fn to_json(&self) -> Result<String, NotificationError> {
        Ok(serde_json::to_string(self)?)
    }
}
