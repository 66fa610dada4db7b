//! Error type shared by the delivery pipeline and the query service.

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Failed to encode push payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Push transport error: {0}")]
    Transport(String),

    #[error("Notification queue is full")]
    QueueFull,

    #[error("Notification queue is closed")]
    QueueClosed,
}
