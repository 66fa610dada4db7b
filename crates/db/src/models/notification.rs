//! Notification entity models and DTOs.

use bloch_core::preference::{PreferenceKey, PreferenceRecord};
use bloch_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `notifications` table.
///
/// This is also the payload of every `ReceiveNotification` push.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: DbId,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub action: String,
    pub message: String,
    pub reference_id: Option<DbId>,
    pub client_id: Option<DbId>,
    pub metadata: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: Timestamp,
}

/// A row from the `notification_preferences` table.
///
/// Rows loaded through [`NotificationPreferenceRepo`](crate::repositories::NotificationPreferenceRepo)
/// already expose blank `user_id` / `notification_type` as `None`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub id: DbId,
    pub user_id: Option<String>,
    pub client_id: Option<DbId>,
    pub notification_type: Option<String>,
    pub enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PreferenceRecord for NotificationPreference {
    fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn client_id(&self) -> Option<DbId> {
        self.client_id
    }

    fn notification_type(&self) -> Option<&str> {
        self.notification_type.as_deref()
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Body of `PUT /notifications/preferences`.
///
/// The user component is never taken from the body; it comes from the
/// caller's token.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertPreference {
    pub client_id: Option<DbId>,
    pub notification_type: Option<String>,
    pub enabled: bool,
}

impl UpsertPreference {
    /// Build the normalized key for `user_id` (or the wildcard user).
    pub fn key_for(&self, user_id: Option<&str>) -> PreferenceKey {
        PreferenceKey::new(user_id, self.client_id, self.notification_type.as_deref())
    }
}

/// Body of `POST /notifications/mark-read`.
#[derive(Debug, Clone, Deserialize)]
pub struct MarkRead {
    #[serde(default)]
    pub ids: Vec<DbId>,
}
