//! Notification history and preference management.

use std::collections::BTreeSet;
use std::sync::Arc;

use bloch_core::notification::PageRequest;
use bloch_core::preference::{is_delivery_enabled, DeliveryScope, PreferenceKey};
use bloch_core::types::DbId;
use bloch_db::models::notification::{Notification, NotificationPreference};

use crate::error::NotificationError;
use crate::store::NotificationStore;

/// Read side of notifications, filtered per reader.
///
/// A reader only sees rows that a live push would have delivered to them:
/// each row of a page is resolved against the reader's preferences and rows
/// resolving to disabled are dropped. Pages can therefore be shorter than
/// the requested size.
#[derive(Clone)]
pub struct NotificationQueryService {
    store: Arc<dyn NotificationStore>,
}

impl NotificationQueryService {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// One page of a client's notifications and global ones, newest first.
    pub async fn list_for_client(
        &self,
        client_id: DbId,
        page: PageRequest,
        caller: Option<&str>,
    ) -> Result<Vec<Notification>, NotificationError> {
        let rows = self.store.list_for_client(client_id, page).await?;
        self.filter_for_reader(rows, caller).await
    }

    /// One page of every notification, newest first.
    pub async fn list_all(
        &self,
        page: PageRequest,
        caller: Option<&str>,
    ) -> Result<Vec<Notification>, NotificationError> {
        let rows = self.store.list_all(page).await?;
        self.filter_for_reader(rows, caller).await
    }

    pub async fn mark_read(&self, ids: &[DbId]) -> Result<u64, NotificationError> {
        let changed = self.store.mark_read(ids).await?;
        tracing::debug!(requested = ids.len(), changed, "Marked notifications as read");
        Ok(changed)
    }

    /// Stored preferences, optionally for one client, any user.
    pub async fn preferences(
        &self,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError> {
        self.store.preferences(client_id).await
    }

    pub async fn preferences_for_user(
        &self,
        user_id: &str,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError> {
        self.store.preferences_for_user(user_id, client_id).await
    }

    pub async fn upsert_preference(
        &self,
        key: &PreferenceKey,
        enabled: bool,
    ) -> Result<NotificationPreference, NotificationError> {
        self.store.upsert_preference(key, enabled).await
    }

    async fn filter_for_reader(
        &self,
        rows: Vec<Notification>,
        caller: Option<&str>,
    ) -> Result<Vec<Notification>, NotificationError> {
        let Some(caller) = caller.map(str::trim).filter(|c| !c.is_empty()) else {
            return Ok(rows);
        };
        if rows.is_empty() {
            return Ok(rows);
        }

        let client_ids: Vec<DbId> = rows
            .iter()
            .filter_map(|n| n.client_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let preferences = self.store.preferences_for_reader(caller, &client_ids).await?;

        let before = rows.len();
        let visible: Vec<Notification> = rows
            .into_iter()
            .filter(|n| {
                let scope = DeliveryScope::new(n.client_id, Some(&n.notification_type));
                // Global notifications are never excluded per user when
                // pushed, so user rows do not apply to them here either.
                let reader = n.client_id.map(|_| caller);
                is_delivery_enabled(&preferences, &scope, reader)
            })
            .collect();

        if visible.len() < before {
            tracing::debug!(
                user_id = %caller,
                hidden = before - visible.len(),
                "Filtered notifications by reader preferences"
            );
        }
        Ok(visible)
    }
}
