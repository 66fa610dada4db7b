//! Storage seam for notifications and preferences.
//!
//! [`PgNotificationStore`] is the production implementation over the
//! `bloch-db` repositories. The emitter and the query service only see the
//! [`NotificationStore`] trait.

use async_trait::async_trait;
use bloch_core::notification::{NotificationDraft, PageRequest};
use bloch_core::preference::PreferenceKey;
use bloch_core::types::DbId;
use bloch_db::models::notification::{Notification, NotificationPreference};
use bloch_db::repositories::{NotificationPreferenceRepo, NotificationRepo};
use bloch_db::DbPool;

use crate::error::NotificationError;

/// Everything the delivery pipeline reads and writes.
///
/// Preference rows returned by any method expose blank components as `None`.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification, NotificationError>;

    /// A client's notifications plus global ones, newest first.
    async fn list_for_client(
        &self,
        client_id: DbId,
        page: PageRequest,
    ) -> Result<Vec<Notification>, NotificationError>;

    async fn list_all(&self, page: PageRequest) -> Result<Vec<Notification>, NotificationError>;

    /// Returns how many rows flipped to read.
    async fn mark_read(&self, ids: &[DbId]) -> Result<u64, NotificationError>;

    /// Rows of one client (or every row), any user.
    async fn preferences(
        &self,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError>;

    async fn preferences_for_user(
        &self,
        user_id: &str,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError>;

    /// Rows that can affect delivery of a notification scoped to `client_id`:
    /// that client's rows and the global rows.
    async fn preferences_for_scope(
        &self,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError>;

    /// Rows that can affect what `user_id` sees for the given clients.
    async fn preferences_for_reader(
        &self,
        user_id: &str,
        client_ids: &[DbId],
    ) -> Result<Vec<NotificationPreference>, NotificationError>;

    async fn upsert_preference(
        &self,
        key: &PreferenceKey,
        enabled: bool,
    ) -> Result<NotificationPreference, NotificationError>;
}

/// Postgres-backed store.
///
/// Owns its own pool handle, so work running on the notification worker is
/// independent of any request that triggered it.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: DbPool,
}

impl PgNotificationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification, NotificationError> {
        Ok(NotificationRepo::create(&self.pool, draft).await?)
    }

    async fn list_for_client(
        &self,
        client_id: DbId,
        page: PageRequest,
    ) -> Result<Vec<Notification>, NotificationError> {
        Ok(NotificationRepo::list_for_client(&self.pool, client_id, page).await?)
    }

    async fn list_all(&self, page: PageRequest) -> Result<Vec<Notification>, NotificationError> {
        Ok(NotificationRepo::list_all(&self.pool, page).await?)
    }

    async fn mark_read(&self, ids: &[DbId]) -> Result<u64, NotificationError> {
        Ok(NotificationRepo::mark_read(&self.pool, ids).await?)
    }

    async fn preferences(
        &self,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError> {
        Ok(NotificationPreferenceRepo::list(&self.pool, client_id).await?)
    }

    async fn preferences_for_user(
        &self,
        user_id: &str,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError> {
        Ok(NotificationPreferenceRepo::list_for_user(&self.pool, user_id, client_id).await?)
    }

    async fn preferences_for_scope(
        &self,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError> {
        Ok(NotificationPreferenceRepo::list_for_scope(&self.pool, client_id).await?)
    }

    async fn preferences_for_reader(
        &self,
        user_id: &str,
        client_ids: &[DbId],
    ) -> Result<Vec<NotificationPreference>, NotificationError> {
        Ok(NotificationPreferenceRepo::list_for_reader(&self.pool, user_id, client_ids).await?)
    }

    async fn upsert_preference(
        &self,
        key: &PreferenceKey,
        enabled: bool,
    ) -> Result<NotificationPreference, NotificationError> {
        Ok(NotificationPreferenceRepo::upsert(&self.pool, key, enabled).await?)
    }
}
