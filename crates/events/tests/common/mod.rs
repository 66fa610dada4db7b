//! In-memory test doubles for the store and push-transport seams.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bloch_core::notification::{NotificationDraft, PageRequest};
use bloch_core::preference::{same_notification_type, PreferenceKey};
use bloch_core::types::DbId;
use bloch_db::models::notification::{Notification, NotificationPreference};
use bloch_events::{NotificationError, NotificationStore, PushTransport};
use chrono::{Duration, TimeZone, Utc};

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

/// Vec-backed store. Row `n` is created `n` seconds after a fixed epoch so
/// newest-first ordering is deterministic.
#[derive(Default)]
pub struct InMemoryStore {
    notifications: Mutex<Vec<Notification>>,
    preferences: Mutex<Vec<NotificationPreference>>,
    next_id: AtomicI64,
    fail_inserts: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self) {
        self.fail_inserts.store(true, Ordering::SeqCst);
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn preference_rows(&self) -> Vec<NotificationPreference> {
        self.preferences.lock().unwrap().clone()
    }

    /// Seed a preference row.
    pub fn prefer(&self, user: Option<&str>, client: Option<DbId>, kind: Option<&str>, enabled: bool) {
        self.upsert(&PreferenceKey::new(user, client, kind), enabled);
    }

    fn next_id(&self) -> DbId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn upsert(&self, key: &PreferenceKey, enabled: bool) -> NotificationPreference {
        let mut rows = self.preferences.lock().unwrap();
        let now = Utc::now();
        let existing = rows.iter_mut().find(|row| {
            row.user_id.as_deref() == key.user_id()
                && row.client_id == key.client_id()
                && match (row.notification_type.as_deref(), key.notification_type()) {
                    (None, None) => true,
                    (Some(a), Some(b)) => same_notification_type(a, b),
                    _ => false,
                }
        });
        if let Some(row) = existing {
            row.enabled = enabled;
            row.updated_at = now;
            return row.clone();
        }
        let row = NotificationPreference {
            id: self.next_id(),
            user_id: key.user_id().map(str::to_string),
            client_id: key.client_id(),
            notification_type: key.notification_type().map(str::to_string),
            enabled,
            created_at: now,
            updated_at: now,
        };
        rows.push(row.clone());
        row
    }

    fn page(mut rows: Vec<Notification>, page: PageRequest) -> Vec<Notification> {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect()
    }

    fn select_preferences(
        &self,
        keep: impl Fn(&NotificationPreference) -> bool,
    ) -> Vec<NotificationPreference> {
        self.preferences
            .lock()
            .unwrap()
            .iter()
            .filter(|row| keep(row))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification, NotificationError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(NotificationError::Store(sqlx::Error::PoolTimedOut));
        }
        let id = self.next_id();
        let epoch = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let notification = Notification {
            id,
            notification_type: draft.notification_type.clone(),
            action: draft.action.clone(),
            message: draft.message.clone(),
            reference_id: draft.reference_id,
            client_id: draft.client_id,
            metadata: draft.metadata.clone(),
            is_read: false,
            created_at: epoch + Duration::seconds(id),
        };
        self.notifications.lock().unwrap().push(notification.clone());
        Ok(notification)
    }

    async fn list_for_client(
        &self,
        client_id: DbId,
        page: PageRequest,
    ) -> Result<Vec<Notification>, NotificationError> {
        let rows = self
            .notifications()
            .into_iter()
            .filter(|n| n.client_id.is_none() || n.client_id == Some(client_id))
            .collect();
        Ok(Self::page(rows, page))
    }

    async fn list_all(&self, page: PageRequest) -> Result<Vec<Notification>, NotificationError> {
        Ok(Self::page(self.notifications(), page))
    }

    async fn mark_read(&self, ids: &[DbId]) -> Result<u64, NotificationError> {
        let mut changed = 0;
        for n in self.notifications.lock().unwrap().iter_mut() {
            if ids.contains(&n.id) && !n.is_read {
                n.is_read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn preferences(
        &self,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError> {
        Ok(self.select_preferences(|p| client_id.is_none() || p.client_id == client_id))
    }

    async fn preferences_for_user(
        &self,
        user_id: &str,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError> {
        Ok(self.select_preferences(|p| {
            p.user_id.as_deref() == Some(user_id)
                && (client_id.is_none() || p.client_id == client_id)
        }))
    }

    async fn preferences_for_scope(
        &self,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, NotificationError> {
        Ok(self.select_preferences(|p| p.client_id.is_none() || p.client_id == client_id))
    }

    async fn preferences_for_reader(
        &self,
        user_id: &str,
        client_ids: &[DbId],
    ) -> Result<Vec<NotificationPreference>, NotificationError> {
        Ok(self.select_preferences(|p| {
            (p.user_id.is_none() || p.user_id.as_deref() == Some(user_id))
                && p.client_id.map_or(true, |c| client_ids.contains(&c))
        }))
    }

    async fn upsert_preference(
        &self,
        key: &PreferenceKey,
        enabled: bool,
    ) -> Result<NotificationPreference, NotificationError> {
        Ok(self.upsert(key, enabled))
    }
}

// ---------------------------------------------------------------------------
// RecordingTransport
// ---------------------------------------------------------------------------

/// One successful push, with the notification id it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Connection(String, DbId),
    User(String, DbId),
    Group(String, DbId),
    GroupExcept(String, Vec<String>, DbId),
    All(DbId),
}

/// Records every send; sends to `failing_users` return an error instead.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    failing_users: HashSet<String>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(users: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing_users: users.iter().map(|u| u.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, sent: Sent) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    async fn send_to_connection(
        &self,
        connection_id: &str,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        self.record(Sent::Connection(connection_id.to_string(), notification.id))
    }

    async fn send_to_user(
        &self,
        user_id: &str,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        if self.failing_users.contains(user_id) {
            return Err(NotificationError::Transport(format!(
                "connection reset for {user_id}"
            )));
        }
        self.record(Sent::User(user_id.to_string(), notification.id))
    }

    async fn send_to_group(
        &self,
        group: &str,
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        self.record(Sent::Group(group.to_string(), notification.id))
    }

    async fn send_to_group_except(
        &self,
        group: &str,
        excluded: &[String],
        notification: &Notification,
    ) -> Result<(), NotificationError> {
        self.record(Sent::GroupExcept(
            group.to_string(),
            excluded.to_vec(),
            notification.id,
        ))
    }

    async fn send_to_all(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.record(Sent::All(notification.id))
    }
}

// ---------------------------------------------------------------------------
// StalledTransport
// ---------------------------------------------------------------------------

/// Every send hangs forever. Tracks how many sends are pending at once and
/// the highest that number reached.
#[derive(Default)]
pub struct StalledTransport {
    pending: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl StalledTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn stall(&self) -> Result<(), NotificationError> {
        let now = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = PendingGuard(Arc::clone(&self.pending));
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Decrements the pending count when a stalled send is dropped.
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PushTransport for StalledTransport {
    async fn send_to_connection(&self, _: &str, _: &Notification) -> Result<(), NotificationError> {
        self.stall().await
    }

    async fn send_to_user(&self, _: &str, _: &Notification) -> Result<(), NotificationError> {
        self.stall().await
    }

    async fn send_to_group(&self, _: &str, _: &Notification) -> Result<(), NotificationError> {
        self.stall().await
    }

    async fn send_to_group_except(
        &self,
        _: &str,
        _: &[String],
        _: &Notification,
    ) -> Result<(), NotificationError> {
        self.stall().await
    }

    async fn send_to_all(&self, _: &Notification) -> Result<(), NotificationError> {
        self.stall().await
    }
}
