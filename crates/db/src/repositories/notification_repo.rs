//! Repository for the `notifications` table.

use bloch_core::notification::{NotificationDraft, PageRequest};
use bloch_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification::Notification;

/// Column list for `notifications` queries.
const COLUMNS: &str = "id, notification_type, action, message, reference_id, client_id, \
    metadata, is_read, created_at";

/// Provides persistence for notifications.
pub struct NotificationRepo;

impl NotificationRepo {
    /// Insert a notification, returning the stored row.
    pub async fn create(
        pool: &PgPool,
        draft: &NotificationDraft,
    ) -> Result<Notification, sqlx::Error> {
        let query = format!(
            "INSERT INTO notifications \
                (notification_type, action, message, reference_id, client_id, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(&draft.notification_type)
            .bind(&draft.action)
            .bind(&draft.message)
            .bind(draft.reference_id)
            .bind(draft.client_id)
            .bind(&draft.metadata)
            .fetch_one(pool)
            .await
    }

    /// One page of a client's notifications plus global ones, newest first.
    pub async fn list_for_client(
        pool: &PgPool,
        client_id: DbId,
        page: PageRequest,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             WHERE client_id = $1 OR client_id IS NULL \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(client_id)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await
    }

    /// One page of every notification, newest first.
    pub async fn list_all(
        pool: &PgPool,
        page: PageRequest,
    ) -> Result<Vec<Notification>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM notifications \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, Notification>(&query)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(pool)
            .await
    }

    /// Mark a batch of notifications as read.
    ///
    /// Unknown ids are ignored. Returns the number of rows that changed.
    pub async fn mark_read(pool: &PgPool, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true \
             WHERE id = ANY($1) AND is_read = false",
        )
        .bind(ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
