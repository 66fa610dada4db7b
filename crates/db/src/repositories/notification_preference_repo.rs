//! Repository for the `notification_preferences` table.
//!
//! This is the single place where stored blanks are folded into wildcards:
//! every read goes through [`PREF_COLUMNS`], which projects `''` as `NULL`, and
//! every write binds an already-normalized [`PreferenceKey`].

use bloch_core::preference::PreferenceKey;
use bloch_core::types::DbId;
use sqlx::PgPool;

use crate::models::notification::NotificationPreference;

/// Column list for `notification_preferences` queries, blanks read as NULL.
const PREF_COLUMNS: &str = "id, \
    NULLIF(BTRIM(user_id), '') AS user_id, \
    client_id, \
    NULLIF(BTRIM(notification_type), '') AS notification_type, \
    enabled, created_at, updated_at";

/// Same expressions as the `uq_notification_preferences_key` index.
const KEY_CONFLICT_TARGET: &str = "(COALESCE(NULLIF(BTRIM(user_id), ''), '')), \
    (COALESCE(client_id, -1)), \
    (LOWER(COALESCE(NULLIF(BTRIM(notification_type), ''), '')))";

/// Provides read and upsert access to notification preferences.
pub struct NotificationPreferenceRepo;

impl NotificationPreferenceRepo {
    /// List preferences, optionally restricted to one client.
    ///
    /// User-specific rows are included; no filtering by user happens here.
    pub async fn list(
        pool: &PgPool,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, sqlx::Error> {
        match client_id {
            Some(client_id) => {
                let query = format!(
                    "SELECT {PREF_COLUMNS} FROM notification_preferences \
                     WHERE client_id = $1 ORDER BY id"
                );
                sqlx::query_as::<_, NotificationPreference>(&query)
                    .bind(client_id)
                    .fetch_all(pool)
                    .await
            }
            None => {
                let query =
                    format!("SELECT {PREF_COLUMNS} FROM notification_preferences ORDER BY id");
                sqlx::query_as::<_, NotificationPreference>(&query)
                    .fetch_all(pool)
                    .await
            }
        }
    }

    /// List the rows owned by one user, optionally restricted to one client.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: &str,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, sqlx::Error> {
        let query = format!(
            "SELECT {PREF_COLUMNS} FROM notification_preferences \
             WHERE NULLIF(BTRIM(user_id), '') = $1 \
               AND ($2::BIGINT IS NULL OR client_id = $2) \
             ORDER BY id"
        );
        sqlx::query_as::<_, NotificationPreference>(&query)
            .bind(user_id)
            .bind(client_id)
            .fetch_all(pool)
            .await
    }

    /// Every row that can influence a notification in `client_id`'s scope:
    /// the client's own rows (any user) and the global rows.
    ///
    /// With `client_id = None` only global rows are returned.
    pub async fn list_for_scope(
        pool: &PgPool,
        client_id: Option<DbId>,
    ) -> Result<Vec<NotificationPreference>, sqlx::Error> {
        let query = format!(
            "SELECT {PREF_COLUMNS} FROM notification_preferences \
             WHERE client_id IS NULL OR client_id = $1 \
             ORDER BY id"
        );
        sqlx::query_as::<_, NotificationPreference>(&query)
            .bind(client_id)
            .fetch_all(pool)
            .await
    }

    /// Rows relevant to one reader of a history page: the reader's own rows
    /// and wildcard-user rows, for the given clients and globally.
    pub async fn list_for_reader(
        pool: &PgPool,
        user_id: &str,
        client_ids: &[DbId],
    ) -> Result<Vec<NotificationPreference>, sqlx::Error> {
        let query = format!(
            "SELECT {PREF_COLUMNS} FROM notification_preferences \
             WHERE (NULLIF(BTRIM(user_id), '') IS NULL OR NULLIF(BTRIM(user_id), '') = $1) \
               AND (client_id IS NULL OR client_id = ANY($2)) \
             ORDER BY id"
        );
        sqlx::query_as::<_, NotificationPreference>(&query)
            .bind(user_id)
            .bind(client_ids)
            .fetch_all(pool)
            .await
    }

    /// Insert or update the row for `key`.
    ///
    /// An existing row (including a legacy row stored with `''`) keeps its id
    /// and `created_at`; only `enabled` and `updated_at` change. A new row gets
    /// `created_at = updated_at = NOW()`.
    pub async fn upsert(
        pool: &PgPool,
        key: &PreferenceKey,
        enabled: bool,
    ) -> Result<NotificationPreference, sqlx::Error> {
        let query = format!(
            "INSERT INTO notification_preferences \
                (user_id, client_id, notification_type, enabled) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ({KEY_CONFLICT_TARGET}) DO UPDATE SET \
                enabled = EXCLUDED.enabled, \
                updated_at = NOW() \
             RETURNING {PREF_COLUMNS}"
        );
        let pref = sqlx::query_as::<_, NotificationPreference>(&query)
            .bind(key.user_id())
            .bind(key.client_id())
            .bind(key.notification_type())
            .bind(enabled)
            .fetch_one(pool)
            .await?;

        tracing::debug!(
            preference_id = pref.id,
            user_id = ?pref.user_id,
            client_id = ?pref.client_id,
            notification_type = ?pref.notification_type,
            enabled = pref.enabled,
            "Upserted notification preference"
        );
        Ok(pref)
    }
}
