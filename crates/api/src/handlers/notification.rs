//! Handlers for the `/notifications` resource.
//!
//! Reads accept anonymous callers; when a valid token is present the caller's
//! own preferences filter what they see. Queuing a notification requires
//! authentication.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use bloch_core::notification::{NotificationDraft, PageRequest};
use bloch_core::types::DbId;
use bloch_db::models::notification::{MarkRead, UpsertPreference};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthUser, MaybeAuthUser};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Query parameters for `GET /notifications`.
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    /// Restrict to one client (plus global notifications).
    pub client_id: Option<DbId>,
    /// 1-based page number. Defaults to 1.
    pub page: Option<i64>,
    /// Defaults to 50, capped at 200.
    pub page_size: Option<i64>,
}

/// Query parameters for `GET /notifications/client/{client_id}`.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PreferenceQuery {
    pub client_id: Option<DbId>,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// GET /api/v1/notifications
///
/// One page of notifications, newest first. With `client_id` the page holds
/// that client's notifications and global ones; without it, everything.
pub async fn list_notifications(
    caller: MaybeAuthUser,
    State(state): State<AppState>,
    Query(params): Query<NotificationQuery>,
) -> AppResult<impl IntoResponse> {
    let page = PageRequest::from_params(params.page, params.page_size)?;

    let notifications = match params.client_id {
        Some(client_id) => {
            state
                .notifications
                .list_for_client(client_id, page, caller.user_id())
                .await?
        }
        None => {
            state
                .notifications
                .list_all(page, caller.user_id())
                .await?
        }
    };

    Ok(Json(DataResponse {
        data: notifications,
    }))
}

/// GET /api/v1/notifications/client/{client_id}
pub async fn list_client_notifications(
    caller: MaybeAuthUser,
    State(state): State<AppState>,
    Path(client_id): Path<DbId>,
    Query(params): Query<PageQuery>,
) -> AppResult<impl IntoResponse> {
    let page = PageRequest::from_params(params.page, params.page_size)?;
    let notifications = state
        .notifications
        .list_for_client(client_id, page, caller.user_id())
        .await?;

    Ok(Json(DataResponse {
        data: notifications,
    }))
}

/// POST /api/v1/notifications/mark-read
///
/// Ids that do not exist are ignored. Returns how many rows changed.
pub async fn mark_read(
    State(state): State<AppState>,
    Json(input): Json<MarkRead>,
) -> AppResult<impl IntoResponse> {
    if input.ids.is_empty() {
        return Err(AppError::BadRequest(
            "ids must contain at least one notification id".into(),
        ));
    }

    let count = state.notifications.mark_read(&input.ids).await?;

    Ok(Json(DataResponse {
        data: serde_json::json!({ "marked_read": count }),
    }))
}

/// POST /api/v1/notifications
///
/// Queue a notification for delivery. Returns 202 once the draft is on the
/// queue; persistence and pushes happen in the background.
pub async fn create_notification(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(draft): Json<NotificationDraft>,
) -> AppResult<impl IntoResponse> {
    draft.check()?;

    tracing::debug!(
        user_id = %auth.user_id,
        notification_type = %draft.notification_type,
        client_id = ?draft.client_id,
        "Queuing notification"
    );
    state.publisher.publish(draft, Some(auth.user_id.as_str()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: serde_json::json!({ "queued": true }),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Preferences
// ---------------------------------------------------------------------------

/// GET /api/v1/notifications/preferences
///
/// The caller's own preference rows. Anonymous callers get an empty list.
pub async fn get_preferences(
    caller: MaybeAuthUser,
    State(state): State<AppState>,
    Query(params): Query<PreferenceQuery>,
) -> AppResult<impl IntoResponse> {
    let preferences = match caller.user_id() {
        Some(user_id) => {
            state
                .notifications
                .preferences_for_user(user_id, params.client_id)
                .await?
        }
        None => Vec::new(),
    };

    Ok(Json(DataResponse { data: preferences }))
}

/// PUT /api/v1/notifications/preferences
///
/// Create or update one preference row. The user component is the caller;
/// anonymous callers write the wildcard-user row.
pub async fn upsert_preference(
    caller: MaybeAuthUser,
    State(state): State<AppState>,
    Json(input): Json<UpsertPreference>,
) -> AppResult<impl IntoResponse> {
    let key = input.key_for(caller.user_id());
    let preference = state
        .notifications
        .upsert_preference(&key, input.enabled)
        .await?;

    tracing::info!(
        preference_id = preference.id,
        user_id = ?preference.user_id,
        client_id = ?preference.client_id,
        notification_type = ?preference.notification_type,
        enabled = preference.enabled,
        "Notification preference saved"
    );

    Ok(Json(DataResponse { data: preference }))
}
