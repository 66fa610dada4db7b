//! Route definitions for the `/notifications` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::notification;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// GET    /                       -> list_notifications
/// POST   /                       -> create_notification
/// GET    /client/{client_id}     -> list_client_notifications
/// POST   /mark-read              -> mark_read
///
/// GET    /preferences            -> get_preferences
/// PUT    /preferences            -> upsert_preference
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(notification::list_notifications).post(notification::create_notification),
        )
        .route(
            "/client/{client_id}",
            get(notification::list_client_notifications),
        )
        .route("/mark-read", post(notification::mark_read))
        .route(
            "/preferences",
            get(notification::get_preferences).put(notification::upsert_preference),
        )
}
