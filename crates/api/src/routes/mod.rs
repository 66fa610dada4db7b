pub mod health;
pub mod notification;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                  WebSocket (optional ?access_token, ?client_id)
///
/// /notifications                       list (GET), queue (POST)
/// /notifications/client/{client_id}    list for one client
/// /notifications/mark-read             mark read (POST)
/// /notifications/preferences           caller's rows (GET), upsert (PUT)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_handler))
        // Notifications
        .nest("/notifications", notification::router())
}
