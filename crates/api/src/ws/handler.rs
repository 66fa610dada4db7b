use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use bloch_core::notification::client_group;
use bloch_core::types::{DbId, UserId};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::ws::manager::WsManager;

/// Query parameters of the upgrade request.
///
/// Browsers cannot set headers on WebSocket requests, so the token travels
/// as `access_token`.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub access_token: Option<String>,
    /// Join `client_<id>` right away.
    pub client_id: Option<DbId>,
}

/// Inbound control messages.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    SubscribeClient { client_id: DbId },
    UnsubscribeClient { client_id: DbId },
}

/// HTTP handler that upgrades the connection to WebSocket.
///
/// A present but invalid token rejects the upgrade with 401; no token gives
/// an anonymous socket that can still join client groups.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
) -> AppResult<Response> {
    let user_id = match params.access_token.as_deref().filter(|t| !t.is_empty()) {
        Some(token) => Some(AuthUser::from_token(token, &state)?.user_id),
        None => None,
    };

    let ws_manager = Arc::clone(&state.ws_manager);
    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, ws_manager, user_id, params.client_id)
    }))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`, which records the user
///      in the connection registry when authenticated.
///   2. Spawns a sender task that forwards messages from the manager channel.
///   3. Processes inbound control messages on the current task.
///   4. Unregisters the connection on disconnect.
async fn handle_socket(
    socket: WebSocket,
    ws_manager: Arc<WsManager>,
    user_id: Option<UserId>,
    client_id: Option<DbId>,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id = ?user_id, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = ws_manager.add(conn_id.clone(), user_id.as_deref()).await;
    if let Some(client_id) = client_id {
        ws_manager.join_group(&conn_id, &client_group(client_id)).await;
        tracing::debug!(conn_id = %conn_id, client_id, "Joined client group");
    }

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => {
                handle_client_message(&ws_manager, &conn_id, text.as_str()).await;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: remove connection and abort sender task.
    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}

async fn handle_client_message(ws_manager: &WsManager, conn_id: &str, text: &str) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::SubscribeClient { client_id }) => {
            ws_manager.join_group(conn_id, &client_group(client_id)).await;
            tracing::debug!(conn_id = %conn_id, client_id, "Subscribed to client group");
        }
        Ok(ClientMessage::UnsubscribeClient { client_id }) => {
            ws_manager.leave_group(conn_id, &client_group(client_id)).await;
            tracing::debug!(conn_id = %conn_id, client_id, "Unsubscribed from client group");
        }
        Err(e) => {
            tracing::debug!(conn_id = %conn_id, error = %e, "Ignoring unrecognized WebSocket message");
        }
    }
}

#[cfg(test)]
mod tests {
    use bloch_events::ConnectionRegistry;

    use super::*;

    #[test]
    fn parses_subscription_messages() {
        let sub: ClientMessage =
            serde_json::from_str(r#"{"action":"subscribe_client","client_id":7}"#).unwrap();
        assert_eq!(sub, ClientMessage::SubscribeClient { client_id: 7 });

        let unsub: ClientMessage =
            serde_json::from_str(r#"{"action":"unsubscribe_client","client_id":7}"#).unwrap();
        assert_eq!(unsub, ClientMessage::UnsubscribeClient { client_id: 7 });
    }

    #[test]
    fn rejects_unknown_action() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"action":"dance"}"#).is_err());
    }

    #[tokio::test]
    async fn control_messages_update_group_membership() {
        let manager = WsManager::new(Arc::new(ConnectionRegistry::new()));
        let _rx = manager.add("c1".into(), None).await;

        handle_client_message(&manager, "c1", r#"{"action":"subscribe_client","client_id":7}"#).await;
        assert_eq!(manager.group_members("client_7").await, vec!["c1".to_string()]);

        handle_client_message(&manager, "c1", "not json").await;
        handle_client_message(&manager, "c1", r#"{"action":"unsubscribe_client","client_id":7}"#).await;
        assert!(manager.group_members("client_7").await.is_empty());
    }
}
