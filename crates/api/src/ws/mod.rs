//! WebSocket infrastructure for real-time notification pushes.
//!
//! Provides connection and group management, heartbeat monitoring, and the
//! HTTP upgrade handler used by Axum routes.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::{ws_handler, ClientMessage};
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
