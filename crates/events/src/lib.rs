//! Bloch notification delivery.
//!
//! This crate turns a [`NotificationDraft`](bloch_core::notification::NotificationDraft)
//! handed over by a business operation into a stored notification and zero
//! or more real-time pushes:
//!
//! - [`NotificationPublisher`] / [`NotificationWorker`]: bounded hand-off
//!   queue that detaches delivery from the triggering request.
//! - [`NotificationEmitter`]: coarse preference check, persistence and
//!   fan-out according to a [`DeliveryPlan`].
//! - [`ConnectionRegistry`]: live `user -> connections` index used to
//!   exclude opted-out users from group broadcasts.
//! - [`NotificationQueryService`]: paginated history filtered per reader.
//! - [`PushTransport`] and [`NotificationStore`]: the seams to the socket
//!   layer and to Postgres.

pub mod emitter;
pub mod error;
pub mod plan;
pub mod query;
pub mod queue;
pub mod registry;
pub mod store;
pub mod transport;

pub use emitter::{EmitOutcome, NotificationEmitter};
pub use error::NotificationError;
pub use plan::DeliveryPlan;
pub use query::NotificationQueryService;
pub use queue::{NotificationJob, NotificationPublisher, NotificationWorker};
pub use registry::ConnectionRegistry;
pub use store::{NotificationStore, PgNotificationStore};
pub use transport::{PushEnvelope, PushTransport};
