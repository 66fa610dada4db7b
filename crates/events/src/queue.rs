//! Hand-off between business operations and the delivery pipeline.
//!
//! [`NotificationPublisher::publish`] never awaits: it pushes a job onto a
//! bounded channel and returns. [`NotificationWorker`] drains the channel
//! and runs each emission on its own task, so a slow push never delays the
//! next notification and never holds up the request that produced it.

use std::sync::Arc;
use std::time::Duration;

use bloch_core::notification::NotificationDraft;
use bloch_core::types::UserId;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::emitter::{EmitOutcome, NotificationEmitter};
use crate::error::NotificationError;

/// Default buffer capacity for the notification queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// One queued notification.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub draft: NotificationDraft,
    /// User whose action triggered the notification, for log correlation.
    pub requested_by: Option<UserId>,
}

/// Producer half of the notification queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationPublisher {
    sender: mpsc::Sender<NotificationJob>,
}

impl NotificationPublisher {
    /// Create a publisher and the receiver to hand to [`NotificationWorker::run`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<NotificationJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue a draft without waiting.
    ///
    /// A full or closed queue drops the draft; the error is logged here and
    /// returned for callers that want to report it. Business operations can
    /// ignore it.
    pub fn publish(
        &self,
        draft: NotificationDraft,
        requested_by: Option<&str>,
    ) -> Result<(), NotificationError> {
        let job = NotificationJob {
            draft,
            requested_by: requested_by.map(str::to_string),
        };
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(
                    notification_type = %job.draft.notification_type,
                    client_id = ?job.draft.client_id,
                    "Notification queue full, dropping notification"
                );
                Err(NotificationError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(
                    notification_type = %job.draft.notification_type,
                    client_id = ?job.draft.client_id,
                    "Notification worker stopped, dropping notification"
                );
                Err(NotificationError::QueueClosed)
            }
        }
    }
}

/// Most emissions a worker runs at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Upper bound on one emission, store and pushes included.
pub const DEFAULT_EMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Background consumer of the notification queue.
///
/// At most `max_in_flight` emissions run concurrently; once that many are
/// pending the worker stops pulling from the channel, so the channel's
/// capacity bounds the backlog again. An emission that exceeds
/// `emit_timeout` is dropped and counted as failed.
pub struct NotificationWorker {
    emitter: Arc<NotificationEmitter>,
    max_in_flight: usize,
    emit_timeout: Duration,
}

impl NotificationWorker {
    pub fn new(emitter: Arc<NotificationEmitter>) -> Self {
        Self::with_limits(emitter, DEFAULT_MAX_IN_FLIGHT, DEFAULT_EMIT_TIMEOUT)
    }

    pub fn with_limits(
        emitter: Arc<NotificationEmitter>,
        max_in_flight: usize,
        emit_timeout: Duration,
    ) -> Self {
        Self {
            emitter,
            max_in_flight: max_in_flight.max(1),
            emit_timeout,
        }
    }

    /// Run until every [`NotificationPublisher`] is dropped, then wait for
    /// in-flight emissions to finish.
    pub async fn run(self, mut receiver: mpsc::Receiver<NotificationJob>) {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut in_flight = JoinSet::new();

        while let Some(job) = receiver.recv().await {
            // Never closed, so acquisition only waits for a free slot.
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };

            let emitter = Arc::clone(&self.emitter);
            let emit_timeout = self.emit_timeout;
            let span = tracing::info_span!(
                "notification",
                notification_type = %job.draft.notification_type,
                client_id = ?job.draft.client_id,
                requested_by = ?job.requested_by,
            );
            in_flight.spawn(
                async move {
                    let _permit = permit;
                    match tokio::time::timeout(emit_timeout, emitter.emit(&job.draft)).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            tracing::warn!(
                                timeout_ms = emit_timeout.as_millis() as u64,
                                "Notification emission timed out"
                            );
                            EmitOutcome::Failed
                        }
                    }
                }
                .instrument(span),
            );

            while let Some(result) = in_flight.try_join_next() {
                Self::log_join(result);
            }
        }

        tracing::info!(
            pending = in_flight.len(),
            "Notification queue closed, worker draining"
        );
        while let Some(result) = in_flight.join_next().await {
            Self::log_join(result);
        }
        tracing::info!("Notification worker shutting down");
    }

    fn log_join(result: Result<EmitOutcome, tokio::task::JoinError>) {
        if let Err(e) = result {
            tracing::error!(error = %e, "Notification task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn publish_fails_fast_when_queue_is_full() {
        let (publisher, _receiver) = NotificationPublisher::channel(1);

        assert!(publisher
            .publish(NotificationDraft::new("Brevet", "Created", "a"), None)
            .is_ok());
        assert_matches!(
            publisher.publish(NotificationDraft::new("Brevet", "Created", "b"), None),
            Err(NotificationError::QueueFull)
        );
    }

    #[test]
    fn publish_reports_closed_queue() {
        let (publisher, receiver) = NotificationPublisher::channel(4);
        drop(receiver);

        assert_matches!(
            publisher.publish(NotificationDraft::new("Brevet", "Created", "a"), Some("u1")),
            Err(NotificationError::QueueClosed)
        );
    }

    #[tokio::test]
    async fn queued_job_keeps_requester() {
        let (publisher, mut receiver) = NotificationPublisher::channel(4);
        publisher
            .publish(NotificationDraft::new("Brevet", "Created", "a").for_client(7), Some("u1"))
            .unwrap();

        let job = receiver.recv().await.unwrap();
        assert_eq!(job.requested_by.as_deref(), Some("u1"));
        assert_eq!(job.draft.client_id, Some(7));
    }
}
