//! Notification creation and fan-out.
//!
//! [`NotificationEmitter::emit`] is the boundary of the delivery pipeline:
//! whatever happens inside (store outage, socket errors) is logged and turned
//! into an [`EmitOutcome`], never into an error for the business operation
//! that asked for the notification.

use std::sync::Arc;

use bloch_core::notification::NotificationDraft;
use bloch_core::preference::{resolve_client_wide, DeliveryScope};
use bloch_core::types::DbId;
use bloch_db::models::notification::Notification;
use futures::future::join_all;

use crate::error::NotificationError;
use crate::plan::{plan_delivery, DeliveryPlan};
use crate::registry::ConnectionRegistry;
use crate::store::NotificationStore;
use crate::transport::PushTransport;

/// Terminal state of one emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitOutcome {
    /// A wildcard-user preference disabled this client/type; nothing stored.
    Suppressed,
    /// Stored and handed to the transport. `failed_sends` counts sends that
    /// returned an error; the row is kept regardless.
    Emitted {
        notification_id: DbId,
        plan: DeliveryPlan,
        failed_sends: usize,
    },
    /// Preferences could not be read or the row could not be stored.
    Failed,
}

/// Stores notifications and pushes them according to preferences.
pub struct NotificationEmitter {
    store: Arc<dyn NotificationStore>,
    transport: Arc<dyn PushTransport>,
    registry: Arc<ConnectionRegistry>,
}

impl NotificationEmitter {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        transport: Arc<dyn PushTransport>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            store,
            transport,
            registry,
        }
    }

    /// Create and deliver one notification. Never fails.
    pub async fn emit(&self, draft: &NotificationDraft) -> EmitOutcome {
        match self.try_emit(draft).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    notification_type = %draft.notification_type,
                    client_id = ?draft.client_id,
                    "Failed to create notification"
                );
                EmitOutcome::Failed
            }
        }
    }

    async fn try_emit(&self, draft: &NotificationDraft) -> Result<EmitOutcome, NotificationError> {
        let preferences = self.store.preferences_for_scope(draft.client_id).await?;

        // Coarse check without a recipient: only wildcard-user rows count.
        let scope = DeliveryScope::new(draft.client_id, Some(&draft.notification_type));
        if let Some(resolution) = resolve_client_wide(&preferences, &scope) {
            if !resolution.enabled {
                tracing::info!(
                    notification_type = %draft.notification_type,
                    client_id = ?draft.client_id,
                    level = resolution.level.rank(),
                    "Notification suppressed by preference"
                );
                return Ok(EmitOutcome::Suppressed);
            }
        }

        let notification = self.store.insert(draft).await?;
        let plan = plan_delivery(&notification, &preferences, &self.registry);
        let failed_sends = self.deliver(&notification, &plan).await;

        tracing::debug!(
            notification_id = notification.id,
            client_id = ?notification.client_id,
            plan = plan.kind(),
            failed_sends,
            "Notification emitted"
        );

        Ok(EmitOutcome::Emitted {
            notification_id: notification.id,
            plan,
            failed_sends,
        })
    }

    /// Push according to `plan`; returns the number of failed sends.
    async fn deliver(&self, notification: &Notification, plan: &DeliveryPlan) -> usize {
        match plan {
            DeliveryPlan::Direct(users) => {
                let sends = users.iter().map(|user_id| async move {
                    let result = self.transport.send_to_user(user_id, notification).await;
                    if let Err(e) = &result {
                        tracing::debug!(
                            error = %e,
                            user_id = %user_id,
                            notification_id = notification.id,
                            "Failed to send notification to user"
                        );
                    }
                    result
                });
                join_all(sends).await.iter().filter(|r| r.is_err()).count()
            }
            DeliveryPlan::Group(group) => {
                let result = self.transport.send_to_group(group, notification).await;
                Self::count_failure(result, notification, plan)
            }
            DeliveryPlan::GroupExcept { group, excluded } => {
                let result = self
                    .transport
                    .send_to_group_except(group, excluded, notification)
                    .await;
                Self::count_failure(result, notification, plan)
            }
            DeliveryPlan::Everyone => {
                let result = self.transport.send_to_all(notification).await;
                Self::count_failure(result, notification, plan)
            }
        }
    }

    fn count_failure(
        result: Result<(), NotificationError>,
        notification: &Notification,
        plan: &DeliveryPlan,
    ) -> usize {
        match result {
            Ok(()) => 0,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    notification_id = notification.id,
                    plan = plan.kind(),
                    "Failed to broadcast notification"
                );
                1
            }
        }
    }
}
