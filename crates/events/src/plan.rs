//! Who receives a stored notification.
//!
//! Planning is pure: it looks at the preference rows of the notification's
//! scope and at the registry, and never performs I/O.

use std::collections::BTreeSet;

use bloch_core::notification::client_group;
use bloch_core::preference::{resolve_user_override, DeliveryScope, PreferenceRecord};
use bloch_core::types::UserId;
use bloch_db::models::notification::Notification;

use crate::registry::ConnectionRegistry;

/// Fan-out strategy for one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryPlan {
    /// Explicit opt-in users only, one send per user.
    Direct(Vec<UserId>),
    /// Every member of the client's group.
    Group(String),
    /// The client's group minus the live connections of opted-out users.
    GroupExcept { group: String, excluded: Vec<String> },
    /// Every connected session; used for global notifications.
    Everyone,
}

impl DeliveryPlan {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryPlan::Direct(_) => "direct",
            DeliveryPlan::Group(_) => "group",
            DeliveryPlan::GroupExcept { .. } => "group_except",
            DeliveryPlan::Everyone => "everyone",
        }
    }
}

/// Decide how `notification` fans out.
///
/// `records` must contain at least the rows of the notification's client.
/// Each user with rows for the client is resolved on the user levels, so a
/// type-specific row always beats the same user's all-types row. Users who
/// resolve to enabled turn the broadcast into direct sends. Otherwise the
/// client group is used, and users who resolve to disabled are excluded by
/// connection. Users without any row of their own still receive group
/// broadcasts.
pub fn plan_delivery<R: PreferenceRecord>(
    notification: &Notification,
    records: &[R],
    registry: &ConnectionRegistry,
) -> DeliveryPlan {
    let Some(client_id) = notification.client_id else {
        return DeliveryPlan::Everyone;
    };

    let scope = DeliveryScope::new(Some(client_id), Some(&notification.notification_type));
    let candidates: BTreeSet<&str> = records
        .iter()
        .filter(|r| r.client_id() == Some(client_id))
        .filter_map(|r| r.user_id())
        .collect();

    let mut opted_in: Vec<UserId> = Vec::new();
    let mut opted_out: Vec<&str> = Vec::new();
    for user in candidates {
        match resolve_user_override(records, &scope, user) {
            Some(resolution) if resolution.enabled => opted_in.push(user.to_string()),
            Some(_) => opted_out.push(user),
            None => {}
        }
    }

    if !opted_in.is_empty() {
        return DeliveryPlan::Direct(opted_in);
    }

    let group = client_group(client_id);
    let mut excluded: Vec<String> = opted_out
        .iter()
        .flat_map(|user| registry.connections_for_user(user))
        .collect();

    if excluded.is_empty() {
        return DeliveryPlan::Group(group);
    }

    excluded.sort();
    DeliveryPlan::GroupExcept { group, excluded }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
