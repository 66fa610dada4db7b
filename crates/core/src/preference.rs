//! Notification preference keys and the precedence resolver.
//!
//! A preference row says "for (user?, client?, event type?) delivery is on or
//! off", where every absent component is a wildcard. Resolution walks six
//! levels from most to least specific and stops at the first row found:
//!
//! | Level | user   | client | type   |
//! |-------|--------|--------|--------|
//! | 1     | caller | scope  | scope  |
//! | 2     | caller | scope  | *      |
//! | 3     | *      | scope  | scope  |
//! | 4     | *      | scope  | *      |
//! | 5     | *      | *      | scope  |
//! | 6     | *      | *      | *      |
//!
//! Levels 1 and 2 are skipped when no caller is known. Finding nothing means
//! "deliver".
//!
//! Blank strings are the wildcard. They are folded to `None` once, when a key
//! is built ([`PreferenceKey::new`]) or when a row is read from storage; the
//! resolver itself trusts the records it is given.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, UserId};

/// Fold a blank or whitespace-only value to the wildcard.
pub fn normalize_wildcard(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Event types compare case-insensitively (`"Brevet"` == `"brevet"`).
pub fn same_notification_type(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Uniqueness key of a preference row, already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PreferenceKey {
    user_id: Option<UserId>,
    client_id: Option<DbId>,
    notification_type: Option<String>,
}

impl PreferenceKey {
    pub fn new(
        user_id: Option<&str>,
        client_id: Option<DbId>,
        notification_type: Option<&str>,
    ) -> Self {
        Self {
            user_id: normalize_wildcard(user_id),
            client_id,
            notification_type: normalize_wildcard(notification_type),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn client_id(&self) -> Option<DbId> {
        self.client_id
    }

    pub fn notification_type(&self) -> Option<&str> {
        self.notification_type.as_deref()
    }

    /// `true` when the key targets one specific user.
    pub fn is_user_specific(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Read access to a stored preference row.
///
/// Implemented by the database model and by [`PreferenceRule`]; implementors
/// must already expose wildcards as `None`.
pub trait PreferenceRecord {
    fn user_id(&self) -> Option<&str>;
    fn client_id(&self) -> Option<DbId>;
    fn notification_type(&self) -> Option<&str>;
    fn enabled(&self) -> bool;
}

/// In-memory preference row, used where no database row exists yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferenceRule {
    pub key: PreferenceKey,
    pub enabled: bool,
}

impl PreferenceRule {
    pub fn new(key: PreferenceKey, enabled: bool) -> Self {
        Self { key, enabled }
    }
}

impl PreferenceRecord for PreferenceRule {
    fn user_id(&self) -> Option<&str> {
        self.key.user_id()
    }

    fn client_id(&self) -> Option<DbId> {
        self.key.client_id()
    }

    fn notification_type(&self) -> Option<&str> {
        self.key.notification_type()
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

/// What a notification is about, as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryScope {
    client_id: Option<DbId>,
    notification_type: Option<String>,
}

impl DeliveryScope {
    pub fn new(client_id: Option<DbId>, notification_type: Option<&str>) -> Self {
        Self {
            client_id,
            notification_type: normalize_wildcard(notification_type),
        }
    }

    pub fn client_id(&self) -> Option<DbId> {
        self.client_id
    }

    pub fn notification_type(&self) -> Option<&str> {
        self.notification_type.as_deref()
    }

    /// Type component of a row matches this scope's event type exactly.
    ///
    /// A scope without a type only matches wildcard-type rows, which makes
    /// the "type" levels collapse onto the "all types" levels.
    fn type_matches<R: PreferenceRecord>(&self, record: &R) -> bool {
        match (record.notification_type(), self.notification_type()) {
            (None, None) => true,
            (Some(row), Some(wanted)) => same_notification_type(row, wanted),
            _ => false,
        }
    }
}

/// One step of the precedence walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceLevel {
    UserClientType,
    UserClientAll,
    ClientType,
    ClientAll,
    GlobalType,
    GlobalAll,
}

impl PreferenceLevel {
    /// Full precedence order, most specific first.
    pub const ALL: [PreferenceLevel; 6] = [
        PreferenceLevel::UserClientType,
        PreferenceLevel::UserClientAll,
        PreferenceLevel::ClientType,
        PreferenceLevel::ClientAll,
        PreferenceLevel::GlobalType,
        PreferenceLevel::GlobalAll,
    ];

    /// Levels evaluated for a specific user only.
    pub const USER: [PreferenceLevel; 2] =
        [PreferenceLevel::UserClientType, PreferenceLevel::UserClientAll];

    /// Levels evaluated when no single recipient is being considered.
    pub const CLIENT_WIDE: [PreferenceLevel; 4] = [
        PreferenceLevel::ClientType,
        PreferenceLevel::ClientAll,
        PreferenceLevel::GlobalType,
        PreferenceLevel::GlobalAll,
    ];

    /// 1-based position in the precedence list.
    pub fn rank(self) -> u8 {
        match self {
            PreferenceLevel::UserClientType => 1,
            PreferenceLevel::UserClientAll => 2,
            PreferenceLevel::ClientType => 3,
            PreferenceLevel::ClientAll => 4,
            PreferenceLevel::GlobalType => 5,
            PreferenceLevel::GlobalAll => 6,
        }
    }

    pub fn requires_caller(self) -> bool {
        matches!(
            self,
            PreferenceLevel::UserClientType | PreferenceLevel::UserClientAll
        )
    }

    fn matches<R: PreferenceRecord>(
        self,
        record: &R,
        scope: &DeliveryScope,
        caller: Option<&str>,
    ) -> bool {
        let user_ok = match (self.requires_caller(), caller) {
            (true, Some(caller)) => record.user_id() == Some(caller),
            (true, None) => false,
            (false, _) => record.user_id().is_none(),
        };
        if !user_ok {
            return false;
        }

        let client_ok = match self {
            PreferenceLevel::GlobalType | PreferenceLevel::GlobalAll => {
                record.client_id().is_none()
            }
            _ => record.client_id() == scope.client_id(),
        };
        if !client_ok {
            return false;
        }

        match self {
            PreferenceLevel::UserClientType
            | PreferenceLevel::ClientType
            | PreferenceLevel::GlobalType => scope.type_matches(record),
            PreferenceLevel::UserClientAll
            | PreferenceLevel::ClientAll
            | PreferenceLevel::GlobalAll => record.notification_type().is_none(),
        }
    }
}

/// The row that decided a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub level: PreferenceLevel,
    pub enabled: bool,
}

/// Walk `levels` in order and return the first matching row's decision.
pub fn resolve_levels<R: PreferenceRecord>(
    records: &[R],
    scope: &DeliveryScope,
    caller: Option<&str>,
    levels: &[PreferenceLevel],
) -> Option<Resolution> {
    let caller = caller.map(str::trim).filter(|c| !c.is_empty());
    levels
        .iter()
        .filter(|level| caller.is_some() || !level.requires_caller())
        .find_map(|&level| {
            records
                .iter()
                .find(|record| level.matches(*record, scope, caller))
                .map(|record| Resolution {
                    level,
                    enabled: record.enabled(),
                })
        })
}

/// Full six-level resolution for an optional caller.
pub fn resolve<R: PreferenceRecord>(
    records: &[R],
    scope: &DeliveryScope,
    caller: Option<&str>,
) -> Option<Resolution> {
    resolve_levels(records, scope, caller, &PreferenceLevel::ALL)
}

/// Levels 3–6 only: the decision for "everyone" in the scope.
pub fn resolve_client_wide<R: PreferenceRecord>(
    records: &[R],
    scope: &DeliveryScope,
) -> Option<Resolution> {
    resolve_levels(records, scope, None, &PreferenceLevel::CLIENT_WIDE)
}

/// Levels 1–2 only: the explicit override of one user, if any.
pub fn resolve_user_override<R: PreferenceRecord>(
    records: &[R],
    scope: &DeliveryScope,
    user_id: &str,
) -> Option<Resolution> {
    resolve_levels(records, scope, Some(user_id), &PreferenceLevel::USER)
}

/// Default-allow: only an explicit `false` blocks delivery.
pub fn is_delivery_enabled<R: PreferenceRecord>(
    records: &[R],
    scope: &DeliveryScope,
    caller: Option<&str>,
) -> bool {
    resolve(records, scope, caller).map_or(true, |r| r.enabled)
}
