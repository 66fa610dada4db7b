//! Notification descriptor, group naming, and paging rules.
//!
//! Collaborating services (patents, cabinets, contacts, ...) describe an event
//! with a [`NotificationDraft`] and hand it to the delivery pipeline. The
//! draft carries no id and no timestamps; those are assigned on insert.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::DbId;

/// Name of the single push event carrying a full notification record.
pub const RECEIVE_NOTIFICATION_EVENT: &str = "ReceiveNotification";

/// Prefix of the per-tenant broadcast group.
pub const CLIENT_GROUP_PREFIX: &str = "client_";

/// Well-known action verbs used by the CRUD services.
pub const ACTION_CREATED: &str = "Created";
pub const ACTION_UPDATED: &str = "Updated";
pub const ACTION_DELETED: &str = "Deleted";

/// Default page number for notification history.
pub const DEFAULT_PAGE: i64 = 1;
/// Default page size for notification history.
pub const DEFAULT_PAGE_SIZE: i64 = 50;
/// Upper bound on the page size a caller may request.
pub const MAX_PAGE_SIZE: i64 = 200;

/// Group name for all live connections of one tenant, e.g. `client_7`.
pub fn client_group(client_id: DbId) -> String {
    format!("{CLIENT_GROUP_PREFIX}{client_id}")
}

/// Plain descriptor submitted by a business operation.
///
/// `client_id = None` makes the notification global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NotificationDraft {
    /// Free-form event category, e.g. `"Brevet"`.
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 100))]
    pub notification_type: String,
    /// Verb such as `"Created"`.
    #[validate(length(min = 1, max = 50))]
    pub action: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    pub reference_id: Option<DbId>,
    pub client_id: Option<DbId>,
    pub metadata: Option<serde_json::Value>,
}

impl NotificationDraft {
    pub fn new(
        notification_type: impl Into<String>,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type: notification_type.into(),
            action: action.into(),
            message: message.into(),
            reference_id: None,
            client_id: None,
            metadata: None,
        }
    }

    /// Scope the notification to one tenant.
    pub fn for_client(mut self, client_id: DbId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Attach the id of the affected domain entity.
    pub fn with_reference(mut self, reference_id: DbId) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check field lengths before the draft is queued.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()?;
        Ok(())
    }
}

/// Validated page coordinates (`page >= 1`, `0 < page_size <= MAX_PAGE_SIZE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: i64,
    page_size: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Result<Self, CoreError> {
        if page < 1 {
            return Err(CoreError::Validation(format!(
                "page must be >= 1, got {page}"
            )));
        }
        if page_size < 1 {
            return Err(CoreError::Validation(format!(
                "page_size must be > 0, got {page_size}"
            )));
        }
        let page_size = page_size.min(MAX_PAGE_SIZE);
        if (page - 1).checked_mul(page_size).is_none() {
            return Err(CoreError::Validation(format!(
                "page {page} is out of range"
            )));
        }
        Ok(Self { page, page_size })
    }

    /// Build from optional query parameters, falling back to the defaults.
    pub fn from_params(page: Option<i64>, page_size: Option<i64>) -> Result<Self, CoreError> {
        Self::new(
            page.unwrap_or(DEFAULT_PAGE),
            page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_group_uses_prefix() {
        assert_eq!(client_group(7), "client_7");
    }

    #[test]
    fn draft_builder_sets_optional_fields() {
        let draft = NotificationDraft::new("Brevet", ACTION_CREATED, "Brevet FR-001 créé")
            .for_client(7)
            .with_reference(42)
            .with_metadata(serde_json::json!({ "family": "FAM-9" }));

        assert_eq!(draft.client_id, Some(7));
        assert_eq!(draft.reference_id, Some(42));
        assert_eq!(draft.metadata.as_ref().unwrap()["family"], "FAM-9");
        assert!(draft.check().is_ok());
    }

    #[test]
    fn draft_serializes_type_field_name() {
        let draft = NotificationDraft::new("Brevet", ACTION_DELETED, "gone");
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["type"], "Brevet");
        assert!(json.get("notification_type").is_none());
    }

    #[test]
    fn draft_with_empty_message_fails_validation() {
        let draft = NotificationDraft::new("Brevet", ACTION_UPDATED, "");
        assert!(matches!(draft.check(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn page_request_offsets() {
        let page = PageRequest::new(3, 20).unwrap();
        assert_eq!(page.offset(), 40);
        assert_eq!(page.limit(), 20);
    }

    #[test]
    fn page_request_rejects_zero_page_and_size() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
    }

    #[test]
    fn page_request_rejects_offset_overflow() {
        assert!(matches!(
            PageRequest::from_params(Some(i64::MAX), Some(50)),
            Err(CoreError::Validation(_))
        ));
        let last = i64::MAX / MAX_PAGE_SIZE + 1;
        let page = PageRequest::new(last, MAX_PAGE_SIZE).unwrap();
        assert_eq!(page.offset(), (last - 1) * MAX_PAGE_SIZE);
    }

    #[test]
    fn page_request_clamps_size_and_defaults() {
        assert_eq!(PageRequest::new(1, 10_000).unwrap().limit(), MAX_PAGE_SIZE);
        let defaults = PageRequest::from_params(None, None).unwrap();
        assert_eq!(defaults, PageRequest::default());
        assert_eq!(defaults.offset(), 0);
    }
}
