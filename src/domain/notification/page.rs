//! Offset-based pagination for notification history.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

use super::Notification;

/// A validated page request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Creates a page request, rejecting zero values and limits above `max_limit`.
    pub fn new(page: u32, limit: u32, max_limit: u32) -> Result<Self, ValidationError> {
        if page == 0 {
            return Err(ValidationError::out_of_range("page", 1, i64::from(u32::MAX), 0));
        }
        if limit == 0 || limit > max_limit {
            return Err(ValidationError::out_of_range(
                "limit",
                1,
                i64::from(max_limit),
                i64::from(limit),
            ));
        }
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Rows to skip: `(page - 1) * limit`.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// One page of notifications, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
}

impl NotificationPage {
    pub fn new(notifications: Vec<Notification>, request: PageRequest, total: u64) -> Self {
        let has_more = request.offset() + (notifications.len() as u64) < total;
        Self {
            notifications,
            page: request.page(),
            limit: request.limit(),
            total,
            has_more,
        }
    }
}
