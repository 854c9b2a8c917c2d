//! Notification domain.
//!
//! Notifications are addressed either to a single user or to a whole role
//! tier (`is_group`). Read and seen flags on a group notification are one
//! shared flag for the tier, not tracked per reader.

mod record;
mod page;

pub use record::{NewNotification, Notification, NotificationContent, Recipient, Sender};
pub use page::{NotificationPage, PageRequest};

use crate::domain::foundation::UserId;

/// Scope of seen tracking and unseen counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Individual notifications addressed to one user.
    User(UserId),
    /// Group notifications for the admin/team tier.
    AdminGroup,
}

impl Audience {
    /// Absent user id means the admin group.
    pub fn from_user(user_id: Option<UserId>) -> Self {
        match user_id {
            Some(id) => Audience::User(id),
            None => Audience::AdminGroup,
        }
    }
}
