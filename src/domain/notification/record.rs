//! Notification record and the inputs used to create one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::{NotificationId, Role, Timestamp, UserId, ValidationError};

use super::Audience;

/// Originator of a notification.
///
/// `user_id` is absent for admin-originated and system notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub role: Role,
}

/// Addressee of a notification.
///
/// With `is_group` set the notification targets every identity of the role
/// tier and carries no user id; otherwise exactly one user is addressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub role: Role,
    pub is_group: bool,
}

impl Recipient {
    /// Every identity of a role tier.
    pub fn group(role: Role) -> Self {
        Self {
            user_id: None,
            role,
            is_group: true,
        }
    }

    /// Exactly one user.
    pub fn individual(user_id: UserId, role: Role) -> Self {
        Self {
            user_id: Some(user_id),
            role,
            is_group: false,
        }
    }

    pub fn is_admin_group(&self) -> bool {
        self.is_group && self.role == Role::Admin
    }
}

/// Client-supplied content of a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationContent {
    pub title: String,
    pub message: String,
    pub route_path: String,
    pub path_data: Map<String, Value>,
}

impl NotificationContent {
    /// Builds content, trimming the title. The message must be present but
    /// may be empty.
    pub fn new(
        title: Option<String>,
        message: String,
        route_path: Option<String>,
        path_data: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            title: title.map(|t| t.trim().to_string()).unwrap_or_default(),
            message,
            route_path: route_path.unwrap_or_default(),
            path_data: path_data.unwrap_or_default(),
        }
    }
}

/// Fields required to store a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub content: NotificationContent,
    pub sender: Sender,
    pub recipient: Recipient,
}

impl NewNotification {
    /// A student or agent raising an alert for the admin/team group.
    pub fn to_admin_group(
        sender_id: UserId,
        sender_role: Role,
        content: NotificationContent,
    ) -> Result<Self, ValidationError> {
        if sender_role.is_privileged() {
            return Err(ValidationError::invalid_format(
                "sender.role",
                "admin group alerts originate from students or agents",
            ));
        }
        Ok(Self {
            content,
            sender: Sender {
                user_id: Some(sender_id),
                role: sender_role,
            },
            recipient: Recipient::group(Role::Admin),
        })
    }

    /// The admin desk addressing one student or agent.
    pub fn from_admin_desk(
        recipient_id: UserId,
        recipient_role: Role,
        content: NotificationContent,
    ) -> Result<Self, ValidationError> {
        if recipient_role.is_privileged() {
            return Err(ValidationError::invalid_format(
                "recipient.role",
                "admin desk notifications target students or agents",
            ));
        }
        Ok(Self {
            content,
            sender: Sender {
                user_id: None,
                role: Role::Admin,
            },
            recipient: Recipient::individual(recipient_id, recipient_role),
        })
    }
}

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: NotificationId,
    pub title: String,
    pub message: String,
    pub sender: Sender,
    pub recipient: Recipient,
    pub route_path: String,
    pub path_data: Map<String, Value>,
    pub read: bool,
    pub seen: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Notification {
    /// Materializes a new notification with generated id and timestamps.
    pub fn create(new: NewNotification, id: NotificationId, now: Timestamp) -> Self {
        let NewNotification {
            content,
            sender,
            recipient,
        } = new;
        Self {
            id,
            title: content.title,
            message: content.message,
            sender,
            recipient,
            route_path: content.route_path,
            path_data: content.path_data,
            read: false,
            seen: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the read flag. Returns false if it was already set.
    pub fn mark_read(&mut self, now: Timestamp) -> bool {
        self.updated_at = now;
        if self.read {
            return false;
        }
        self.read = true;
        true
    }

    /// Sets the seen flag. Returns false if it was already set.
    pub fn mark_seen(&mut self, now: Timestamp) -> bool {
        if self.seen {
            return false;
        }
        self.seen = true;
        self.updated_at = now;
        true
    }

    /// Whether this notification falls in the audience used for seen
    /// tracking and unseen counts.
    pub fn belongs_to(&self, audience: &Audience) -> bool {
        match audience {
            Audience::AdminGroup => self.recipient.is_admin_group(),
            Audience::User(user_id) => {
                !self.recipient.is_group && self.recipient.user_id.as_ref() == Some(user_id)
            }
        }
    }

    /// Whether a user's history listing includes this notification: their
    /// individual notifications plus group notifications of their tier.
    pub fn is_listed_for(&self, user_id: &UserId, role: Role) -> bool {
        if self.recipient.is_group {
            self.recipient.role == role.group_tier()
        } else {
            self.recipient.user_id.as_ref() == Some(user_id)
        }
    }
}
