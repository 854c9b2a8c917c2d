//! Inbound and outbound notification events.
//!
//! Event names are a wire contract with the browser clients and must match
//! byte for byte. Inbound events are decoded from `(name, data)` pairs into
//! [`ClientEvent`], each variant carrying its own typed payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::foundation::{DomainError, ErrorCode, NotificationId, Timestamp, UserId};
use super::notification::{Notification, NotificationContent, NotificationPage};

/// Inbound event names.
pub mod inbound {
    pub const STUDENT_TO_ADMIN: &str = "NOTIFICATION_STUDENT_TO_ADMIN";
    pub const AGENT_TO_ADMIN: &str = "NOTIFICATION_AGENT_TO_ADMIN";
    pub const ADMIN_TO_STUDENT: &str = "NOTIFICATION_ADMIN_TO_STUDENT";
    pub const ADMIN_TO_AGENT: &str = "NOTIFICATION_ADMIN_TO_AGENT";
    pub const GET_FOR_ADMIN: &str = "GET_NOTIFICATIONS_FOR_ADMIN";
    pub const GET_FOR_USER: &str = "GET_NOTIFICATIONS_FOR_USER";
    pub const GET_UNREAD_COUNT: &str = "GET_UNREAD_COUNT";
    pub const SEEN_BY_ADMIN: &str = "NOTIFICATION_SEEN_BY_ADMIN";
    pub const SEEN_BY_USER: &str = "NOTIFICATION_SEEN_BY_USER";
    pub const IS_READ: &str = "NOTIFICATION_IS_READ";
    pub const DELETE: &str = "DELETE_NOTIFICATION";
    pub const DELETE_AUTH_TOKEN: &str = "DELETE_AUTH_TOKEN";
}

/// Value of `GET_UNREAD_COUNT` selecting the user scope.
pub const USER_SCOPE_MARKER: &str = "emitForUser";

/// Message sent along with a delete confirmation.
pub const DELETED_MESSAGE: &str = "deleted successfully";

// ============================================
// Client → Server
// ============================================

/// Payload of a notification raised by a student or agent.
///
/// `recieverId` may be present but is ignored: these always go to the
/// admin group.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPayload {
    #[serde(default)]
    pub title: Option<String>,
    pub message: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub path_data: Option<Map<String, Value>>,
}

impl AlertPayload {
    pub fn into_content(self) -> NotificationContent {
        NotificationContent::new(self.title, self.message, self.path, self.path_data)
    }
}

/// Payload of a notification from the admin desk to one user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DirectPayload {
    /// Spelled as the clients send it.
    #[serde(rename = "recieverId")]
    pub receiver_id: UserId,
    #[serde(flatten)]
    pub content: AlertPayload,
}

/// Page selection for history fetches. Missing values take configured defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct PagePayload {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Which unseen counter to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnseenScope {
    /// The requester's individual notifications.
    User,
    /// The admin group notifications.
    Admin,
}

impl UnseenScope {
    /// `"emitForUser"` selects the user scope; anything else the admin scope.
    pub fn from_value(value: &Value) -> Self {
        match value.as_str() {
            Some(USER_SCOPE_MARKER) => UnseenScope::User,
            _ => UnseenScope::Admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarkReadPayload {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, rename = "byAdmin")]
    pub by_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForceLogoutPayload {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(default)]
    pub reason: String,
}

/// Every event a client may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    StudentToAdmin(AlertPayload),
    AgentToAdmin(AlertPayload),
    AdminToStudent(DirectPayload),
    AdminToAgent(DirectPayload),
    FetchAdminNotifications(PagePayload),
    FetchUserNotifications(PagePayload),
    FetchUnseenCount(UnseenScope),
    MarkAllSeenByAdmin,
    MarkAllSeenByUser,
    MarkRead(MarkReadPayload),
    DeleteNotification(String),
    ForceLogout(ForceLogoutPayload),
}

/// Failure to turn a raw `(name, data)` pair into a [`ClientEvent`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unknown event '{0}'")]
    UnknownEvent(String),

    #[error("Invalid payload for {event}: {reason}")]
    InvalidPayload { event: String, reason: String },
}

impl From<ProtocolError> for DomainError {
    fn from(err: ProtocolError) -> Self {
        let code = match &err {
            ProtocolError::MalformedFrame(_) => ErrorCode::MalformedFrame,
            ProtocolError::UnknownEvent(_) => ErrorCode::UnknownEvent,
            ProtocolError::InvalidPayload { .. } => ErrorCode::ValidationFailed,
        };
        DomainError::new(code, err.to_string())
    }
}

impl ClientEvent {
    /// Decodes an inbound event by name.
    pub fn decode(name: &str, data: Value) -> Result<Self, ProtocolError> {
        use inbound::*;

        let event = match name {
            STUDENT_TO_ADMIN => ClientEvent::StudentToAdmin(payload(name, data)?),
            AGENT_TO_ADMIN => ClientEvent::AgentToAdmin(payload(name, data)?),
            ADMIN_TO_STUDENT => ClientEvent::AdminToStudent(payload(name, data)?),
            ADMIN_TO_AGENT => ClientEvent::AdminToAgent(payload(name, data)?),
            GET_FOR_ADMIN => ClientEvent::FetchAdminNotifications(payload(name, data)?),
            GET_FOR_USER => ClientEvent::FetchUserNotifications(payload(name, data)?),
            GET_UNREAD_COUNT => ClientEvent::FetchUnseenCount(UnseenScope::from_value(&data)),
            SEEN_BY_ADMIN => ClientEvent::MarkAllSeenByAdmin,
            SEEN_BY_USER => ClientEvent::MarkAllSeenByUser,
            IS_READ => ClientEvent::MarkRead(payload(name, data)?),
            DELETE => match data {
                Value::String(id) => ClientEvent::DeleteNotification(id),
                _ => {
                    return Err(ProtocolError::InvalidPayload {
                        event: name.to_string(),
                        reason: "expected the notification id as a string".to_string(),
                    })
                }
            },
            DELETE_AUTH_TOKEN => ClientEvent::ForceLogout(payload(name, data)?),
            other => return Err(ProtocolError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        use inbound::*;

        match self {
            ClientEvent::StudentToAdmin(_) => STUDENT_TO_ADMIN,
            ClientEvent::AgentToAdmin(_) => AGENT_TO_ADMIN,
            ClientEvent::AdminToStudent(_) => ADMIN_TO_STUDENT,
            ClientEvent::AdminToAgent(_) => ADMIN_TO_AGENT,
            ClientEvent::FetchAdminNotifications(_) => GET_FOR_ADMIN,
            ClientEvent::FetchUserNotifications(_) => GET_FOR_USER,
            ClientEvent::FetchUnseenCount(_) => GET_UNREAD_COUNT,
            ClientEvent::MarkAllSeenByAdmin => SEEN_BY_ADMIN,
            ClientEvent::MarkAllSeenByUser => SEEN_BY_USER,
            ClientEvent::MarkRead(_) => IS_READ,
            ClientEvent::DeleteNotification(_) => DELETE,
            ClientEvent::ForceLogout(_) => DELETE_AUTH_TOKEN,
        }
    }

    /// Whether the event acts on the admin desk's behalf.
    pub fn is_admin_scoped(&self) -> bool {
        match self {
            ClientEvent::AdminToStudent(_)
            | ClientEvent::AdminToAgent(_)
            | ClientEvent::FetchAdminNotifications(_)
            | ClientEvent::MarkAllSeenByAdmin
            | ClientEvent::ForceLogout(_) => true,
            ClientEvent::FetchUnseenCount(scope) => *scope == UnseenScope::Admin,
            ClientEvent::MarkRead(payload) => payload.by_admin,
            ClientEvent::StudentToAdmin(_)
            | ClientEvent::AgentToAdmin(_)
            | ClientEvent::FetchUserNotifications(_)
            | ClientEvent::MarkAllSeenByUser
            | ClientEvent::DeleteNotification(_) => false,
        }
    }
}

/// Struct payloads treat a missing `data` as an empty object.
fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, ProtocolError> {
    let data = if data.is_null() {
        Value::Object(Map::new())
    } else {
        data
    };
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

// ============================================
// Server → Client
// ============================================

/// Outcome recorded in a diagnostic envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticStatus {
    Success,
    Error,
}

/// Mirror of a handled event, sent only to the connection that sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEnvelope {
    pub event_name: String,
    pub payload: Value,
    pub status: DiagnosticStatus,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DiagnosticEnvelope {
    pub fn success(event_name: impl Into<String>, payload: Value) -> Self {
        Self {
            event_name: event_name.into(),
            payload,
            status: DiagnosticStatus::Success,
            timestamp: Timestamp::now().to_iso_string(),
            code: None,
            reason: None,
        }
    }

    pub fn error(event_name: impl Into<String>, payload: Value, error: &DomainError) -> Self {
        Self {
            event_name: event_name.into(),
            payload,
            status: DiagnosticStatus::Error,
            timestamp: Timestamp::now().to_iso_string(),
            code: Some(error.code.to_string()),
            reason: Some(error.message.clone()),
        }
    }
}

/// Confirmation echoed to the deleting connection after a hard delete.
///
/// Other connections only receive [`DELETED_MESSAGE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteConfirmation {
    #[serde(rename = "_id")]
    pub id: NotificationId,
    pub message: String,
}

impl DeleteConfirmation {
    pub fn new(id: NotificationId) -> Self {
        Self {
            id,
            message: DELETED_MESSAGE.to_string(),
        }
    }
}

/// Every event the server emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "GLOBAL_NOTIFICATION_ADMIN_ALERT")]
    AdminAlert(Notification),

    #[serde(rename = "GLOBAL_NOTIFICATION_STUDENT_ALERT")]
    StudentAlert(Notification),

    #[serde(rename = "GLOBAL_NOTIFICATION_AGENT_ALERT")]
    AgentAlert(Notification),

    #[serde(rename = "GET_NOTIFICATIONS_FOR_ADMIN")]
    AdminNotifications(NotificationPage),

    #[serde(rename = "GET_NOTIFICATIONS_FOR_USER")]
    UserNotifications(NotificationPage),

    #[serde(rename = "GET_UNREAD_COUNT")]
    UnreadCount(u64),

    #[serde(rename = "NOTIFICATION_SEEN_STATUS_UPDATE")]
    SeenStatusUpdate,

    #[serde(rename = "NOTIFICATION_READ_STATUS_UPDATE")]
    ReadStatusUpdate(NotificationId),

    #[serde(rename = "DELETE_NOTIFICATION")]
    NotificationDeleted(String),

    #[serde(rename = "DELETE_AUTH_TOKEN")]
    AuthTokenRevoked(String),

    #[serde(rename = "onMessage")]
    Diagnostic(DiagnosticEnvelope),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::AdminAlert(_) => "GLOBAL_NOTIFICATION_ADMIN_ALERT",
            ServerEvent::StudentAlert(_) => "GLOBAL_NOTIFICATION_STUDENT_ALERT",
            ServerEvent::AgentAlert(_) => "GLOBAL_NOTIFICATION_AGENT_ALERT",
            ServerEvent::AdminNotifications(_) => "GET_NOTIFICATIONS_FOR_ADMIN",
            ServerEvent::UserNotifications(_) => "GET_NOTIFICATIONS_FOR_USER",
            ServerEvent::UnreadCount(_) => "GET_UNREAD_COUNT",
            ServerEvent::SeenStatusUpdate => "NOTIFICATION_SEEN_STATUS_UPDATE",
            ServerEvent::ReadStatusUpdate(_) => "NOTIFICATION_READ_STATUS_UPDATE",
            ServerEvent::NotificationDeleted(_) => "DELETE_NOTIFICATION",
            ServerEvent::AuthTokenRevoked(_) => "DELETE_AUTH_TOKEN",
            ServerEvent::Diagnostic(_) => "onMessage",
        }
    }
}
