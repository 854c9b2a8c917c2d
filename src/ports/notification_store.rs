//! Notification store port.
//!
//! The data-access contract the dispatcher depends on. Every operation is a
//! direct persistence call; implementations do not cache.
//!
//! # Audiences
//!
//! Seen tracking and unseen counts are split by [`Audience`]:
//! - `Audience::User(id)` covers individual notifications addressed to `id`
//! - `Audience::AdminGroup` covers group notifications for the admin/team tier

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, NotificationId, Role, UserId};
use crate::domain::notification::{
    Audience, NewNotification, Notification, NotificationPage, PageRequest,
};

/// Persistence port for notification records.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Store a new notification, assigning its id and timestamps.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` on persistence failure
    async fn create(&self, new: NewNotification) -> Result<Notification, DomainError>;

    /// A user's history: their individual notifications plus group
    /// notifications of their role tier, newest first.
    async fn list_for_user(
        &self,
        user_id: &UserId,
        role: Role,
        page: PageRequest,
    ) -> Result<NotificationPage, DomainError>;

    /// Group notifications for the admin/team tier, newest first.
    async fn list_for_admin(&self, page: PageRequest) -> Result<NotificationPage, DomainError>;

    /// Set `read` on one notification. Idempotent.
    ///
    /// # Errors
    ///
    /// - `NotificationNotFound` if no notification has this id
    /// - `DatabaseError` on persistence failure
    async fn mark_read(&self, id: &NotificationId) -> Result<Notification, DomainError>;

    /// Set `seen` on every unseen notification of the audience.
    ///
    /// Returns the number of notifications that changed.
    async fn mark_all_seen(&self, audience: &Audience) -> Result<u64, DomainError>;

    /// Count unseen notifications of the audience.
    async fn count_unseen(&self, audience: &Audience) -> Result<u64, DomainError>;

    /// Hard delete one notification.
    ///
    /// # Errors
    ///
    /// - `NotificationNotFound` if no notification has this id
    /// - `DatabaseError` on persistence failure
    async fn delete(&self, id: &NotificationId) -> Result<(), DomainError>;
}
