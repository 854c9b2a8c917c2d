//! In-memory notification store.
//!
//! Backs tests and single-node development (`database.url = "memory://"`).
//! Mirrors the query semantics of the Postgres store.

use std::collections::HashMap;
use std::cmp::Reverse;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, NotificationId, Role, Timestamp, UserId};
use crate::domain::notification::{
    Audience, NewNotification, Notification, NotificationPage, PageRequest,
};
use crate::ports::NotificationStore;

#[derive(Default)]
pub struct InMemoryNotificationStore {
    notifications: RwLock<HashMap<NotificationId, Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored notifications.
    pub async fn len(&self) -> usize {
        self.notifications.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.notifications.read().await.is_empty()
    }

    /// Fetch one notification by id.
    pub async fn get(&self, id: &NotificationId) -> Option<Notification> {
        self.notifications.read().await.get(id).cloned()
    }

    async fn page_where<F>(&self, request: PageRequest, filter: F) -> NotificationPage
    where
        F: Fn(&Notification) -> bool,
    {
        let notifications = self.notifications.read().await;
        let mut matching: Vec<&Notification> = notifications.values().filter(|n| filter(n)).collect();
        matching.sort_by_key(|n| Reverse((n.created_at, n.id)));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.limit() as usize)
            .cloned()
            .collect();

        NotificationPage::new(items, request, total)
    }
}

fn not_found(id: &NotificationId) -> DomainError {
    DomainError::new(
        ErrorCode::NotificationNotFound,
        format!("Notification {} not found", id),
    )
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification, DomainError> {
        let notification = Notification::create(new, NotificationId::new(), Timestamp::now());
        self.notifications
            .write()
            .await
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        role: Role,
        page: PageRequest,
    ) -> Result<NotificationPage, DomainError> {
        Ok(self
            .page_where(page, |n| n.is_listed_for(user_id, role))
            .await)
    }

    async fn list_for_admin(&self, page: PageRequest) -> Result<NotificationPage, DomainError> {
        Ok(self
            .page_where(page, |n| n.belongs_to(&Audience::AdminGroup))
            .await)
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<Notification, DomainError> {
        let mut notifications = self.notifications.write().await;
        let notification = notifications.get_mut(id).ok_or_else(|| not_found(id))?;
        notification.mark_read(Timestamp::now());
        Ok(notification.clone())
    }

    async fn mark_all_seen(&self, audience: &Audience) -> Result<u64, DomainError> {
        let now = Timestamp::now();
        let mut notifications = self.notifications.write().await;
        let updated = notifications
            .values_mut()
            .filter(|n| n.belongs_to(audience))
            .filter_map(|n| n.mark_seen(now).then_some(()))
            .count();
        Ok(updated as u64)
    }

    async fn count_unseen(&self, audience: &Audience) -> Result<u64, DomainError> {
        let notifications = self.notifications.read().await;
        let count = notifications
            .values()
            .filter(|n| n.belongs_to(audience) && !n.seen)
            .count();
        Ok(count as u64)
    }

    async fn delete(&self, id: &NotificationId) -> Result<(), DomainError> {
        self.notifications
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }
}
