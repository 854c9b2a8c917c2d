//! Channel routing for notification fan-out.
//!
//! Every connection joins its private `USER_<id>` channel. Admin and team
//! member connections also join the shared `GLOBAL_ADMIN_ALERT` channel.
//! A process-wide room reaches every live connection regardless of channels.
//!
//! ```text
//! Channel: USER_S1        Channel: GLOBAL_ADMIN_ALERT     Everyone
//! ├── conn-a (tab 1)      ├── conn-c (admin)               ├── conn-a
//! └── conn-b (tab 2)      └── conn-d (team member)         ├── conn-b
//!                                                          ├── conn-c
//!                                                          └── conn-d
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;

use crate::domain::channel::{ChannelName, Emission, EmissionTarget};
use crate::domain::events::ServerEvent;
use crate::domain::foundation::{ConnectionId, Identity};
use crate::ports::ChannelEmitter;

/// Default buffer size of each channel's broadcast queue.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

type Outbound = Arc<ServerEvent>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("connection {0} already joined its channels")]
    AlreadyJoined(ConnectionId),
}

/// Receives everything emitted to the channels a connection joined.
pub struct Subscription {
    connection_id: ConnectionId,
    private: broadcast::Receiver<Outbound>,
    admin: Option<broadcast::Receiver<Outbound>>,
    everyone: broadcast::Receiver<Outbound>,
}

impl Subscription {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Waits for the next event on any joined channel.
    ///
    /// Events missed because this receiver fell behind are skipped. Returns
    /// `None` once a channel has been closed.
    pub async fn recv(&mut self) -> Option<Outbound> {
        loop {
            let result = tokio::select! {
                r = self.private.recv() => r,
                r = recv_optional(&mut self.admin) => r,
                r = self.everyone.recv() => r,
            };

            match result {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        connection_id = %self.connection_id,
                        skipped,
                        "Subscriber lagged, events dropped"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

async fn recv_optional(
    rx: &mut Option<broadcast::Receiver<Outbound>>,
) -> Result<Outbound, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Manages channel membership of live connections.
///
/// Uses `RwLock` for the channel registry since emissions (reads) vastly
/// outnumber joins/leaves (writes).
pub struct ChannelRouter {
    /// Map of channel → broadcast sender for that channel.
    channels: RwLock<HashMap<ChannelName, broadcast::Sender<Outbound>>>,

    /// Map of connection → joined channels for cleanup on disconnect.
    memberships: RwLock<HashMap<ConnectionId, Vec<ChannelName>>>,

    /// Reaches every live connection.
    everyone: broadcast::Sender<Outbound>,

    channel_capacity: usize,
}

impl ChannelRouter {
    pub fn new(channel_capacity: usize) -> Self {
        let (everyone, _) = broadcast::channel(channel_capacity);
        Self {
            channels: RwLock::new(HashMap::new()),
            memberships: RwLock::new(HashMap::new()),
            everyone,
            channel_capacity,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Channels an identity is entitled to: its private channel, plus the
    /// shared admin channel for admins and team members.
    pub fn channels_for(identity: &Identity) -> Vec<ChannelName> {
        let mut channels = vec![ChannelName::user(&identity.id)];
        if identity.is_privileged() {
            channels.push(ChannelName::AdminAlert);
        }
        channels
    }

    /// Joins a connection to its channels. Each connection joins once.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        identity: &Identity,
    ) -> Result<Subscription, RouterError> {
        let mut memberships = self.memberships.write().await;
        if memberships.contains_key(&connection_id) {
            return Err(RouterError::AlreadyJoined(connection_id));
        }

        let names = Self::channels_for(identity);
        let mut channels = self.channels.write().await;
        let mut subscribe = |name: &ChannelName| {
            channels
                .entry(name.clone())
                .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
                .subscribe()
        };

        let private = subscribe(&ChannelName::user(&identity.id));
        let admin = identity
            .is_privileged()
            .then(|| subscribe(&ChannelName::AdminAlert));
        drop(channels);

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %identity.id,
            channels = ?names.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Connection joined channels"
        );
        memberships.insert(connection_id, names);

        Ok(Subscription {
            connection_id,
            private,
            admin,
            everyone: self.everyone.subscribe(),
        })
    }

    /// Forgets a connection. Channels left without receivers are removed.
    ///
    /// The connection's [`Subscription`] must be dropped first for its
    /// channels to be reclaimed.
    pub async fn leave(&self, connection_id: &ConnectionId) {
        let Some(names) = self.memberships.write().await.remove(connection_id) else {
            return;
        };

        let mut channels = self.channels.write().await;
        for name in names {
            if channels
                .get(&name)
                .is_some_and(|sender| sender.receiver_count() == 0)
            {
                channels.remove(&name);
            }
        }
        tracing::debug!(connection_id = %connection_id, "Connection left channels");
    }

    /// Delivers an emission to local subscribers.
    ///
    /// Returns how many receivers it reached. Emitting to a channel nobody
    /// joined is a no-op.
    pub async fn emit(&self, emission: Emission) -> usize {
        let Emission { target, event } = emission;
        let event = Arc::new(event);

        let reached = match &target {
            EmissionTarget::Everyone => self.everyone.send(event).unwrap_or(0),
            EmissionTarget::Channel(name) => {
                let channels = self.channels.read().await;
                channels
                    .get(name)
                    .map(|sender| sender.send(event).unwrap_or(0))
                    .unwrap_or(0)
            }
        };

        tracing::trace!(emission_target = %target, reached, "Emitted");
        reached
    }

    /// Channels a connection joined, empty if it is not connected.
    pub async fn channels_of(&self, connection_id: &ConnectionId) -> Vec<ChannelName> {
        self.memberships
            .read()
            .await
            .get(connection_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of connections currently joined to a channel.
    pub async fn connection_count(&self, channel: &ChannelName) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// All channels with at least one member (for monitoring/debugging).
    pub async fn active_channels(&self) -> Vec<ChannelName> {
        self.channels.read().await.keys().cloned().collect()
    }

    pub async fn total_connections(&self) -> usize {
        self.memberships.read().await.len()
    }
}

#[async_trait]
impl ChannelEmitter for ChannelRouter {
    async fn emit(&self, emission: Emission) -> usize {
        ChannelRouter::emit(self, emission).await
    }
}

impl Default for ChannelRouter {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Role, UserId};
    use std::time::Duration;

    fn identity(id: &str, role: Role) -> Identity {
        Identity::new(UserId::new(id).unwrap(), role)
    }

    async fn expect_nothing(sub: &mut Subscription) {
        let waited = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
        assert!(waited.is_err(), "expected no event, got {:?}", waited);
    }

    #[tokio::test]
    async fn student_joins_only_private_channel() {
        let router = ChannelRouter::default();
        let conn = ConnectionId::new();

        let _sub = router.join(conn, &identity("S1", Role::Student)).await.unwrap();

        assert_eq!(
            router.channels_of(&conn).await,
            vec![ChannelName::User(UserId::new("S1").unwrap())]
        );
        assert_eq!(router.connection_count(&ChannelName::AdminAlert).await, 0);
    }

    #[tokio::test]
    async fn team_member_also_joins_admin_channel() {
        let router = ChannelRouter::default();
        let conn = ConnectionId::new();

        let _sub = router.join(conn, &identity("T1", Role::TeamMember)).await.unwrap();

        let channels = router.channels_of(&conn).await;
        assert_eq!(channels.len(), 2);
        assert!(channels.contains(&ChannelName::AdminAlert));
        assert_eq!(router.connection_count(&ChannelName::AdminAlert).await, 1);
    }

    #[tokio::test]
    async fn joining_twice_is_rejected() {
        let router = ChannelRouter::default();
        let conn = ConnectionId::new();
        let who = identity("S1", Role::Student);

        let _sub = router.join(conn, &who).await.unwrap();
        let second = router.join(conn, &who).await;

        assert!(matches!(second, Err(RouterError::AlreadyJoined(id)) if id == conn));
    }

    #[tokio::test]
    async fn every_tab_of_a_user_receives_private_emissions() {
        let router = ChannelRouter::default();
        let who = identity("A1", Role::Agent);

        let mut tab1 = router.join(ConnectionId::new(), &who).await.unwrap();
        let mut tab2 = router.join(ConnectionId::new(), &who).await.unwrap();

        let reached = router
            .emit(Emission::to_channel(
                ChannelName::user(&who.id),
                ServerEvent::UnreadCount(3),
            ))
            .await;

        assert_eq!(reached, 2);
        assert_eq!(*tab1.recv().await.unwrap(), ServerEvent::UnreadCount(3));
        assert_eq!(*tab2.recv().await.unwrap(), ServerEvent::UnreadCount(3));
    }

    #[tokio::test]
    async fn admin_emissions_skip_students() {
        let router = ChannelRouter::default();

        let mut admin = router
            .join(ConnectionId::new(), &identity("AD1", Role::Admin))
            .await
            .unwrap();
        let mut student = router
            .join(ConnectionId::new(), &identity("S1", Role::Student))
            .await
            .unwrap();

        router
            .emit(Emission::to_channel(
                ChannelName::AdminAlert,
                ServerEvent::SeenStatusUpdate,
            ))
            .await;

        assert_eq!(*admin.recv().await.unwrap(), ServerEvent::SeenStatusUpdate);
        expect_nothing(&mut student).await;
    }

    #[tokio::test]
    async fn everyone_emission_reaches_all_connections() {
        let router = ChannelRouter::default();

        let mut admin = router
            .join(ConnectionId::new(), &identity("AD1", Role::Admin))
            .await
            .unwrap();
        let mut student = router
            .join(ConnectionId::new(), &identity("S1", Role::Student))
            .await
            .unwrap();

        let reached = router
            .emit(Emission::to_everyone(ServerEvent::AuthTokenRevoked(
                "x".to_string(),
            )))
            .await;

        assert_eq!(reached, 2);
        assert!(admin.recv().await.is_some());
        assert!(student.recv().await.is_some());
    }

    #[tokio::test]
    async fn emission_to_unjoined_channel_is_noop() {
        let router = ChannelRouter::default();
        let nobody = ChannelName::User(UserId::new("ghost").unwrap());

        let reached = router
            .emit(Emission::to_channel(nobody, ServerEvent::SeenStatusUpdate))
            .await;

        assert_eq!(reached, 0);
    }

    #[tokio::test]
    async fn leave_cleans_up_empty_channels() {
        let router = ChannelRouter::default();
        let conn = ConnectionId::new();

        {
            let _sub = router.join(conn, &identity("AD1", Role::Admin)).await.unwrap();
        }

        router.leave(&conn).await;

        assert!(router.active_channels().await.is_empty());
        assert_eq!(router.total_connections().await, 0);
        assert!(router.channels_of(&conn).await.is_empty());
    }

    #[tokio::test]
    async fn leave_keeps_channels_other_tabs_still_use() {
        let router = ChannelRouter::default();
        let who = identity("S1", Role::Student);
        let first = ConnectionId::new();

        {
            let _sub = router.join(first, &who).await.unwrap();
        }
        let mut second = router.join(ConnectionId::new(), &who).await.unwrap();

        router.leave(&first).await;

        assert_eq!(router.active_channels().await.len(), 1);
        router
            .emit(Emission::to_channel(
                ChannelName::user(&who.id),
                ServerEvent::UnreadCount(0),
            ))
            .await;
        assert!(second.recv().await.is_some());
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_to_newest_events() {
        let router = ChannelRouter::new(2);
        let who = identity("S1", Role::Student);
        let mut sub = router.join(ConnectionId::new(), &who).await.unwrap();

        for n in 0..5 {
            router
                .emit(Emission::to_channel(
                    ChannelName::user(&who.id),
                    ServerEvent::UnreadCount(n),
                ))
                .await;
        }

        assert_eq!(*sub.recv().await.unwrap(), ServerEvent::UnreadCount(3));
        assert_eq!(*sub.recv().await.unwrap(), ServerEvent::UnreadCount(4));
    }
}
