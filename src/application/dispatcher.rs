//! EventDispatcher - handles inbound events of active connections.
//!
//! Each event is decoded, authorized, applied to the store, and fanned out.
//! Fan-out targets:
//!
//! | Event                         | Emits                              | To                  |
//! |-------------------------------|------------------------------------|---------------------|
//! | student/agent → admin         | `GLOBAL_NOTIFICATION_ADMIN_ALERT`  | admin channel       |
//! | admin → student               | `GLOBAL_NOTIFICATION_STUDENT_ALERT`| `USER_<recieverId>` |
//! | admin → agent                 | `GLOBAL_NOTIFICATION_AGENT_ALERT`  | `USER_<recieverId>` |
//! | `GET_NOTIFICATIONS_FOR_ADMIN` | page                               | admin channel       |
//! | `GET_NOTIFICATIONS_FOR_USER`  | page                               | requester           |
//! | `GET_UNREAD_COUNT`            | count                              | requester or admin  |
//! | `NOTIFICATION_SEEN_BY_ADMIN`  | `NOTIFICATION_SEEN_STATUS_UPDATE`  | admin channel       |
//! | `NOTIFICATION_SEEN_BY_USER`   | nothing                            |                     |
//! | `NOTIFICATION_IS_READ`        | `NOTIFICATION_READ_STATUS_UPDATE`  | requester or admin  |
//! | `DELETE_NOTIFICATION`         | `DELETE_NOTIFICATION`              | everyone            |
//! | `DELETE_AUTH_TOKEN`           | `DELETE_AUTH_TOKEN`                | `USER_<userId>`     |

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::channel::{ChannelName, Emission};
use crate::domain::events::{
    AlertPayload, ClientEvent, DeleteConfirmation, DiagnosticEnvelope, DirectPayload,
    MarkReadPayload, PagePayload, ProtocolError, ServerEvent, UnseenScope, DELETED_MESSAGE,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, Identity, NotificationId, Role, ValidationError,
};
use crate::domain::notification::{Audience, NewNotification, PageRequest};
use crate::ports::{ChannelEmitter, ChannelRelay, NotificationStore};

/// Tunables of the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub default_page_limit: u32,
    pub max_page_limit: u32,
    /// Reject admin-scoped events from non-privileged connections.
    pub strict_authorization: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_page_limit: 20,
            max_page_limit: 100,
            strict_authorization: true,
        }
    }
}

/// Failure of one inbound event.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("{event} is restricted to admin and team member connections")]
    Forbidden { event: &'static str },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<ValidationError> for DispatchError {
    fn from(err: ValidationError) -> Self {
        DispatchError::Domain(err.into())
    }
}

impl From<DispatchError> for DomainError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Protocol(e) => e.into(),
            DispatchError::Forbidden { .. } => DomainError::new(ErrorCode::Forbidden, err.to_string()),
            DispatchError::Domain(e) => e,
        }
    }
}

/// Handles inbound events for every connection of this process.
///
/// Constructed once at startup and shared by all connections.
pub struct EventDispatcher {
    store: Arc<dyn NotificationStore>,
    emitter: Arc<dyn ChannelEmitter>,
    relay: Option<Arc<dyn ChannelRelay>>,
    config: DispatchConfig,
}

impl EventDispatcher {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        emitter: Arc<dyn ChannelEmitter>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            emitter,
            relay: None,
            config,
        }
    }

    /// Also publish every emission to other instances.
    pub fn with_relay(mut self, relay: Arc<dyn ChannelRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    /// Decodes and dispatches a raw event, always producing the envelope to
    /// echo back to the sender.
    ///
    /// Success envelopes carry the result; error envelopes carry the
    /// original payload together with the error code and reason.
    pub async fn handle(&self, identity: &Identity, name: &str, data: Value) -> DiagnosticEnvelope {
        let outcome = match ClientEvent::decode(name, data.clone()) {
            Ok(event) => self.dispatch(identity, event).await,
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(payload) => {
                tracing::info!(user_id = %identity.id, event = name, "Event handled");
                DiagnosticEnvelope::success(name, payload)
            }
            Err(e) => {
                let error = DomainError::from(e);
                tracing::warn!(
                    user_id = %identity.id,
                    event = name,
                    code = %error.code,
                    "Event failed: {}",
                    error.message
                );
                DiagnosticEnvelope::error(name, data, &error)
            }
        }
    }

    /// Applies one decoded event and fans out its result.
    ///
    /// Returns the payload mirrored to the sender.
    pub async fn dispatch(&self, identity: &Identity, event: ClientEvent) -> Result<Value, DispatchError> {
        if self.config.strict_authorization && event.is_admin_scoped() && !identity.is_privileged() {
            return Err(DispatchError::Forbidden { event: event.name() });
        }

        match event {
            ClientEvent::StudentToAdmin(payload) => {
                self.alert_admins(identity, Role::Student, payload).await
            }
            ClientEvent::AgentToAdmin(payload) => {
                self.alert_admins(identity, Role::Agent, payload).await
            }
            ClientEvent::AdminToStudent(payload) => {
                self.alert_user(payload, Role::Student, ServerEvent::StudentAlert).await
            }
            ClientEvent::AdminToAgent(payload) => {
                self.alert_user(payload, Role::Agent, ServerEvent::AgentAlert).await
            }
            ClientEvent::FetchAdminNotifications(payload) => {
                let page = self.store.list_for_admin(self.page_request(payload)?).await?;
                let echoed = to_value(&page)?;
                self.emit(Emission::to_channel(
                    ChannelName::AdminAlert,
                    ServerEvent::AdminNotifications(page),
                ))
                .await;
                Ok(echoed)
            }
            ClientEvent::FetchUserNotifications(payload) => {
                let page = self
                    .store
                    .list_for_user(&identity.id, identity.role, self.page_request(payload)?)
                    .await?;
                let echoed = to_value(&page)?;
                self.emit(Emission::to_channel(
                    ChannelName::user(&identity.id),
                    ServerEvent::UserNotifications(page),
                ))
                .await;
                Ok(echoed)
            }
            ClientEvent::FetchUnseenCount(scope) => {
                let (audience, channel) = match scope {
                    UnseenScope::User => (
                        Audience::User(identity.id.clone()),
                        ChannelName::user(&identity.id),
                    ),
                    UnseenScope::Admin => (Audience::AdminGroup, ChannelName::AdminAlert),
                };
                let count = self.store.count_unseen(&audience).await?;
                self.emit(Emission::to_channel(channel, ServerEvent::UnreadCount(count)))
                    .await;
                Ok(json!(count))
            }
            ClientEvent::MarkAllSeenByAdmin => {
                let updated = self.store.mark_all_seen(&Audience::AdminGroup).await?;
                self.emit(Emission::to_channel(
                    ChannelName::AdminAlert,
                    ServerEvent::SeenStatusUpdate,
                ))
                .await;
                Ok(json!({ "updated": updated }))
            }
            ClientEvent::MarkAllSeenByUser => {
                let updated = self
                    .store
                    .mark_all_seen(&Audience::User(identity.id.clone()))
                    .await?;
                Ok(json!({ "updated": updated }))
            }
            ClientEvent::MarkRead(payload) => self.mark_read(identity, payload).await,
            ClientEvent::DeleteNotification(raw_id) => {
                let id = NotificationId::parse_field("_id", &raw_id)?;
                self.store.delete(&id).await?;
                let echoed = to_value(&DeleteConfirmation::new(id))?;
                self.emit(Emission::to_everyone(ServerEvent::NotificationDeleted(
                    DELETED_MESSAGE.to_string(),
                )))
                .await;
                Ok(echoed)
            }
            ClientEvent::ForceLogout(payload) => {
                let echoed = json!({ "userId": payload.user_id, "reason": payload.reason });
                self.emit(Emission::to_channel(
                    ChannelName::user(&payload.user_id),
                    ServerEvent::AuthTokenRevoked(payload.reason),
                ))
                .await;
                Ok(echoed)
            }
        }
    }

    /// The sender role is fixed by the event, not by the connection.
    async fn alert_admins(
        &self,
        identity: &Identity,
        sender_role: Role,
        payload: AlertPayload,
    ) -> Result<Value, DispatchError> {
        let new = NewNotification::to_admin_group(
            identity.id.clone(),
            sender_role,
            payload.into_content(),
        )?;
        let notification = self.store.create(new).await?;
        let echoed = to_value(&notification)?;

        self.emit(Emission::to_channel(
            ChannelName::AdminAlert,
            ServerEvent::AdminAlert(notification),
        ))
        .await;
        Ok(echoed)
    }

    async fn alert_user<F>(
        &self,
        payload: DirectPayload,
        recipient_role: Role,
        alert: F,
    ) -> Result<Value, DispatchError>
    where
        F: FnOnce(crate::domain::notification::Notification) -> ServerEvent,
    {
        let channel = ChannelName::user(&payload.receiver_id);
        let new = NewNotification::from_admin_desk(
            payload.receiver_id,
            recipient_role,
            payload.content.into_content(),
        )?;
        let notification = self.store.create(new).await?;
        let echoed = to_value(&notification)?;

        self.emit(Emission::to_channel(channel, alert(notification))).await;
        Ok(echoed)
    }

    async fn mark_read(&self, identity: &Identity, payload: MarkReadPayload) -> Result<Value, DispatchError> {
        let id = NotificationId::parse_field("_id", &payload.id)?;
        let notification = self.store.mark_read(&id).await?;

        let channel = if payload.by_admin {
            ChannelName::AdminAlert
        } else {
            ChannelName::user(&identity.id)
        };
        self.emit(Emission::to_channel(channel, ServerEvent::ReadStatusUpdate(id)))
            .await;
        Ok(to_value(&notification)?)
    }

    /// Missing values take defaults; limits above the maximum are capped.
    fn page_request(&self, payload: PagePayload) -> Result<PageRequest, ValidationError> {
        let page = payload.page.unwrap_or(1);
        let limit = payload
            .limit
            .unwrap_or(self.config.default_page_limit)
            .min(self.config.max_page_limit);
        PageRequest::new(page, limit, self.config.max_page_limit)
    }

    /// Delivers locally, then relays to other instances.
    ///
    /// Relay failures are logged only; local delivery already happened.
    async fn emit(&self, emission: Emission) {
        let relayed = self.relay.as_ref().map(|_| emission.clone());
        let reached = self.emitter.emit(emission).await;
        tracing::debug!(reached, "Emission delivered locally");

        if let (Some(relay), Some(emission)) = (&self.relay, relayed) {
            if let Err(e) = relay.publish(&emission).await {
                tracing::warn!(
                    error = %e,
                    emission_target = %emission.target,
                    "Failed to relay emission"
                );
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, DomainError> {
    serde_json::to_value(value).map_err(|e| {
        DomainError::new(
            ErrorCode::InternalError,
            format!("Failed to serialize result: {}", e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryNotificationStore;
    use crate::domain::events::{inbound, DiagnosticStatus};
    use crate::domain::foundation::UserId;
    use crate::ports::{RelayError, ServerId};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEmitter {
        emitted: Mutex<Vec<Emission>>,
    }

    impl RecordingEmitter {
        fn emitted(&self) -> Vec<Emission> {
            self.emitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelEmitter for RecordingEmitter {
        async fn emit(&self, emission: Emission) -> usize {
            self.emitted.lock().unwrap().push(emission);
            1
        }
    }

    struct FailingRelay {
        server_id: ServerId,
        attempts: Mutex<usize>,
    }

    #[async_trait]
    impl ChannelRelay for FailingRelay {
        fn server_id(&self) -> &ServerId {
            &self.server_id
        }

        async fn publish(&self, _emission: &Emission) -> Result<(), RelayError> {
            *self.attempts.lock().unwrap() += 1;
            Err(RelayError::Redis("connection refused".to_string()))
        }
    }

    struct Fixture {
        store: Arc<InMemoryNotificationStore>,
        emitter: Arc<RecordingEmitter>,
        dispatcher: EventDispatcher,
    }

    fn fixture_with(config: DispatchConfig) -> Fixture {
        let store = Arc::new(InMemoryNotificationStore::new());
        let emitter = Arc::new(RecordingEmitter::default());
        let dispatcher = EventDispatcher::new(store.clone(), emitter.clone(), config);
        Fixture {
            store,
            emitter,
            dispatcher,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(DispatchConfig::default())
    }

    fn who(id: &str, role: Role) -> Identity {
        Identity::new(UserId::new(id).unwrap(), role)
    }

    #[tokio::test]
    async fn student_alert_is_stored_for_admin_group_and_sent_to_admin_channel() {
        let f = fixture();
        let envelope = f
            .dispatcher
            .handle(
                &who("S1", Role::Student),
                inbound::STUDENT_TO_ADMIN,
                json!({"title": "Help", "message": "Need assistance"}),
            )
            .await;

        assert_eq!(envelope.status, DiagnosticStatus::Success);
        assert_eq!(envelope.payload["sender"], json!({"userId": "S1", "role": "3"}));
        assert_eq!(envelope.payload["recipient"], json!({"role": "0", "isGroup": true}));

        let emitted = f.emitter.emitted();
        assert_eq!(emitted.len(), 1);
        assert_eq!(
            emitted[0].target,
            crate::domain::channel::EmissionTarget::Channel(ChannelName::AdminAlert)
        );
        assert!(matches!(emitted[0].event, ServerEvent::AdminAlert(_)));
        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn admin_alert_sender_role_follows_the_event() {
        let f = fixture();

        let from_agent = f
            .dispatcher
            .handle(&who("A1", Role::Agent), inbound::STUDENT_TO_ADMIN, json!({"message": "m"}))
            .await;
        assert_eq!(from_agent.status, DiagnosticStatus::Success);
        assert_eq!(from_agent.payload["sender"], json!({"userId": "A1", "role": "3"}));

        let from_admin = f
            .dispatcher
            .handle(&who("AD1", Role::Admin), inbound::AGENT_TO_ADMIN, json!({"message": "m"}))
            .await;
        assert_eq!(from_admin.status, DiagnosticStatus::Success);
        assert_eq!(from_admin.payload["sender"], json!({"userId": "AD1", "role": "2"}));

        assert_eq!(f.emitter.emitted().len(), 2);
        assert_eq!(f.store.len().await, 2);
    }

    #[tokio::test]
    async fn admin_to_agent_targets_only_the_receiver() {
        let f = fixture();
        let envelope = f
            .dispatcher
            .handle(
                &who("AD1", Role::Admin),
                inbound::ADMIN_TO_AGENT,
                json!({"recieverId": "A1", "title": "Approved", "message": ""}),
            )
            .await;

        assert_eq!(envelope.status, DiagnosticStatus::Success);
        let emitted = f.emitter.emitted();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].target.to_string(), "USER_A1");
        match &emitted[0].event {
            ServerEvent::AgentAlert(n) => {
                assert!(!n.recipient.is_group);
                assert_eq!(n.recipient.role, Role::Agent);
                assert!(n.sender.user_id.is_none());
            }
            other => panic!("Expected AgentAlert, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn students_cannot_use_admin_events_when_strict() {
        let f = fixture();
        let envelope = f
            .dispatcher
            .handle(
                &who("S1", Role::Student),
                inbound::ADMIN_TO_STUDENT,
                json!({"recieverId": "S2", "message": "spoof"}),
            )
            .await;

        assert_eq!(envelope.status, DiagnosticStatus::Error);
        assert_eq!(envelope.code.as_deref(), Some("FORBIDDEN"));
        assert_eq!(envelope.payload["recieverId"], "S2");
        assert!(f.emitter.emitted().is_empty());
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn lenient_mode_lets_any_connection_fetch_admin_history() {
        let f = fixture_with(DispatchConfig {
            strict_authorization: false,
            ..DispatchConfig::default()
        });

        let envelope = f
            .dispatcher
            .handle(&who("S1", Role::Student), inbound::GET_FOR_ADMIN, Value::Null)
            .await;

        assert_eq!(envelope.status, DiagnosticStatus::Success);
        assert_eq!(f.emitter.emitted()[0].target.to_string(), "GLOBAL_ADMIN_ALERT");
    }

    #[tokio::test]
    async fn admin_history_is_broadcast_to_admin_channel() {
        let f = fixture();
        let student = who("S1", Role::Student);
        for _ in 0..3 {
            f.dispatcher
                .handle(&student, inbound::STUDENT_TO_ADMIN, json!({"message": "m"}))
                .await;
        }

        let envelope = f
            .dispatcher
            .handle(
                &who("T1", Role::TeamMember),
                inbound::GET_FOR_ADMIN,
                json!({"page": 1, "limit": 2}),
            )
            .await;

        assert_eq!(envelope.payload["total"], 3);
        assert_eq!(envelope.payload["hasMore"], true);
        let last = f.emitter.emitted().pop().unwrap();
        assert!(matches!(last.event, ServerEvent::AdminNotifications(ref p) if p.notifications.len() == 2));
    }

    #[tokio::test]
    async fn oversized_limit_is_capped_and_zero_page_rejected() {
        let f = fixture();
        let student = who("S1", Role::Student);

        let capped = f
            .dispatcher
            .handle(&student, inbound::GET_FOR_USER, json!({"limit": 5000}))
            .await;
        assert_eq!(capped.payload["limit"], 100);

        let rejected = f
            .dispatcher
            .handle(&student, inbound::GET_FOR_USER, json!({"page": 0}))
            .await;
        assert_eq!(rejected.code.as_deref(), Some("OUT_OF_RANGE"));
    }

    #[tokio::test]
    async fn unread_count_scope_selects_audience_and_channel() {
        let f = fixture();
        let admin = who("AD1", Role::Admin);
        f.dispatcher
            .handle(&who("S1", Role::Student), inbound::STUDENT_TO_ADMIN, json!({"message": "m"}))
            .await;
        f.dispatcher
            .handle(&admin, inbound::ADMIN_TO_STUDENT, json!({"recieverId": "S1", "message": "m"}))
            .await;

        let user = f
            .dispatcher
            .handle(&who("S1", Role::Student), inbound::GET_UNREAD_COUNT, json!("emitForUser"))
            .await;
        assert_eq!(user.payload, json!(1));
        assert_eq!(f.emitter.emitted().pop().unwrap().target.to_string(), "USER_S1");

        let group = f
            .dispatcher
            .handle(&admin, inbound::GET_UNREAD_COUNT, Value::Null)
            .await;
        assert_eq!(group.payload, json!(1));
        assert_eq!(
            f.emitter.emitted().pop().unwrap().target.to_string(),
            "GLOBAL_ADMIN_ALERT"
        );
    }

    #[tokio::test]
    async fn seen_by_user_emits_nothing() {
        let f = fixture();
        let envelope = f
            .dispatcher
            .handle(&who("S1", Role::Student), inbound::SEEN_BY_USER, Value::Null)
            .await;

        assert_eq!(envelope.status, DiagnosticStatus::Success);
        assert!(f.emitter.emitted().is_empty());
    }

    #[tokio::test]
    async fn seen_by_admin_signals_admin_channel() {
        let f = fixture();
        f.dispatcher
            .handle(&who("S1", Role::Student), inbound::STUDENT_TO_ADMIN, json!({"message": "m"}))
            .await;

        let envelope = f
            .dispatcher
            .handle(&who("AD1", Role::Admin), inbound::SEEN_BY_ADMIN, Value::Null)
            .await;

        assert_eq!(envelope.payload, json!({"updated": 1}));
        let last = f.emitter.emitted().pop().unwrap();
        assert_eq!(last.event, ServerEvent::SeenStatusUpdate);
    }

    #[tokio::test]
    async fn mark_read_twice_succeeds_and_routes_by_flag() {
        let f = fixture();
        let admin = who("AD1", Role::Admin);
        let created = f
            .dispatcher
            .handle(&admin, inbound::ADMIN_TO_STUDENT, json!({"recieverId": "S1", "message": "m"}))
            .await;
        let id = created.payload["_id"].clone();
        let student = who("S1", Role::Student);

        for _ in 0..2 {
            let envelope = f
                .dispatcher
                .handle(&student, inbound::IS_READ, json!({"_id": id}))
                .await;
            assert_eq!(envelope.status, DiagnosticStatus::Success);
            assert_eq!(envelope.payload["read"], true);
        }
        assert_eq!(f.emitter.emitted().pop().unwrap().target.to_string(), "USER_S1");

        f.dispatcher
            .handle(&admin, inbound::IS_READ, json!({"_id": id, "byAdmin": true}))
            .await;
        assert_eq!(
            f.emitter.emitted().pop().unwrap().target.to_string(),
            "GLOBAL_ADMIN_ALERT"
        );
    }

    #[tokio::test]
    async fn malformed_and_unknown_ids_are_reported() {
        let f = fixture();
        let student = who("S1", Role::Student);

        let malformed = f
            .dispatcher
            .handle(&student, inbound::IS_READ, json!({"_id": "nope"}))
            .await;
        assert_eq!(malformed.code.as_deref(), Some("INVALID_FORMAT"));

        let unknown = f
            .dispatcher
            .handle(&student, inbound::DELETE, json!(NotificationId::new().to_string()))
            .await;
        assert_eq!(unknown.code.as_deref(), Some("NOTIFICATION_NOT_FOUND"));
        assert!(f.emitter.emitted().is_empty());
    }

    #[tokio::test]
    async fn delete_broadcasts_to_everyone() {
        let f = fixture();
        let created = f
            .dispatcher
            .handle(&who("S1", Role::Student), inbound::STUDENT_TO_ADMIN, json!({"message": "m"}))
            .await;
        let id = created.payload["_id"].as_str().unwrap().to_string();

        let envelope = f
            .dispatcher
            .handle(&who("AD1", Role::Admin), inbound::DELETE, json!(id))
            .await;

        assert_eq!(envelope.payload["_id"], id.as_str());
        assert_eq!(envelope.payload["message"], "deleted successfully");
        let last = f.emitter.emitted().pop().unwrap();
        assert_eq!(last.target, crate::domain::channel::EmissionTarget::Everyone);
        assert_eq!(
            last.event,
            ServerEvent::NotificationDeleted("deleted successfully".to_string())
        );
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn force_logout_reaches_target_user() {
        let f = fixture();
        f.dispatcher
            .handle(
                &who("AD1", Role::Admin),
                inbound::DELETE_AUTH_TOKEN,
                json!({"userId": "A7", "reason": "account suspended"}),
            )
            .await;

        let last = f.emitter.emitted().pop().unwrap();
        assert_eq!(last.target.to_string(), "USER_A7");
        assert_eq!(last.event, ServerEvent::AuthTokenRevoked("account suspended".into()));
    }

    #[tokio::test]
    async fn unknown_event_gets_error_envelope_with_its_name() {
        let f = fixture();
        let envelope = f
            .dispatcher
            .handle(&who("S1", Role::Student), "JOIN_ROOM", json!({"room": "x"}))
            .await;

        assert_eq!(envelope.event_name, "JOIN_ROOM");
        assert_eq!(envelope.code.as_deref(), Some("UNKNOWN_EVENT"));
        assert_eq!(envelope.payload, json!({"room": "x"}));
    }

    #[tokio::test]
    async fn relay_failure_does_not_fail_the_event() {
        let store = Arc::new(InMemoryNotificationStore::new());
        let emitter = Arc::new(RecordingEmitter::default());
        let relay = Arc::new(FailingRelay {
            server_id: ServerId::new("node-a"),
            attempts: Mutex::new(0),
        });
        let dispatcher = EventDispatcher::new(store, emitter.clone(), DispatchConfig::default())
            .with_relay(relay.clone());

        let envelope = dispatcher
            .handle(&who("S1", Role::Student), inbound::STUDENT_TO_ADMIN, json!({"message": "m"}))
            .await;

        assert_eq!(envelope.status, DiagnosticStatus::Success);
        assert_eq!(emitter.emitted().len(), 1);
        assert_eq!(*relay.attempts.lock().unwrap(), 1);
    }
}
