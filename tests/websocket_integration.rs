//! Integration tests for the notification socket.
//!
//! Serves the real router on an ephemeral port and talks to it with a
//! WebSocket client:
//! 1. Bad credentials get a close frame and never join a channel
//! 2. Channel traffic reaches the client before the echo of the event
//!    that caused it

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use secrecy::Secret;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use agency_notify::adapters::http::app_router;
use agency_notify::adapters::{
    AesGcmCredentialCodec, ChannelRouter, InMemoryNotificationStore, NotificationSocketState,
};
use agency_notify::application::{DispatchConfig, EventDispatcher, IdentityResolver};
use agency_notify::config::ServerConfig;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// Test Infrastructure
// =============================================================================

struct Server {
    addr: SocketAddr,
    codec: AesGcmCredentialCodec,
    router: Arc<ChannelRouter>,
}

impl Server {
    async fn start() -> Self {
        let key = Secret::new(AesGcmCredentialCodec::generate_key());
        let codec = AesGcmCredentialCodec::new(&key).unwrap();
        let resolver = IdentityResolver::new(Arc::new(AesGcmCredentialCodec::new(&key).unwrap()));
        let router = Arc::new(ChannelRouter::with_default_capacity());
        let dispatcher = EventDispatcher::new(
            Arc::new(InMemoryNotificationStore::new()),
            router.clone(),
            DispatchConfig::default(),
        );
        let state = NotificationSocketState::new(Arc::new(resolver), Arc::new(dispatcher), router.clone());
        let app = app_router(state, &ServerConfig::default());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, codec, router }
    }

    async fn connect_with(&self, credential: &str) -> Client {
        let url = format!("ws://{}/notifications/?encryptedData={}", self.addr, credential);
        let (client, _) = connect_async(url).await.unwrap();
        client
    }

    async fn connect(&self, id: &str, role: &str) -> Client {
        let credential = self
            .codec
            .encrypt(&json!({"_id": id, "role": role}).to_string())
            .unwrap();
        let client = self.connect_with(&credential).await;
        self.wait_for_connections(1).await;
        client
    }

    async fn wait_for_connections(&self, expected: usize) {
        for _ in 0..50 {
            if self.router.total_connections().await >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Connection never joined its channels");
    }
}

async fn send(client: &mut Client, event: &str, data: Value) {
    let frame = json!({"event": event, "data": data}).to_string();
    client.send(Message::Text(frame)).await.unwrap();
}

async fn next_frame(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Socket closed")
            .unwrap();
        match message {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text frame, got {:?}", other),
        }
    }
}

// =============================================================================
// Handshake
// =============================================================================

#[tokio::test]
async fn bad_credential_gets_close_frame_and_joins_nothing() {
    let server = Server::start().await;
    let mut client = server.connect_with("not-a-credential").await;

    let first = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("Timed out waiting for close");
    assert!(
        matches!(first, Some(Ok(Message::Close(_)))),
        "Expected close frame, got {:?}",
        first
    );
    assert_eq!(server.router.total_connections().await, 0);
}

#[tokio::test]
async fn missing_credential_gets_close_frame() {
    let server = Server::start().await;
    let url = format!("ws://{}/notifications/", server.addr);
    let (mut client, _) = connect_async(url).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("Timed out waiting for close");
    assert!(matches!(first, Some(Ok(Message::Close(_)))));
}

// =============================================================================
// Event flow
// =============================================================================

#[tokio::test]
async fn channel_emission_precedes_echo_of_its_event() {
    let server = Server::start().await;
    let mut admin = server.connect("AD1", "0").await;

    send(&mut admin, "GET_UNREAD_COUNT", Value::Null).await;

    let first = next_frame(&mut admin).await;
    assert_eq!(first, json!({"event": "GET_UNREAD_COUNT", "data": 0}));

    let second = next_frame(&mut admin).await;
    assert_eq!(second["event"], "onMessage");
    assert_eq!(second["data"]["eventName"], "GET_UNREAD_COUNT");
    assert_eq!(second["data"]["status"], "success");
}

#[tokio::test]
async fn student_alert_reaches_admin_socket_and_echo_reaches_student() {
    let server = Server::start().await;
    let mut admin = server.connect("AD1", "0").await;
    let mut student = server.connect("S1", "3").await;
    server.wait_for_connections(2).await;

    send(
        &mut student,
        "NOTIFICATION_STUDENT_TO_ADMIN",
        json!({"title": "Help", "message": "Need assistance"}),
    )
    .await;

    let alert = next_frame(&mut admin).await;
    assert_eq!(alert["event"], "GLOBAL_NOTIFICATION_ADMIN_ALERT");
    assert_eq!(alert["data"]["sender"], json!({"userId": "S1", "role": "3"}));

    let echo = next_frame(&mut student).await;
    assert_eq!(echo["event"], "onMessage");
    assert_eq!(echo["data"]["status"], "success");
}

#[tokio::test]
async fn malformed_frame_is_answered_and_socket_stays_open() {
    let server = Server::start().await;
    let mut student = server.connect("S1", "3").await;

    student.send(Message::Text("not json".to_string())).await.unwrap();
    let error = next_frame(&mut student).await;
    assert_eq!(error["data"]["eventName"], "UNKNOWN");
    assert_eq!(error["data"]["code"], "MALFORMED_FRAME");

    send(&mut student, "GET_UNREAD_COUNT", json!("emitForUser")).await;
    let count = next_frame(&mut student).await;
    assert_eq!(count, json!({"event": "GET_UNREAD_COUNT", "data": 0}));
}

#[tokio::test]
async fn disconnect_leaves_all_channels() {
    let server = Server::start().await;
    let mut admin = server.connect("AD1", "0").await;

    admin.close(None).await.unwrap();

    for _ in 0..50 {
        if server.router.total_connections().await == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.router.total_connections().await, 0);
    assert!(server.router.active_channels().await.is_empty());
}
