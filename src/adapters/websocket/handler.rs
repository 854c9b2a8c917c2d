//! WebSocket upgrade handler for notification connections.
//!
//! Handles the HTTP → WebSocket upgrade and manages the connection lifecycle:
//! 1. Resolve the handshake credential into an identity
//! 2. Join the identity's channels
//! 3. Dispatch inbound events in receipt order, echoing one envelope each
//! 4. Forward channel emissions and echoes to the client
//! 5. Leave all channels on disconnect

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{stream::SplitStream, SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;

use crate::application::{DiagnosticEcho, EventDispatcher, IdentityResolver};
use crate::domain::events::{DiagnosticEnvelope, ProtocolError};
use crate::domain::foundation::{ConnectionId, ConnectionState, DomainError, Identity, StateMachine};

use super::channels::{ChannelRouter, Subscription};
use super::messages::{encode_frame, InboundFrame, UNKNOWN_EVENT_NAME};

/// Default buffer of a connection's private outbound queue.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct NotificationSocketState {
    pub resolver: Arc<IdentityResolver>,
    pub dispatcher: Arc<EventDispatcher>,
    pub router: Arc<ChannelRouter>,
    pub outbound_buffer: usize,
}

impl NotificationSocketState {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        dispatcher: Arc<EventDispatcher>,
        router: Arc<ChannelRouter>,
    ) -> Self {
        Self {
            resolver,
            dispatcher,
            router,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }

    pub fn with_outbound_buffer(mut self, outbound_buffer: usize) -> Self {
        self.outbound_buffer = outbound_buffer;
        self
    }
}

/// Query string of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    #[serde(rename = "encryptedData")]
    pub encrypted_data: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// The upgrade is always accepted; a bad credential closes the socket right
/// after it opens.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HandshakeQuery>,
    State(state): State<NotificationSocketState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query.encrypted_data, state))
}

/// Moves a connection to its next lifecycle state.
///
/// An invalid transition is logged and ends the connection.
fn advance(current: ConnectionState, next: ConnectionState, connection_id: ConnectionId) -> ConnectionState {
    match current.transition_to(next) {
        Ok(state) => {
            tracing::trace!(connection_id = %connection_id, state = ?state, "Connection state changed");
            state
        }
        Err(e) => {
            tracing::error!(connection_id = %connection_id, "{}", e);
            ConnectionState::Disconnected
        }
    }
}

/// Handle an established WebSocket connection.
async fn handle_socket(mut socket: WebSocket, credential: Option<String>, state: NotificationSocketState) {
    let connection_id = ConnectionId::new();
    let mut lifecycle = ConnectionState::Connecting;

    let identity = match state.resolver.resolve(credential.as_deref()) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::warn!(connection_id = %connection_id, "Handshake rejected: {}", e);
            advance(lifecycle, ConnectionState::Disconnected, connection_id);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    lifecycle = advance(lifecycle, ConnectionState::Identified, connection_id);

    let subscription = match state.router.join(connection_id, &identity).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::error!(connection_id = %connection_id, "Join failed: {}", e);
            advance(lifecycle, ConnectionState::Disconnected, connection_id);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };
    lifecycle = advance(lifecycle, ConnectionState::Active, connection_id);
    if !lifecycle.accepts_events() {
        drop(subscription);
        state.router.leave(&connection_id).await;
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    tracing::info!(
        connection_id = %connection_id,
        user_id = %identity.id,
        role = %identity.role,
        "Connection established"
    );

    let (mut sink, stream) = socket.split();
    let (echo, mut echo_rx) = DiagnosticEcho::channel(connection_id, state.outbound_buffer);

    // Channel traffic is polled first so an emission precedes the echo of
    // the event that caused it.
    let mut send_task = tokio::spawn(async move {
        let mut subscription: Subscription = subscription;
        loop {
            let encoded = tokio::select! {
                biased;
                fanned = subscription.recv() => match fanned {
                    Some(event) => encode_frame(&event),
                    None => break,
                },
                echoed = echo_rx.recv() => match echoed {
                    Some(event) => encode_frame(&event),
                    None => break,
                },
            };

            let text = match encoded {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(connection_id = %connection_id, "Failed to encode frame: {}", e);
                    continue;
                }
            };

            if let Err(e) = sink.send(Message::Text(text)).await {
                tracing::debug!(connection_id = %connection_id, "Send error, closing connection: {}", e);
                break;
            }
        }
    });

    let dispatcher = state.dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        receive_events(stream, &identity, &dispatcher, &echo).await;
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
    }

    // Both tasks are gone, so the subscription is dropped.
    state.router.leave(&connection_id).await;
    advance(ConnectionState::Active, ConnectionState::Disconnected, connection_id);
    tracing::info!(connection_id = %connection_id, "Connection closed");
}

/// Reads frames until the client goes away, handling each to completion
/// before reading the next. Runs only for `Active` connections.
async fn receive_events(
    mut stream: SplitStream<WebSocket>,
    identity: &Identity,
    dispatcher: &EventDispatcher,
    echo: &DiagnosticEcho,
) {
    let connection_id = echo.connection_id();

    while let Some(result) = stream.next().await {
        let envelope = match result {
            Ok(Message::Text(text)) => match InboundFrame::parse(&text) {
                Ok(frame) => dispatcher.handle(identity, &frame.event, frame.data).await,
                Err(e) => malformed(connection_id, Value::String(text), e),
            },
            Ok(Message::Binary(_)) => malformed(
                connection_id,
                Value::Null,
                ProtocolError::MalformedFrame("binary frames are not supported".to_string()),
            ),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %connection_id, "Client sent close frame");
                break;
            }
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, "Receive error: {}", e);
                break;
            }
        };

        if !echo.echo(envelope).await {
            break;
        }
    }
}

fn malformed(connection_id: ConnectionId, payload: Value, error: ProtocolError) -> DiagnosticEnvelope {
    tracing::warn!(connection_id = %connection_id, "Rejected frame: {}", error);
    DiagnosticEnvelope::error(UNKNOWN_EVENT_NAME, payload, &DomainError::from(error))
}

/// Create axum router for the notification endpoint.
pub fn notification_router(ws_path: &str) -> axum::Router<NotificationSocketState> {
    use axum::routing::get;

    axum::Router::new().route(ws_path, get(ws_handler))
}
