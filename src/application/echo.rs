//! Diagnostic echo - per-connection mirror of handled events.
//!
//! Envelopes go only to the connection that sent the event, never to a
//! channel.

use tokio::sync::mpsc;

use crate::domain::events::{DiagnosticEnvelope, ServerEvent};
use crate::domain::foundation::ConnectionId;

/// Sending half of one connection's private outbound queue.
#[derive(Clone)]
pub struct DiagnosticEcho {
    connection_id: ConnectionId,
    tx: mpsc::Sender<ServerEvent>,
}

impl DiagnosticEcho {
    /// Creates the echo and the receiver the connection's writer drains.
    pub fn channel(connection_id: ConnectionId, buffer: usize) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { connection_id, tx }, rx)
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Queues an envelope. Returns false once the connection is gone.
    pub async fn echo(&self, envelope: DiagnosticEnvelope) -> bool {
        let delivered = self.tx.send(ServerEvent::Diagnostic(envelope)).await.is_ok();
        if !delivered {
            tracing::debug!(connection_id = %self.connection_id, "Echo dropped, connection closed");
        }
        delivered
    }
}
