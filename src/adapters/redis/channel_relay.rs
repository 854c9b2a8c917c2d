//! Redis pub/sub relay between server instances.
//!
//! Every emission is published on one Redis channel tagged with the
//! publishing instance's `ServerId`. Each instance runs a listener that
//! delivers emissions from other instances to its local rooms.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::task::JoinHandle;

use crate::adapters::websocket::ChannelRouter;
use crate::domain::channel::Emission;
use crate::ports::{ChannelRelay, RelayError, RelayedEmission, ServerId};

/// Redis channel carrying every relayed emission.
pub const FANOUT_CHANNEL: &str = "notifications:fanout";

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Redis-backed relay for multi-server deployments.
#[derive(Clone)]
pub struct RedisChannelRelay {
    client: redis::Client,
    conn: MultiplexedConnection,
    server_id: ServerId,
}

impl RedisChannelRelay {
    /// Open the publishing connection.
    pub async fn connect(url: &str, server_id: ServerId) -> Result<Self, RelayError> {
        let client = redis::Client::open(url).map_err(|e| RelayError::Redis(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RelayError::Redis(e.to_string()))?;

        Ok(Self {
            client,
            conn,
            server_id,
        })
    }

    /// Spawn the listener that feeds other instances' emissions into
    /// `router`. Reconnects with backoff until the task is aborted.
    pub fn spawn_listener(&self, router: Arc<ChannelRouter>) -> JoinHandle<()> {
        let client = self.client.clone();
        let server_id = self.server_id.clone();

        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            loop {
                match listen(&client, &server_id, &router).await {
                    Ok(()) => {
                        tracing::warn!("Relay subscription ended, resubscribing");
                        backoff = Duration::from_secs(1);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, retry_in = ?backoff, "Relay listener failed");
                    }
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        })
    }
}

/// Deliver relayed emissions until the subscription closes.
async fn listen(
    client: &redis::Client,
    server_id: &ServerId,
    router: &ChannelRouter,
) -> redis::RedisResult<()> {
    // PubSub requires a dedicated connection, not multiplexed
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.subscribe(FANOUT_CHANNEL).await?;
    tracing::info!(channel = FANOUT_CHANNEL, server_id = %server_id, "Relay listener subscribed");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Relay message has non-text payload");
                continue;
            }
        };

        match decode_relayed(&payload, server_id) {
            Ok(Some(emission)) => {
                router.emit(emission).await;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Dropping undecodable relay message"),
        }
    }
    Ok(())
}

/// Emissions published by this instance come back as `None`.
fn decode_relayed(payload: &str, server_id: &ServerId) -> Result<Option<Emission>, RelayError> {
    let relayed: RelayedEmission =
        serde_json::from_str(payload).map_err(|e| RelayError::Serialization(e.to_string()))?;

    if &relayed.origin == server_id {
        return Ok(None);
    }
    Ok(Some(relayed.emission))
}

#[async_trait]
impl ChannelRelay for RedisChannelRelay {
    fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    async fn publish(&self, emission: &Emission) -> Result<(), RelayError> {
        let relayed = RelayedEmission {
            origin: self.server_id.clone(),
            emission: emission.clone(),
        };
        let payload =
            serde_json::to_string(&relayed).map_err(|e| RelayError::Serialization(e.to_string()))?;

        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(FANOUT_CHANNEL, payload)
            .await
            .map_err(|e| RelayError::Redis(e.to_string()))
    }
}
