//! ChannelRelay port - fan-out between server instances.
//!
//! Local rooms only reach connections held by this process. When several
//! instances run behind a load balancer, every emission is also handed to the
//! relay so the other instances can deliver it to their own connections.
//!
//! ## Flow
//!
//! 1. Dispatcher on instance A emits to `USER_S1` locally
//! 2. Dispatcher publishes the emission through the relay, tagged with A's `ServerId`
//! 3. Instance B receives it and delivers to its local `USER_S1` room
//! 4. Instance A ignores its own emission on the way back

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::channel::Emission;

/// Unique identifier for a server instance in a multi-server deployment.
///
/// Format is typically hostname:port or container/pod ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hostname and port, with a random suffix so restarted instances never
    /// share an id with their predecessor.
    pub fn from_env(port: u16) -> Self {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{}:{}:{}", hostname, port, &suffix[..8]))
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An emission as it travels between instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedEmission {
    pub origin: ServerId,
    #[serde(flatten)]
    pub emission: Emission,
}

/// Errors that can occur while relaying.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Redis error: {0}")]
    Redis(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Publishes emissions to the other instances.
#[async_trait]
pub trait ChannelRelay: Send + Sync {
    /// Identity of this instance, stamped on every published emission.
    fn server_id(&self) -> &ServerId;

    async fn publish(&self, emission: &Emission) -> Result<(), RelayError>;
}
