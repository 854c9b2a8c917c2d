//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `crypto` - handshake credential decryption
//! - `http` - router assembly and health probe
//! - `memory` - in-memory notification store
//! - `postgres` - PostgreSQL notification store
//! - `redis` - cross-instance emission relay
//! - `websocket` - connection handling and channel fan-out

pub mod crypto;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod redis;
pub mod websocket;

pub use crypto::AesGcmCredentialCodec;
pub use memory::InMemoryNotificationStore;
pub use postgres::PostgresNotificationStore;
pub use redis::RedisChannelRelay;
pub use websocket::{ChannelRouter, NotificationSocketState};
