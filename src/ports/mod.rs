//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the notification core and the outside world. Adapters implement these ports.
//!
//! - `NotificationStore` - persistence of notification records
//! - `CredentialDecoder` - decryption of handshake credentials
//! - `ChannelEmitter` - delivery of emissions to local connections
//! - `ChannelRelay` - fan-out of emissions between server instances

mod channel_emitter;
mod channel_relay;
mod credential_decoder;
mod notification_store;

pub use channel_emitter::ChannelEmitter;
pub use channel_relay::{ChannelRelay, RelayError, RelayedEmission, ServerId};
pub use credential_decoder::{CredentialDecoder, CredentialError};
pub use notification_store::NotificationStore;
