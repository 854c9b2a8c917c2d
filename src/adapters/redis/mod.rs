//! Redis adapters.

mod channel_relay;

pub use channel_relay::{RedisChannelRelay, FANOUT_CHANNEL};
