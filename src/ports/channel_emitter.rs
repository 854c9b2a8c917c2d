//! Channel emitter port - local delivery of emissions.

use async_trait::async_trait;

use crate::domain::channel::Emission;

/// Delivers emissions to the connections held by this process.
#[async_trait]
pub trait ChannelEmitter: Send + Sync {
    /// Returns how many connections the emission reached.
    async fn emit(&self, emission: Emission) -> usize;
}
