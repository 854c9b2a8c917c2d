//! Notification delivery configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Buffers and paging limits of the notification service
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Buffer of each channel's broadcast queue
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Page size when a fetch names none
    #[serde(default = "default_page_limit")]
    pub default_page_limit: u32,

    /// Largest page size served
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: u32,

    /// Buffer of each connection's private outbound queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl NotificationsConfig {
    /// Validate notification configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_page_limit == 0 || self.default_page_limit > self.max_page_limit {
            return Err(ValidationError::InvalidPageLimits);
        }
        if self.channel_capacity == 0 || self.outbound_buffer == 0 {
            return Err(ValidationError::InvalidBufferSize);
        }
        Ok(())
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            default_page_limit: default_page_limit(),
            max_page_limit: default_max_page_limit(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_channel_capacity() -> usize {
    128
}

fn default_page_limit() -> u32 {
    20
}

fn default_max_page_limit() -> u32 {
    100
}

fn default_outbound_buffer() -> usize {
    64
}
