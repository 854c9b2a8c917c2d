//! Redis configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Redis configuration. Without a URL the relay between instances is off.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: Option<String>,
}

impl RedisConfig {
    /// URL of the relay backbone, if configured.
    pub fn relay_url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.relay_url() {
            Some(url) if !url.starts_with("redis://") && !url.starts_with("rediss://") => {
                Err(ValidationError::InvalidRedisUrl)
            }
            _ => Ok(()),
        }
    }
}
