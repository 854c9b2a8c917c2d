//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `NOTIFY` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use agency_notify::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod features;
mod handshake;
mod notifications;
mod redis;
mod server;

pub use database::{DatabaseConfig, MEMORY_DATABASE_URL};
pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use handshake::HandshakeConfig;
pub use notifications::NotificationsConfig;
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

use crate::application::DispatchConfig;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (bind address, environment, WebSocket path)
    #[serde(default)]
    pub server: ServerConfig,

    /// Notification storage (PostgreSQL or `memory://`)
    pub database: DatabaseConfig,

    /// Cross-instance relay; disabled without a URL
    #[serde(default)]
    pub redis: RedisConfig,

    /// Handshake credential decryption
    pub handshake: HandshakeConfig,

    /// Buffers and paging limits
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Feature flags
    #[serde(default)]
    pub features: FeatureFlags,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `NOTIFY` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `NOTIFY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `NOTIFY__HANDSHAKE__ENCRYPTION_KEY=...` -> `handshake.encryption_key = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or values
    /// cannot be parsed into the expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("NOTIFY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.handshake.validate()?;
        self.notifications.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }

    /// Settings the event dispatcher runs with.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            default_page_limit: self.notifications.default_page_limit,
            max_page_limit: self.notifications.max_page_limit,
            strict_authorization: self.features.strict_event_authorization,
        }
    }
}
