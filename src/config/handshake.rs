//! Handshake configuration

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use super::error::ValidationError;

/// Handshake credential settings
#[derive(Debug, Clone, Deserialize)]
pub struct HandshakeConfig {
    /// Base64-encoded 256-bit key shared with the credential issuer
    pub encryption_key: Secret<String>,
}

impl HandshakeConfig {
    /// Validate handshake configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let key = self.encryption_key.expose_secret().trim();
        if key.is_empty() {
            return Err(ValidationError::MissingRequired("HANDSHAKE__ENCRYPTION_KEY"));
        }
        match STANDARD.decode(key) {
            Ok(bytes) if bytes.len() == 32 => Ok(()),
            _ => Err(ValidationError::InvalidEncryptionKey),
        }
    }
}
