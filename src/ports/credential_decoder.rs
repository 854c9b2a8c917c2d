//! Credential decoder port.
//!
//! Turns the opaque handshake credential into its plaintext. The key and
//! cipher are owned by the implementation.

use thiserror::Error;

/// Why a credential could not be decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential is not valid base64")]
    Encoding,

    #[error("credential is too short")]
    Truncated,

    #[error("credential failed authentication")]
    Decryption,

    #[error("credential plaintext is not UTF-8")]
    NotUtf8,

    #[error("credential key is invalid: {0}")]
    InvalidKey(String),
}

/// Decodes handshake credentials.
pub trait CredentialDecoder: Send + Sync {
    fn decode(&self, credential: &str) -> Result<String, CredentialError>;
}
