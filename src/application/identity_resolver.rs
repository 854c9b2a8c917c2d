//! Session identity resolution at connection time.
//!
//! The handshake credential decrypts to JSON of the form
//! `{"_id": "...", "role": "0".."3", ...}`. Extra fields are ignored.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::foundation::{Identity, Role, UserId};
use crate::ports::{CredentialDecoder, CredentialError};

/// Why a handshake was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("no credential supplied")]
    MissingCredential,

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("credential payload is not valid JSON: {0}")]
    InvalidPayload(String),

    #[error("credential payload has no identity id")]
    MissingId,

    #[error("credential payload has no valid role: {0}")]
    InvalidRole(String),
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    role: Option<Value>,
}

/// Resolves handshake credentials into identities.
#[derive(Clone)]
pub struct IdentityResolver {
    decoder: Arc<dyn CredentialDecoder>,
}

impl IdentityResolver {
    pub fn new(decoder: Arc<dyn CredentialDecoder>) -> Self {
        Self { decoder }
    }

    pub fn resolve(&self, credential: Option<&str>) -> Result<Identity, HandshakeError> {
        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(HandshakeError::MissingCredential)?;

        let plaintext = self.decoder.decode(credential)?;
        let claims: Claims = serde_json::from_str(&plaintext)
            .map_err(|e| HandshakeError::InvalidPayload(e.to_string()))?;

        let id = claims
            .id
            .and_then(|id| UserId::new(id).ok())
            .ok_or(HandshakeError::MissingId)?;

        let role = match claims.role {
            None | Some(Value::Null) => {
                return Err(HandshakeError::InvalidRole("missing".to_string()))
            }
            Some(raw) => serde_json::from_value::<Role>(raw.clone())
                .map_err(|_| HandshakeError::InvalidRole(raw.to_string()))?,
        };

        Ok(Identity::new(id, role))
    }
}
