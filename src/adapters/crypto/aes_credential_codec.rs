//! AES-256-GCM handshake credential codec.
//!
//! ## Credential Format
//!
//! base64 of `[nonce (12 bytes)][ciphertext][tag (16 bytes)]`. Standard and
//! URL-safe unpadded alphabets are both accepted, since query strings may
//! carry either. The nonce is random per credential.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::Rng;
use secrecy::{ExposeSecret, Secret};

use crate::ports::{CredentialDecoder, CredentialError};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

pub struct AesGcmCredentialCodec {
    cipher: Aes256Gcm,
}

impl AesGcmCredentialCodec {
    /// Create a codec from a base64-encoded 256-bit key.
    pub fn new(key_base64: &Secret<String>) -> Result<Self, CredentialError> {
        let key_bytes = STANDARD
            .decode(key_base64.expose_secret().trim())
            .map_err(|e| CredentialError::InvalidKey(format!("not base64: {}", e)))?;

        if key_bytes.len() != 32 {
            return Err(CredentialError::InvalidKey(format!(
                "key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }

        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Generate a random base64 key suitable for [`AesGcmCredentialCodec::new`].
    pub fn generate_key() -> String {
        let key_bytes: [u8; 32] = rand::thread_rng().gen();
        STANDARD.encode(key_bytes)
    }

    /// Mint a credential for `plaintext`, URL-safe so it can go straight
    /// into a query string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CredentialError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::thread_rng().gen();
        let ciphertext = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload::from(plaintext.as_bytes()),
            )
            .map_err(|_| CredentialError::Decryption)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    fn decode_base64(credential: &str) -> Result<Vec<u8>, CredentialError> {
        // Form decoding turns '+' into ' '.
        let credential = credential.trim().replace(' ', "+");
        STANDARD
            .decode(&credential)
            .or_else(|_| URL_SAFE_NO_PAD.decode(&credential))
            .map_err(|_| CredentialError::Encoding)
    }
}

impl CredentialDecoder for AesGcmCredentialCodec {
    fn decode(&self, credential: &str) -> Result<String, CredentialError> {
        let sealed = Self::decode_base64(credential)?;
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return Err(CredentialError::Truncated);
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), Payload::from(ciphertext))
            .map_err(|_| CredentialError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| CredentialError::NotUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn codec() -> AesGcmCredentialCodec {
        AesGcmCredentialCodec::new(&Secret::new(AesGcmCredentialCodec::generate_key())).unwrap()
    }

    #[test]
    fn decodes_what_it_encrypts() {
        let codec = codec();
        let credential = codec.encrypt(r#"{"_id":"S1","role":"3"}"#).unwrap();
        assert_eq!(codec.decode(&credential).unwrap(), r#"{"_id":"S1","role":"3"}"#);
    }

    #[test]
    fn accepts_standard_alphabet_mangled_by_form_decoding() {
        let codec = codec();
        let url_safe = codec.encrypt("payload").unwrap();
        let raw = URL_SAFE_NO_PAD.decode(&url_safe).unwrap();
        let standard = STANDARD.encode(raw).replace('+', " ");

        assert_eq!(codec.decode(&standard).unwrap(), "payload");
    }

    #[test]
    fn same_plaintext_yields_different_credentials() {
        let codec = codec();
        assert_ne!(codec.encrypt("x").unwrap(), codec.encrypt("x").unwrap());
    }

    #[test]
    fn rejects_key_of_wrong_length() {
        let short = Secret::new(STANDARD.encode("too_short"));
        assert!(matches!(
            AesGcmCredentialCodec::new(&short),
            Err(CredentialError::InvalidKey(_))
        ));
    }

    #[test]
    fn rejects_garbage_and_short_input() {
        let codec = codec();
        assert_eq!(codec.decode("%%%"), Err(CredentialError::Encoding));
        assert_eq!(
            codec.decode(&URL_SAFE_NO_PAD.encode([0u8; 10])),
            Err(CredentialError::Truncated)
        );
    }

    #[test]
    fn rejects_credential_from_another_key() {
        let credential = codec().encrypt("payload").unwrap();
        assert_eq!(codec().decode(&credential), Err(CredentialError::Decryption));
    }

    #[test]
    fn rejects_tampered_credential() {
        let codec = codec();
        let mut raw = URL_SAFE_NO_PAD
            .decode(codec.encrypt("payload").unwrap())
            .unwrap();
        raw[NONCE_LEN + 1] ^= 0xFF;

        assert_eq!(
            codec.decode(&URL_SAFE_NO_PAD.encode(raw)),
            Err(CredentialError::Decryption)
        );
    }

    proptest! {
        #[test]
        fn any_plaintext_survives(plaintext in "\\PC{0,200}") {
            let codec = codec();
            let credential = codec.encrypt(&plaintext).unwrap();
            prop_assert_eq!(codec.decode(&credential).unwrap(), plaintext);
        }
    }
}
