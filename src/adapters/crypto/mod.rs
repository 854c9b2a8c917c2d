//! Cryptographic adapters.

mod aes_credential_codec;

pub use aes_credential_codec::AesGcmCredentialCodec;
