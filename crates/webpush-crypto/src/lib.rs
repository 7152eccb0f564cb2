//! Web Push cryptography: P-256 ECDH, RFC 8291 key derivation,
//! RFC 8188 aes128gcm records, RFC 8292 VAPID signing.

pub mod aes128gcm;
pub mod key_derive;
pub mod keys;
pub mod vapid;

pub use aes128gcm::{decrypt, encrypt, encrypt_with, frame, open, parse_header, seal, RecordHeader};
pub use key_derive::{derive, derive_as_receiver, DerivedKeys};
pub use keys::{encode_public_key, generate_salt, parse_public_key, KeyPair, PublicKey};
pub use vapid::{audience_for, VapidClaims, VapidHeaderStyle, VapidHeaders, VapidSigner, VapidToken};

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid auth secret length: expected 16 bytes, got {0}")]
    InvalidAuthSecret(usize),

    #[error("message too large for a single record: {len} bytes (max {max})")]
    MessageTooLarge { len: usize, max: usize },

    #[error("AEAD error: {0}")]
    Crypto(String),

    #[error("JWT signing error: {0}")]
    Signing(String),

    #[error("randomness unavailable: {0}")]
    Randomness(String),

    #[error("invalid push endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("VAPID token lifetime must be between 1s and 24h, got {0}s")]
    InvalidTokenTtl(u64),

    #[error("invalid encrypted record: {0}")]
    InvalidRecord(String),
}
