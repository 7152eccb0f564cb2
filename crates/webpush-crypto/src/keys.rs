//! P-256 key pairs and SEC1 point encoding.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::CryptoError;

pub use p256::PublicKey;

/// Length of an uncompressed SEC1 point: `0x04 || X || Y`.
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of a P-256 private scalar.
pub const PRIVATE_KEY_LEN: usize = 32;

/// Length of the per-message salt.
pub const SALT_LEN: usize = 16;

const UNCOMPRESSED_TAG: u8 = 0x04;

/// P-256 key pair, used both as the ephemeral message key and the
/// long-term VAPID signing key.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
}

impl KeyPair {
    /// Generate a new random P-256 key pair from the OS CSPRNG.
    ///
    /// A CSPRNG failure is returned as [`CryptoError::Randomness`] instead
    /// of panicking.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        loop {
            OsRng
                .try_fill_bytes(&mut bytes[..])
                .map_err(|e| CryptoError::Randomness(e.to_string()))?;
            // Zero or >= n: draw again.
            if let Ok(secret) = SecretKey::from_slice(&bytes[..]) {
                return Ok(Self { secret });
            }
        }
    }

    /// Load a key pair from a raw 32-byte big-endian scalar.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != PRIVATE_KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "private key must be {PRIVATE_KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidKey("private scalar out of range".into()))?;
        Ok(Self { secret })
    }

    /// Load a key pair from a base64url private scalar (padding optional).
    pub fn from_base64url(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(encoded.trim_end_matches('='))
                .map_err(|e| CryptoError::InvalidKey(format!("private key base64: {e}")))?,
        );
        Self::from_private_bytes(&bytes)
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    /// Uncompressed SEC1 encoding of the public key.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        encode_public_key(&self.public_key())
    }

    /// Raw private scalar, zeroized when dropped.
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; PRIVATE_KEY_LEN]> {
        let mut out = Zeroizing::new([0u8; PRIVATE_KEY_LEN]);
        out.copy_from_slice(self.secret.to_bytes().as_slice());
        out
    }

    /// Compute the ECDH shared secret with a peer's public key.
    ///
    /// Returns the 32-byte X coordinate of `d * Q`.
    pub fn shared_secret(&self, peer_public: &PublicKey) -> Zeroizing<[u8; 32]> {
        let shared =
            p256::ecdh::diffie_hellman(self.secret.to_nonzero_scalar(), peer_public.as_affine());
        let mut result = Zeroizing::new([0u8; 32]);
        result.copy_from_slice(shared.raw_secret_bytes().as_slice());
        result
    }

    /// Get an ECDSA signing key (for VAPID JWT signing).
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from(self.secret.clone())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &URL_SAFE_NO_PAD.encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Parse an uncompressed SEC1 P-256 point.
///
/// Only the 65-byte `0x04 || X || Y` form is accepted; the point must lie
/// on the curve.
pub fn parse_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if bytes.len() != PUBLIC_KEY_LEN {
        return Err(CryptoError::InvalidKey(format!(
            "public key must be {PUBLIC_KEY_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[0] != UNCOMPRESSED_TAG {
        return Err(CryptoError::InvalidKey(format!(
            "public key must be uncompressed (0x04), got tag 0x{:02X}",
            bytes[0]
        )));
    }
    PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| CryptoError::InvalidKey("point is not on P-256".into()))
}

/// Encode a public key as an uncompressed SEC1 point.
pub fn encode_public_key(key: &PublicKey) -> [u8; PUBLIC_KEY_LEN] {
    let point = key.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_LEN];
    out.copy_from_slice(point.as_bytes());
    out
}

/// Draw a fresh 16-byte salt from the OS CSPRNG.
pub fn generate_salt() -> Result<[u8; SALT_LEN], CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::Randomness(e.to_string()))?;
    Ok(salt)
}
