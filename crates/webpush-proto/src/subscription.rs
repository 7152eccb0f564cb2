//! Push subscriptions as handed out by the browser Push API.

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use bytes::Bytes;
use serde::Deserialize;
use webpush_crypto::key_derive::AUTH_SECRET_LEN;
use webpush_crypto::{parse_public_key, CryptoError, PublicKey};

use crate::error::ProtoError;

/// A user agent's push subscription: where to send and whom to encrypt for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    endpoint: String,
    auth_secret: [u8; AUTH_SECRET_LEN],
    public_key: PublicKey,
}

/// `PushSubscriptionJSON` from the W3C Push API.
#[derive(Debug, Deserialize)]
struct SubscriptionJson {
    endpoint: String,
    keys: KeysJson,
}

#[derive(Debug, Deserialize)]
struct KeysJson {
    auth: String,
    p256dh: String,
}

impl Subscription {
    /// Build a subscription from raw key material.
    ///
    /// `auth_secret` must be exactly 16 bytes and `p256dh` an uncompressed
    /// P-256 point.
    pub fn new(
        endpoint: impl Into<String>,
        auth_secret: &[u8],
        p256dh: &[u8],
    ) -> Result<Self, ProtoError> {
        let auth_secret: [u8; AUTH_SECRET_LEN] = auth_secret
            .try_into()
            .map_err(|_| CryptoError::InvalidAuthSecret(auth_secret.len()))?;
        let public_key = parse_public_key(p256dh)?;
        Ok(Self {
            endpoint: endpoint.into(),
            auth_secret,
            public_key,
        })
    }

    /// Parse the JSON produced by `PushSubscription.toJSON()`.
    ///
    /// Key values may be padded or unpadded base64url.
    pub fn from_json(json: &str) -> Result<Self, ProtoError> {
        let raw: SubscriptionJson =
            serde_json::from_str(json).map_err(|e| ProtoError::JsonParse(e.to_string()))?;
        let auth = decode_base64url(&raw.keys.auth)
            .map_err(|e| ProtoError::Base64(format!("keys.auth: {e}")))?;
        let p256dh = decode_base64url(&raw.keys.p256dh)
            .map_err(|e| ProtoError::Base64(format!("keys.p256dh: {e}")))?;
        Self::new(raw.endpoint, &auth, &p256dh)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn auth_secret(&self) -> &[u8; AUTH_SECRET_LEN] {
        &self.auth_secret
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Encrypt `message` for this subscriber (fresh key pair and salt).
    pub fn encrypt(&self, message: &[u8]) -> Result<Bytes, ProtoError> {
        Ok(webpush_crypto::encrypt(
            &self.public_key,
            &self.auth_secret,
            message,
        )?)
    }
}

/// Decode base64url (try without padding first, then with padding).
fn decode_base64url(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD
        .decode(input)
        .or_else(|_| URL_SAFE.decode(input))
}
