//! Assembly of the HTTP request that delivers one push message.
//!
//! Nothing here performs I/O; the caller hands the result to its HTTP
//! client of choice.

use bytes::Bytes;
use tracing::debug;
use webpush_crypto::VapidSigner;

use crate::error::ProtoError;
use crate::subscription::Subscription;

/// Default `TTL` header: how long the push service may hold the message.
pub const DEFAULT_TTL: u32 = 24 * 60 * 60;

/// A fully assembled push request.
#[derive(Debug, Clone)]
pub struct PushRequest {
    pub method: &'static str,
    pub endpoint: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Bytes,
}

impl PushRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builds a [`PushRequest`] for a subscription.
#[derive(Debug, Clone)]
pub struct PushRequestBuilder<'a> {
    subscription: &'a Subscription,
    ttl: u32,
    vapid: Option<&'a VapidSigner>,
}

impl<'a> PushRequestBuilder<'a> {
    pub fn new(subscription: &'a Subscription) -> Self {
        Self {
            subscription,
            ttl: DEFAULT_TTL,
            vapid: None,
        }
    }

    /// Seconds the push service should retain an undelivered message.
    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Attach VAPID authentication using the signer's header style.
    pub fn vapid(mut self, signer: &'a VapidSigner) -> Self {
        self.vapid = Some(signer);
        self
    }

    /// Encrypt `message` and assemble the request.
    pub fn build(&self, message: &[u8]) -> Result<PushRequest, ProtoError> {
        let body = self.subscription.encrypt(message)?;

        let mut headers = vec![
            ("Content-Encoding", "aes128gcm".to_string()),
            ("Content-Type", "application/octet-stream".to_string()),
            ("Content-Length", body.len().to_string()),
            ("TTL", self.ttl.to_string()),
        ];
        if let Some(signer) = self.vapid {
            headers.extend(signer.headers_for(self.subscription.endpoint())?.to_pairs());
        }

        debug!(
            "built push request for {}: {} body bytes, vapid={}",
            self.subscription.endpoint(),
            body.len(),
            self.vapid.is_some()
        );

        Ok(PushRequest {
            method: "POST",
            endpoint: self.subscription.endpoint().to_string(),
            headers,
            body,
        })
    }
}
