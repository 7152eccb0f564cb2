//! VAPID (RFC 8292) ES256 token signing and header assembly.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::Signature;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::keys::{KeyPair, PUBLIC_KEY_LEN};
use crate::CryptoError;

/// Token lifetime used unless the signer is configured otherwise.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Push services reject tokens that expire more than 24 hours out.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Serialize)]
struct JwtHeader {
    typ: &'static str,
    alg: &'static str,
}

const ES256_HEADER: JwtHeader = JwtHeader {
    typ: "JWT",
    alg: "ES256",
};

/// JWT claims carried by a VAPID token.
///
/// Serialised in field order: `aud`, `exp`, then `sub` when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VapidClaims {
    /// Origin of the push service (`scheme://host[:port]`).
    pub aud: String,
    /// Expiry as a unix timestamp.
    pub exp: u64,
    /// Contact URI for the application server (`mailto:` or `https:`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

/// How the token and public key are placed into HTTP headers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VapidHeaderStyle {
    /// `Authorization: vapid t=<jwt>,k=<key>`
    #[default]
    Vapid,
    /// `Authorization: vapid t=<jwt> k=<key>`
    VapidSpaced,
    /// `Authorization: WebPush <jwt>` plus `Crypto-Key: p256ecdsa=<key>`
    /// (draft-ietf-webpush-vapid-01).
    WebPush,
}

/// Header values produced for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VapidHeaders {
    pub authorization: String,
    pub crypto_key: Option<String>,
}

impl VapidHeaders {
    /// Header name/value pairs in the order they should be sent.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("Authorization", self.authorization.clone())];
        if let Some(crypto_key) = &self.crypto_key {
            pairs.push(("Crypto-Key", crypto_key.clone()));
        }
        pairs
    }
}

/// A signed VAPID token and the public key that verifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VapidToken {
    pub jwt: String,
    pub public_key: [u8; PUBLIC_KEY_LEN],
}

impl VapidToken {
    /// base64url (no padding) of the uncompressed signing public key.
    pub fn public_key_base64(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.public_key)
    }

    /// Format the token for the given header style.
    pub fn headers(&self, style: VapidHeaderStyle) -> VapidHeaders {
        let key = self.public_key_base64();
        match style {
            VapidHeaderStyle::Vapid => VapidHeaders {
                authorization: format!("vapid t={},k={key}", self.jwt),
                crypto_key: None,
            },
            VapidHeaderStyle::VapidSpaced => VapidHeaders {
                authorization: format!("vapid t={} k={key}", self.jwt),
                crypto_key: None,
            },
            VapidHeaderStyle::WebPush => VapidHeaders {
                authorization: format!("WebPush {}", self.jwt),
                crypto_key: Some(format!("p256ecdsa={key}")),
            },
        }
    }
}

/// Signs VAPID tokens with a long-term P-256 application server key.
#[derive(Debug, Clone)]
pub struct VapidSigner {
    keypair: KeyPair,
    style: VapidHeaderStyle,
    subject: Option<String>,
    token_ttl: Duration,
}

impl VapidSigner {
    pub fn new(keypair: KeyPair) -> Self {
        Self {
            keypair,
            style: VapidHeaderStyle::default(),
            subject: None,
            token_ttl: DEFAULT_TOKEN_TTL,
        }
    }

    pub fn with_header_style(mut self, style: VapidHeaderStyle) -> Self {
        self.style = style;
        self
    }

    /// Set the `sub` claim, e.g. `mailto:ops@example.org`.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the token lifetime. Must be non-zero and at most 24 hours.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Result<Self, CryptoError> {
        if ttl.is_zero() || ttl > MAX_TOKEN_TTL {
            return Err(CryptoError::InvalidTokenTtl(ttl.as_secs()));
        }
        self.token_ttl = ttl;
        Ok(self)
    }

    pub fn header_style(&self) -> VapidHeaderStyle {
        self.style
    }

    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.keypair.public_key_bytes()
    }

    /// Sign a token for the push service that owns `endpoint`.
    ///
    /// Only the origin of `endpoint` ends up in the `aud` claim.
    pub fn sign(&self, endpoint: &str) -> Result<VapidToken, CryptoError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| CryptoError::Signing(format!("system clock before unix epoch: {e}")))?;
        self.sign_at(endpoint, now.as_secs())
    }

    /// Sign a token as if the current unix time were `now`.
    pub fn sign_at(&self, endpoint: &str, now: u64) -> Result<VapidToken, CryptoError> {
        let claims = VapidClaims {
            aud: audience_for(endpoint)?,
            exp: now.checked_add(self.token_ttl.as_secs()).ok_or_else(|| {
                CryptoError::Signing(format!("token expiry overflows at now={now}"))
            })?,
            sub: self.subject.clone(),
        };

        let header_b64 = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&ES256_HEADER).map_err(|e| CryptoError::Signing(e.to_string()))?,
        );
        let claims_b64 = URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&claims).map_err(|e| CryptoError::Signing(e.to_string()))?);

        let message = format!("{header_b64}.{claims_b64}");

        // ES256: SHA-256 digest, RFC 6979 nonce, fixed-width 32-byte r || 32-byte s.
        let signature: Signature = self
            .keypair
            .signing_key()
            .try_sign(message.as_bytes())
            .map_err(|e| CryptoError::Signing(e.to_string()))?;
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

        debug!("signed VAPID token for {} (exp {})", claims.aud, claims.exp);

        Ok(VapidToken {
            jwt: format!("{message}.{sig_b64}"),
            public_key: self.keypair.public_key_bytes(),
        })
    }

    /// Sign and format headers in the configured style.
    pub fn headers_for(&self, endpoint: &str) -> Result<VapidHeaders, CryptoError> {
        Ok(self.sign(endpoint)?.headers(self.style))
    }
}

/// The `aud` value for a push endpoint: its `scheme://host[:port]` origin.
pub fn audience_for(endpoint: &str) -> Result<String, CryptoError> {
    let url = Url::parse(endpoint).map_err(|e| CryptoError::InvalidEndpoint(e.to_string()))?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(CryptoError::InvalidEndpoint(format!(
            "unsupported scheme {:?}",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(CryptoError::InvalidEndpoint(format!(
            "{endpoint:?} has no host"
        )));
    }
    Ok(url.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::signature::Verifier;
    use p256::ecdsa::VerifyingKey;

    fn decode_part<T: serde::de::DeserializeOwned>(jwt: &str, index: usize) -> T {
        let part = jwt.split('.').nth(index).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap()
    }

    fn unix_now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn token_has_three_parts() {
        let signer = VapidSigner::new(KeyPair::generate().unwrap());
        let token = signer.sign("https://example.org").unwrap();
        assert_eq!(token.jwt.split('.').count(), 3);
    }

    #[test]
    fn header_is_es256_jwt() {
        let signer = VapidSigner::new(KeyPair::generate().unwrap());
        let token = signer.sign("https://example.org").unwrap();

        let header_b64 = token.jwt.split('.').next().unwrap();
        assert_eq!(
            URL_SAFE_NO_PAD.decode(header_b64).unwrap(),
            br#"{"typ":"JWT","alg":"ES256"}"#
        );
    }

    #[test]
    fn signature_verifies_with_embedded_key() {
        let signer = VapidSigner::new(KeyPair::generate().unwrap());
        let before = unix_now();
        let token = signer.sign("https://example.org/abc?q=1").unwrap();
        let after = unix_now();

        let (signing_input, sig_b64) = token.jwt.rsplit_once('.').unwrap();
        let sig_bytes = URL_SAFE_NO_PAD.decode(sig_b64).unwrap();
        assert_eq!(sig_bytes.len(), 64);

        let verifying_key = VerifyingKey::from_sec1_bytes(&token.public_key).unwrap();
        let signature = Signature::from_slice(&sig_bytes).unwrap();
        assert!(verifying_key
            .verify(signing_input.as_bytes(), &signature)
            .is_ok());

        let claims: VapidClaims = decode_part(&token.jwt, 1);
        assert_eq!(claims.aud, "https://example.org");
        assert!(claims.exp > before);
        assert!(claims.exp <= after + 3600);
        assert_eq!(claims.sub, None);
    }

    #[test]
    fn claims_field_order_is_stable() {
        let signer = VapidSigner::new(KeyPair::generate().unwrap())
            .with_subject("mailto:ops@example.org");
        let token = signer.sign_at("https://push.example.net/x", 1_000).unwrap();
        let claims_b64 = token.jwt.split('.').nth(1).unwrap();
        assert_eq!(
            URL_SAFE_NO_PAD.decode(claims_b64).unwrap(),
            br#"{"aud":"https://push.example.net","exp":4600,"sub":"mailto:ops@example.org"}"#
        );
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = VapidSigner::new(KeyPair::generate().unwrap());
        let t1 = signer.sign_at("https://example.org", 42).unwrap();
        let t2 = signer.sign_at("https://example.org", 42).unwrap();
        assert_eq!(t1.jwt, t2.jwt);

        let t3 = signer.sign_at("https://example.org", 43).unwrap();
        assert_ne!(t1.jwt, t3.jwt);
    }

    #[test]
    fn expiry_overflow_is_an_error() {
        let signer = VapidSigner::new(KeyPair::generate().unwrap());
        assert!(matches!(
            signer.sign_at("https://example.org", u64::MAX - 10),
            Err(CryptoError::Signing(_))
        ));
        assert!(signer.sign_at("https://example.org", u64::MAX - 3600).is_ok());
    }

    #[test]
    fn token_ttl_bounds() {
        let kp = KeyPair::generate().unwrap();
        assert!(VapidSigner::new(kp.clone())
            .with_token_ttl(MAX_TOKEN_TTL)
            .is_ok());
        assert!(matches!(
            VapidSigner::new(kp.clone()).with_token_ttl(MAX_TOKEN_TTL + Duration::from_secs(1)),
            Err(CryptoError::InvalidTokenTtl(86401))
        ));
        assert!(VapidSigner::new(kp).with_token_ttl(Duration::ZERO).is_err());
    }

    #[test]
    fn custom_ttl_sets_expiry() {
        let signer = VapidSigner::new(KeyPair::generate().unwrap())
            .with_token_ttl(Duration::from_secs(600))
            .unwrap();
        let token = signer.sign_at("https://example.org", 100).unwrap();
        let claims: VapidClaims = decode_part(&token.jwt, 1);
        assert_eq!(claims.exp, 700);
    }

    #[test]
    fn header_styles() {
        let token = VapidToken {
            jwt: "aaa.bbb.ccc".into(),
            public_key: [0x04; 65],
        };
        let key = token.public_key_base64();

        let combined = token.headers(VapidHeaderStyle::Vapid);
        assert_eq!(combined.authorization, format!("vapid t=aaa.bbb.ccc,k={key}"));
        assert_eq!(combined.crypto_key, None);

        let spaced = token.headers(VapidHeaderStyle::VapidSpaced);
        assert_eq!(spaced.authorization, format!("vapid t=aaa.bbb.ccc k={key}"));

        let legacy = token.headers(VapidHeaderStyle::WebPush);
        assert_eq!(legacy.authorization, "WebPush aaa.bbb.ccc");
        assert_eq!(legacy.crypto_key, Some(format!("p256ecdsa={key}")));
        assert_eq!(legacy.to_pairs().len(), 2);
    }

    #[test]
    fn default_style_is_combined() {
        let signer = VapidSigner::new(KeyPair::generate().unwrap());
        assert_eq!(signer.header_style(), VapidHeaderStyle::Vapid);
        let headers = signer.headers_for("https://example.org/push/1").unwrap();
        assert!(headers.authorization.starts_with("vapid t="));
        assert!(headers.authorization.contains(",k="));
    }

    #[test]
    fn header_style_names() {
        #[derive(Deserialize)]
        struct Wrapper {
            style: VapidHeaderStyle,
        }
        let parse = |s: &str| -> VapidHeaderStyle {
            serde_json::from_str::<Wrapper>(&format!(r#"{{"style":"{s}"}}"#))
                .unwrap()
                .style
        };
        assert_eq!(parse("vapid"), VapidHeaderStyle::Vapid);
        assert_eq!(parse("vapid-spaced"), VapidHeaderStyle::VapidSpaced);
        assert_eq!(parse("web-push"), VapidHeaderStyle::WebPush);
    }

    #[test]
    fn audience_is_origin_only() {
        assert_eq!(
            audience_for("https://example.org/abc").unwrap(),
            "https://example.org"
        );
        assert_eq!(
            audience_for("https://fcm.googleapis.com/fcm/send/abc?x=1#frag").unwrap(),
            "https://fcm.googleapis.com"
        );
        assert_eq!(
            audience_for("https://push.example.net:8443/p").unwrap(),
            "https://push.example.net:8443"
        );
        assert_eq!(
            audience_for("https://push.example.net:443/p").unwrap(),
            "https://push.example.net"
        );
    }

    #[test]
    fn audience_rejects_bad_endpoints() {
        for endpoint in ["not a url", "mailto:ops@example.org", "data:text/plain,hi"] {
            assert!(
                matches!(audience_for(endpoint), Err(CryptoError::InvalidEndpoint(_))),
                "{endpoint}"
            );
        }
    }
}
