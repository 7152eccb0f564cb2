//! VAPID token inspection (no signature verification).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use webpush_crypto::VapidClaims;

use crate::error::ProtoError;

/// JWT header fields we care about.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtHeader {
    pub typ: Option<String>,
    pub alg: String,
}

/// Token and key extracted from an `Authorization` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationParts {
    pub jwt: String,
    /// `k=` parameter; absent for the `WebPush <jwt>` form, which carries
    /// the key in `Crypto-Key` instead.
    pub public_key: Option<String>,
}

/// Decode a JWT without verifying the signature.
///
/// Returns the parsed header and the raw payload as a `serde_json::Value`.
pub fn decode_jwt_unverified(token: &str) -> Result<(JwtHeader, serde_json::Value), ProtoError> {
    let parts: Vec<&str> = token.splitn(3, '.').collect();
    if parts.len() != 3 {
        return Err(ProtoError::JwtDecode(format!(
            "expected 3 parts, got {}",
            parts.len()
        )));
    }

    let header_bytes = URL_SAFE_NO_PAD
        .decode(parts[0])
        .map_err(|e| ProtoError::JwtDecode(format!("header base64: {e}")))?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|e| ProtoError::JwtDecode(format!("payload base64: {e}")))?;

    let header: JwtHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| ProtoError::JsonParse(format!("JWT header: {e}")))?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes)
        .map_err(|e| ProtoError::JsonParse(format!("JWT payload: {e}")))?;

    Ok((header, payload))
}

/// Decode the claims of an ES256 VAPID token.
pub fn decode_vapid_claims(token: &str) -> Result<VapidClaims, ProtoError> {
    let (header, payload) = decode_jwt_unverified(token)?;
    if header.alg != "ES256" {
        return Err(ProtoError::JwtDecode(format!(
            "expected alg ES256, got {}",
            header.alg
        )));
    }
    serde_json::from_value(payload).map_err(|e| ProtoError::JsonParse(format!("VAPID claims: {e}")))
}

/// Split an `Authorization` header value into token and key.
///
/// Accepts `vapid t=<jwt>,k=<key>`, `vapid t=<jwt> k=<key>` and
/// `WebPush <jwt>`.
pub fn parse_authorization(value: &str) -> Result<AuthorizationParts, ProtoError> {
    let (scheme, params) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| ProtoError::InvalidAuthorization("missing scheme".into()))?;

    if scheme.eq_ignore_ascii_case("webpush") {
        return Ok(AuthorizationParts {
            jwt: params.trim().to_string(),
            public_key: None,
        });
    }
    if !scheme.eq_ignore_ascii_case("vapid") {
        return Err(ProtoError::InvalidAuthorization(format!(
            "unknown scheme {scheme:?}"
        )));
    }

    let mut jwt = None;
    let mut public_key = None;
    for param in params.split([',', ' ']).filter(|p| !p.is_empty()) {
        match param.split_once('=') {
            Some(("t", v)) => jwt = Some(v.to_string()),
            Some(("k", v)) => public_key = Some(v.to_string()),
            _ => {
                return Err(ProtoError::InvalidAuthorization(format!(
                    "unexpected parameter {param:?}"
                )))
            }
        }
    }
    let jwt = jwt.ok_or_else(|| ProtoError::InvalidAuthorization("missing t=".into()))?;
    let public_key = public_key.ok_or_else(|| ProtoError::InvalidAuthorization("missing k=".into()))?;
    Ok(AuthorizationParts {
        jwt,
        public_key: Some(public_key),
    })
}
