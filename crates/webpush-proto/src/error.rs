//! Protocol-level errors.

use thiserror::Error;
use webpush_crypto::CryptoError;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("JSON parse error: {0}")]
    JsonParse(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("JWT decode error: {0}")]
    JwtDecode(String),

    #[error("invalid Authorization header: {0}")]
    InvalidAuthorization(String),
}
