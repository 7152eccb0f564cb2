//! RFC 8188 "aes128gcm" content encoding, single record only.
//!
//! ```text
//! +-----------+--------+-----------+-------------------+---------------+
//! | salt (16) | rs (4) | idlen (1) | keyid (idlen=65)  | ciphertext    |
//! +-----------+--------+-----------+-------------------+---------------+
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::key_derive::{derive, derive_as_receiver, CEK_LEN, NONCE_LEN};
use crate::keys::{
    encode_public_key, generate_salt, parse_public_key, KeyPair, PublicKey, PUBLIC_KEY_LEN,
    SALT_LEN,
};
use crate::CryptoError;

/// Declared record size for every message we produce.
pub const RECORD_SIZE: usize = 4096;

/// Length of the `keyid` field: an uncompressed P-256 point.
pub const KEYID_LEN: u8 = PUBLIC_KEY_LEN as u8;

/// `salt || rs || idlen || keyid`.
pub const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;

/// AES-GCM authentication tag.
pub const TAG_LEN: usize = 16;

/// Delimiter marking the last (and only) record.
pub const PADDING_DELIMITER: u8 = 0x02;

/// Largest plaintext that still fits in one `RECORD_SIZE` message.
pub const MAX_PLAINTEXT_LEN: usize = RECORD_SIZE - HEADER_LEN - 1 - TAG_LEN;

const MAX_CIPHERTEXT_LEN: usize = MAX_PLAINTEXT_LEN + 1 + TAG_LEN;

/// Parsed aes128gcm header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub salt: [u8; SALT_LEN],
    pub record_size: u32,
    pub keyid: Vec<u8>,
}

impl RecordHeader {
    /// Encoded length of this header.
    pub fn encoded_len(&self) -> usize {
        SALT_LEN + 4 + 1 + self.keyid.len()
    }
}

/// Seal a plaintext into a single final record.
///
/// Appends the `0x02` delimiter (no further padding) and encrypts with
/// AES-128-GCM, empty AAD. The 16-byte tag is appended to the output.
pub fn seal(plaintext: &[u8], cek: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if plaintext.len() > MAX_PLAINTEXT_LEN {
        return Err(CryptoError::MessageTooLarge {
            len: plaintext.len(),
            max: MAX_PLAINTEXT_LEN,
        });
    }
    let cipher = cipher_for(cek, nonce)?;

    let mut padded = Vec::with_capacity(plaintext.len() + 1 + TAG_LEN);
    padded.extend_from_slice(plaintext);
    padded.push(PADDING_DELIMITER);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(nonce), padded.as_slice())
        .map_err(|e| CryptoError::Crypto(format!("AES-GCM seal: {e}")))?;
    trace!("sealed {} plaintext bytes", plaintext.len());
    Ok(ciphertext)
}

/// Decrypt a single final record and strip its padding.
pub fn open(ciphertext: &[u8], cek: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < TAG_LEN + 1 {
        return Err(CryptoError::InvalidRecord(format!(
            "record of {} bytes is shorter than tag and delimiter",
            ciphertext.len()
        )));
    }
    let cipher = cipher_for(cek, nonce)?;
    let mut padded = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::InvalidRecord("authentication tag mismatch".into()))?;

    // Padding is `delimiter || 0x00*`; the delimiter is the last non-zero byte.
    let Some(end) = padded.iter().rposition(|&b| b != 0) else {
        return Err(CryptoError::InvalidRecord("missing padding delimiter".into()));
    };
    if padded[end] != PADDING_DELIMITER {
        return Err(CryptoError::InvalidRecord(format!(
            "expected final-record delimiter 0x02, got 0x{:02X}",
            padded[end]
        )));
    }
    padded.truncate(end);
    Ok(padded)
}

fn cipher_for(cek: &[u8], nonce: &[u8]) -> Result<Aes128Gcm, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::Crypto(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            nonce.len()
        )));
    }
    Aes128Gcm::new_from_slice(cek).map_err(|_| {
        CryptoError::Crypto(format!("key must be {CEK_LEN} bytes, got {}", cek.len()))
    })
}

/// Prefix a sealed record with the aes128gcm header.
///
/// The declared record size is `max(4096, len(ciphertext))`.
pub fn frame(
    salt: &[u8; SALT_LEN],
    sender_public_key: &PublicKey,
    ciphertext: &[u8],
) -> Result<Bytes, CryptoError> {
    if ciphertext.len() > MAX_CIPHERTEXT_LEN {
        return Err(CryptoError::MessageTooLarge {
            len: ciphertext.len().saturating_sub(1 + TAG_LEN),
            max: MAX_PLAINTEXT_LEN,
        });
    }
    let record_size = RECORD_SIZE.max(ciphertext.len()) as u32;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + ciphertext.len());
    buf.put_slice(salt);
    buf.put_u32(record_size);
    buf.put_u8(KEYID_LEN);
    buf.put_slice(&encode_public_key(sender_public_key));
    buf.put_slice(ciphertext);
    Ok(buf.freeze())
}

/// Read the aes128gcm header from the front of a message body.
pub fn parse_header(body: &[u8]) -> Result<RecordHeader, CryptoError> {
    let mut buf = body;
    if buf.remaining() < SALT_LEN + 4 + 1 {
        return Err(CryptoError::InvalidRecord(format!(
            "header needs at least {} bytes, got {}",
            SALT_LEN + 5,
            buf.remaining()
        )));
    }
    let mut salt = [0u8; SALT_LEN];
    buf.copy_to_slice(&mut salt);
    let record_size = buf.get_u32();
    let idlen = buf.get_u8() as usize;
    if buf.remaining() < idlen {
        return Err(CryptoError::InvalidRecord(format!(
            "keyid needs {idlen} bytes, got {}",
            buf.remaining()
        )));
    }
    let keyid = buf[..idlen].to_vec();
    Ok(RecordHeader {
        salt,
        record_size,
        keyid,
    })
}

/// Encrypt a push message for a subscriber.
///
/// A fresh ephemeral key pair and salt are drawn for every call.
pub fn encrypt(
    subscriber_public_key: &PublicKey,
    auth_secret: &[u8],
    message: &[u8],
) -> Result<Bytes, CryptoError> {
    let sender = KeyPair::generate()?;
    let salt = generate_salt()?;
    encrypt_with(subscriber_public_key, auth_secret, &sender, &salt, message)
}

/// Encrypt with a caller-supplied sender key pair and salt.
///
/// Deterministic; never reuse `sender`/`salt` across messages.
pub fn encrypt_with(
    subscriber_public_key: &PublicKey,
    auth_secret: &[u8],
    sender: &KeyPair,
    salt: &[u8; SALT_LEN],
    message: &[u8],
) -> Result<Bytes, CryptoError> {
    let keys = derive(subscriber_public_key, auth_secret, sender, salt)?;
    let ciphertext = seal(message, &keys.cek, &keys.nonce)?;
    let body = frame(&keys.salt, &sender.public_key(), &ciphertext)?;
    debug!(
        "encrypted push message: {} plaintext bytes, {} body bytes",
        message.len(),
        body.len()
    );
    Ok(body)
}

/// Decrypt a message body as the subscriber.
pub fn decrypt(body: &[u8], receiver: &KeyPair, auth_secret: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let header = parse_header(body)?;
    let sender_public_key = parse_public_key(&header.keyid)?;
    let ciphertext = &body[header.encoded_len()..];
    if ciphertext.len() > header.record_size as usize {
        return Err(CryptoError::InvalidRecord(format!(
            "{} ciphertext bytes exceed record size {}; multiple records are not supported",
            ciphertext.len(),
            header.record_size
        )));
    }
    let keys = derive_as_receiver(&sender_public_key, auth_secret, receiver, &header.salt)?;
    open(ciphertext, &keys.cek, &keys.nonce)
}
