//! RFC 8291 content-encryption key and nonce derivation.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::keys::{encode_public_key, KeyPair, PublicKey, PUBLIC_KEY_LEN, SALT_LEN};
use crate::CryptoError;

/// Required length of the subscriber auth secret.
pub const AUTH_SECRET_LEN: usize = 16;

/// Length of the AES-128-GCM content-encryption key.
pub const CEK_LEN: usize = 16;

/// Length of the AES-GCM nonce.
pub const NONCE_LEN: usize = 12;

const KEY_INFO_PREFIX: &[u8] = b"WebPush: info\x00";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\x00";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\x00";

/// Keys for a single aes128gcm record.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    #[zeroize(skip)]
    pub salt: [u8; SALT_LEN],
    pub cek: [u8; CEK_LEN],
    pub nonce: [u8; NONCE_LEN],
}

/// Derive the content-encryption key and nonce for one push message.
///
/// ```text
/// ecdh_secret = X(sender_private * subscriber_public)
/// key_info    = "WebPush: info" || 0x00 || subscriber_public || sender_public
/// IKM         = HKDF-SHA256(salt=auth_secret, ikm=ecdh_secret, info=key_info, L=32)
/// CEK         = HKDF-SHA256(salt, IKM, "Content-Encoding: aes128gcm" || 0x00, L=16)
/// nonce       = HKDF-SHA256(salt, IKM, "Content-Encoding: nonce" || 0x00, L=12)
/// ```
///
/// Every output fits in one HMAC block, so `expand` only ever emits the
/// `0x01` counter byte.
pub fn derive(
    subscriber_public_key: &PublicKey,
    auth_secret: &[u8],
    sender: &KeyPair,
    salt: &[u8; SALT_LEN],
) -> Result<DerivedKeys, CryptoError> {
    if auth_secret.len() != AUTH_SECRET_LEN {
        return Err(CryptoError::InvalidAuthSecret(auth_secret.len()));
    }
    let ecdh_secret = sender.shared_secret(subscriber_public_key);
    derive_keys(
        &ecdh_secret[..],
        auth_secret,
        &encode_public_key(subscriber_public_key),
        &sender.public_key_bytes(),
        salt,
    )
}

/// Receiver-side counterpart of [`derive`]: the subscriber holds the
/// private key and learns the sender's public key from the record header.
pub fn derive_as_receiver(
    sender_public_key: &PublicKey,
    auth_secret: &[u8],
    receiver: &KeyPair,
    salt: &[u8; SALT_LEN],
) -> Result<DerivedKeys, CryptoError> {
    if auth_secret.len() != AUTH_SECRET_LEN {
        return Err(CryptoError::InvalidAuthSecret(auth_secret.len()));
    }
    let ecdh_secret = receiver.shared_secret(sender_public_key);
    derive_keys(
        &ecdh_secret[..],
        auth_secret,
        &receiver.public_key_bytes(),
        &encode_public_key(sender_public_key),
        salt,
    )
}

fn derive_keys(
    ecdh_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8; PUBLIC_KEY_LEN],
    as_public: &[u8; PUBLIC_KEY_LEN],
    salt: &[u8; SALT_LEN],
) -> Result<DerivedKeys, CryptoError> {
    let mut key_info = Vec::with_capacity(KEY_INFO_PREFIX.len() + 2 * PUBLIC_KEY_LEN);
    key_info.extend_from_slice(KEY_INFO_PREFIX);
    key_info.extend_from_slice(ua_public);
    key_info.extend_from_slice(as_public);

    let mut ikm = [0u8; 32];
    Hkdf::<Sha256>::new(Some(auth_secret), ecdh_secret)
        .expand(&key_info, &mut ikm)
        .map_err(|e| CryptoError::Crypto(format!("HKDF auth expand: {e}")))?;

    let hk = Hkdf::<Sha256>::new(Some(&salt[..]), &ikm);
    ikm.zeroize();

    let mut keys = DerivedKeys {
        salt: *salt,
        cek: [0u8; CEK_LEN],
        nonce: [0u8; NONCE_LEN],
    };
    hk.expand(CEK_INFO, &mut keys.cek)
        .map_err(|e| CryptoError::Crypto(format!("HKDF CEK expand: {e}")))?;
    hk.expand(NONCE_INFO, &mut keys.nonce)
        .map_err(|e| CryptoError::Crypto(format!("HKDF nonce expand: {e}")))?;

    Ok(keys)
}
