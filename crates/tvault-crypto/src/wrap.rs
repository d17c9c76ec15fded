//! Address-bound key wrapping
//!
//! A recipient's wallet address exposes no usable public key, so the wrap
//! derives one from the address itself:
//!
//! ```text
//! addressKey = SHA-256("wrap-v2:" || lowercase(address))        (public)
//! E          = X25519 public value of a fresh ephemeral keypair  (public)
//! K          = HKDF-SHA256(ikm = SHA-256(E || addressKey), salt = random 32, info = "tvault-wrap-v2")
//! wrapped    = salt || AES-256-GCM(K, nonce, key)
//! ```
//!
//! # Trust model
//!
//! Both `addressKey` and `E` are public, so anyone holding a [`WrappedKey`]
//! can recompute `K`. The wrap labels a key with its recipient; it does not
//! keep the key confidential from someone who obtains the record. Any
//! confidentiality claim rests on the wallet collaborator's proof of
//! ownership, which gates who is handed the record and the ciphertext.
//! The ephemeral secret is never used after `E` is exported.
//!
//! Records without `version` and `ephemeralPublicKey` are the legacy scheme:
//! `K = HKDF-SHA256(ikm = addressKey, salt, info = "tvault-wrap-v1")`. They
//! can still be unwrapped but are no longer produced.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tracing::debug;
use tvault_core::types::{WrappedKey, WRAP_VERSION_V2};
use tvault_core::{ValidationError, VaultError, VaultResult};
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroizing;

use crate::standard::{aes_open, aes_seal};
use crate::{random, IV_SIZE, KEY_SIZE, TAG_SIZE};

const ADDRESS_KEY_DOMAIN: &str = "wrap-v2:";
const WRAP_INFO_V2: &[u8] = b"tvault-wrap-v2";
const WRAP_INFO_LEGACY: &[u8] = b"tvault-wrap-v1";
const WRAP_SALT_SIZE: usize = 32;
const ADDRESS_HEX_LEN: usize = 40;

/// Check that `address` is `0x` followed by 40 hex digits.
pub fn validate_address(address: &str) -> VaultResult<()> {
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| ValidationError::InvalidAddress(format!("{address:?} lacks 0x prefix")))?;

    if digits.len() != ADDRESS_HEX_LEN || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidAddress(format!(
            "{address:?} is not {ADDRESS_HEX_LEN} hex digits"
        ))
        .into());
    }
    Ok(())
}

/// Domain-separated, non-secret key material derived from an address.
pub fn address_key(address: &str) -> VaultResult<[u8; 32]> {
    validate_address(address)?;
    let mut hasher = Sha256::new();
    hasher.update(ADDRESS_KEY_DOMAIN.as_bytes());
    hasher.update(address.to_lowercase().as_bytes());
    Ok(hasher.finalize().into())
}

/// True if `wrapped` is labelled for `address`.
pub fn is_addressed_to(wrapped: &WrappedKey, address: &str) -> VaultResult<bool> {
    let expected = address_key(address)?;
    let stored = decode_field("recipientPublicKey", &wrapped.recipient_public_key, Some(32))?;
    Ok(stored.as_slice() == expected.as_slice())
}

/// Wrap `key` for the holder of `recipient_address` (scheme v2).
pub fn wrap(key: &[u8], recipient_address: &str) -> VaultResult<WrappedKey> {
    let address_key = address_key(recipient_address)?;
    let salt = random::array::<WRAP_SALT_SIZE>()?;
    let nonce = random::array::<IV_SIZE>()?;

    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    drop(ephemeral);

    let shared = shared_secret_hash(ephemeral_public.as_bytes(), &address_key);
    let wrapping_key = derive_wrapping_key(shared.as_slice(), &salt, WRAP_INFO_V2)?;
    let ciphertext = aes_seal(&wrapping_key, &nonce, key)?;

    let mut encrypted = Vec::with_capacity(WRAP_SALT_SIZE + ciphertext.len());
    encrypted.extend_from_slice(&salt);
    encrypted.extend_from_slice(&ciphertext);

    debug!(version = WRAP_VERSION_V2, "wrapped key for address recipient");
    Ok(WrappedKey {
        encrypted_aes_key: hex::encode(encrypted),
        nonce: hex::encode(nonce),
        recipient_public_key: hex::encode(address_key),
        ephemeral_public_key: Some(hex::encode(ephemeral_public.as_bytes())),
        version: Some(WRAP_VERSION_V2.to_string()),
    })
}

/// Recover the wrapped key. Dispatches between v2 and legacy records by shape.
pub fn unwrap(wrapped: &WrappedKey) -> VaultResult<Zeroizing<Vec<u8>>> {
    let address_key = decode_field("recipientPublicKey", &wrapped.recipient_public_key, Some(32))?;
    let nonce = decode_field("nonce", &wrapped.nonce, Some(IV_SIZE))?;
    let encrypted = decode_field("encryptedAESKey", &wrapped.encrypted_aes_key, None)?;
    if encrypted.len() < WRAP_SALT_SIZE + TAG_SIZE {
        return Err(VaultError::Format(format!(
            "encryptedAESKey too short: {} bytes (minimum {})",
            encrypted.len(),
            WRAP_SALT_SIZE + TAG_SIZE
        )));
    }
    let (salt, ciphertext) = encrypted.split_at(WRAP_SALT_SIZE);

    let wrapping_key = match (wrapped.version.as_deref(), wrapped.ephemeral_public_key.as_deref()) {
        (Some(WRAP_VERSION_V2), Some(ephemeral_hex)) => {
            let ephemeral = decode_field("ephemeralPublicKey", ephemeral_hex, Some(32))?;
            let shared = shared_secret_hash(&ephemeral, &address_key);
            derive_wrapping_key(shared.as_slice(), salt, WRAP_INFO_V2)?
        }
        (None, None) => {
            debug!("unwrapping legacy wrapped key");
            derive_wrapping_key(&address_key, salt, WRAP_INFO_LEGACY)?
        }
        (Some(WRAP_VERSION_V2), None) => {
            return Err(VaultError::Format("v2 wrapped key lacks ephemeralPublicKey".into()));
        }
        (None, Some(_)) => {
            return Err(VaultError::Format(
                "wrapped key has ephemeralPublicKey but no version".into(),
            ));
        }
        (Some(other), _) => {
            return Err(VaultError::Format(format!("unsupported wrap version {other:?}")));
        }
    };

    let plaintext = aes_open(&wrapping_key, &nonce, ciphertext).map_err(|_| {
        VaultError::AuthenticationFailed("key unwrapping failed: wrong key material or corrupted data".into())
    })?;
    Ok(Zeroizing::new(plaintext))
}

/// `SHA-256(E || addressKey)`
fn shared_secret_hash(ephemeral_public: &[u8], address_key: &[u8]) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(ephemeral_public);
    hasher.update(address_key);
    Zeroizing::new(hasher.finalize().into())
}

fn derive_wrapping_key(ikm: &[u8], salt: &[u8], info: &[u8]) -> VaultResult<Zeroizing<[u8; KEY_SIZE]>> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    hkdf.expand(info, &mut *okm)
        .map_err(|e| VaultError::PlatformUnavailable(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}

pub(crate) fn decode_field(name: &str, value: &str, expected_len: Option<usize>) -> VaultResult<Vec<u8>> {
    let bytes = hex::decode(value).map_err(|e| VaultError::Format(format!("{name}: invalid hex: {e}")))?;
    match expected_len {
        Some(len) if bytes.len() != len => Err(VaultError::Format(format!(
            "{name}: expected {len} bytes, got {}",
            bytes.len()
        ))),
        _ => Ok(bytes),
    }
}
