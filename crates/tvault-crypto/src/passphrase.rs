//! Passphrase wrapping for recipients without an address (claim links)
//!
//! `K = PBKDF2-HMAC-SHA256(passphrase, salt16, 100_000)`, then AES-256-GCM
//! under a random 12-byte IV. The salt and IV travel with the ciphertext.

use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::debug;
use tvault_core::types::PassphraseWrappedKey;
use tvault_core::{ValidationError, VaultError, VaultResult};
use zeroize::Zeroizing;

use crate::standard::{aes_open, aes_seal};
use crate::wrap::decode_field;
use crate::{random, IV_SIZE, KEY_SIZE};

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Size of the PBKDF2 salt
pub const SALT_SIZE: usize = 16;

/// Derive a 256-bit wrapping key from a passphrase and salt.
pub fn derive_passphrase_key(
    passphrase: &SecretString,
    salt: &[u8],
    iterations: u32,
) -> VaultResult<Zeroizing<[u8; KEY_SIZE]>> {
    let secret = passphrase.expose_secret();
    if secret.is_empty() {
        return Err(ValidationError::EmptyPassphrase.into());
    }
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt, iterations, &mut *key);
    Ok(key)
}

/// Wrap `key` under `passphrase`.
pub fn wrap_with_passphrase(key: &[u8], passphrase: &SecretString) -> VaultResult<PassphraseWrappedKey> {
    let salt = random::array::<SALT_SIZE>()?;
    let iv = random::array::<IV_SIZE>()?;

    let wrapping_key = derive_passphrase_key(passphrase, &salt, PBKDF2_ITERATIONS)?;
    let ciphertext = aes_seal(&wrapping_key, &iv, key)?;

    debug!(iterations = PBKDF2_ITERATIONS, "wrapped key under passphrase");
    Ok(PassphraseWrappedKey {
        encrypted_key: hex::encode(ciphertext),
        salt: hex::encode(salt),
        iv: hex::encode(iv),
    })
}

/// Recover a passphrase-wrapped key. A wrong passphrase fails with `AuthenticationFailed`.
pub fn unwrap_with_passphrase(
    wrapped: &PassphraseWrappedKey,
    passphrase: &SecretString,
) -> VaultResult<Zeroizing<Vec<u8>>> {
    let salt = decode_field("salt", &wrapped.salt, Some(SALT_SIZE))?;
    let iv = decode_field("iv", &wrapped.iv, Some(IV_SIZE))?;
    let ciphertext = decode_field("encryptedKey", &wrapped.encrypted_key, None)?;

    let wrapping_key = derive_passphrase_key(passphrase, &salt, PBKDF2_ITERATIONS)?;
    let plaintext = aes_open(&wrapping_key, &iv, &ciphertext).map_err(|_| {
        VaultError::AuthenticationFailed("passphrase unwrap failed: wrong passphrase or corrupted data".into())
    })?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;

    fn pass(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_passphrase_roundtrip() {
        let key = generate_key().unwrap();
        let wrapped = wrap_with_passphrase(key.as_bytes(), &pass("correct horse battery staple")).unwrap();

        let unwrapped = unwrap_with_passphrase(&wrapped, &pass("correct horse battery staple")).unwrap();
        assert_eq!(unwrapped.as_slice(), key.as_bytes());
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let key = generate_key().unwrap();
        let wrapped = wrap_with_passphrase(key.as_bytes(), &pass("passphrase-a")).unwrap();

        let result = unwrap_with_passphrase(&wrapped, &pass("passphrase-b"));
        assert!(matches!(result, Err(VaultError::AuthenticationFailed(_))));
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        let key = generate_key().unwrap();
        let result = wrap_with_passphrase(key.as_bytes(), &pass(""));
        assert!(matches!(
            result,
            Err(VaultError::Validation(ValidationError::EmptyPassphrase))
        ));
    }

    #[test]
    fn test_wrapped_shape() {
        let key = generate_key().unwrap();
        let wrapped = wrap_with_passphrase(key.as_bytes(), &pass("claim-link-secret")).unwrap();

        assert_eq!(wrapped.salt.len(), SALT_SIZE * 2);
        assert_eq!(wrapped.iv.len(), IV_SIZE * 2);
        // key (32) + tag (16)
        assert_eq!(wrapped.encrypted_key.len(), (32 + 16) * 2);
    }

    #[test]
    fn test_kdf_deterministic() {
        let salt = [1u8; SALT_SIZE];
        let k1 = derive_passphrase_key(&pass("same"), &salt, 1000).unwrap();
        let k2 = derive_passphrase_key(&pass("same"), &salt, 1000).unwrap();
        assert_eq!(*k1, *k2, "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_salts() {
        let k1 = derive_passphrase_key(&pass("same"), &[1u8; SALT_SIZE], 1000).unwrap();
        let k2 = derive_passphrase_key(&pass("same"), &[2u8; SALT_SIZE], 1000).unwrap();
        assert_ne!(*k1, *k2, "different salts must produce different keys");
    }

    #[test]
    fn test_kdf_known_vector() {
        // RFC 7914 section 11 PBKDF2-HMAC-SHA256 test vector
        let key = derive_passphrase_key(&pass("passwd"), b"salt", 1).unwrap();
        assert_eq!(
            hex::encode(&key[..16]),
            "55ac046e56e3089fec1691c22544b605"
        );
    }

    #[test]
    fn test_bad_salt_length_is_format_error() {
        let key = generate_key().unwrap();
        let mut wrapped = wrap_with_passphrase(key.as_bytes(), &pass("pw")).unwrap();
        wrapped.salt = "00".into();

        assert!(matches!(
            unwrap_with_passphrase(&wrapped, &pass("pw")),
            Err(VaultError::Format(_))
        ));
    }
}
