//! Single-shot AES-256-GCM blobs
//!
//! Standard blob format (binary):
//! ```text
//! [12 bytes: random IV][N bytes: ciphertext][16 bytes: GCM tag]
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use tvault_core::{VaultError, VaultResult};

use crate::keys::SymmetricKey;
use crate::{random, IV_SIZE, KEY_SIZE, TAG_SIZE};

/// Encrypt `plaintext` under a fresh random IV.
///
/// Returns: `[12-byte IV][ciphertext][16-byte tag]`
pub fn encrypt_standard(plaintext: &[u8], key: &SymmetricKey) -> VaultResult<Vec<u8>> {
    key.require_encrypt()?;
    let iv = random::array::<IV_SIZE>()?;

    let ciphertext = aes_seal(key.as_bytes(), &iv, plaintext)?;

    let mut result = Vec::with_capacity(IV_SIZE + ciphertext.len());
    result.extend_from_slice(&iv);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt a standard blob. Fails closed with `AuthenticationFailed` on a bad tag.
pub fn decrypt_standard(blob: &[u8], key: &SymmetricKey) -> VaultResult<Vec<u8>> {
    key.require_decrypt()?;
    if blob.len() < IV_SIZE + TAG_SIZE {
        return Err(VaultError::Format(format!(
            "standard blob too short: {} bytes (minimum {})",
            blob.len(),
            IV_SIZE + TAG_SIZE
        )));
    }

    let (iv, ciphertext) = blob.split_at(IV_SIZE);
    aes_open(key.as_bytes(), iv, ciphertext)
        .map_err(|_| VaultError::AuthenticationFailed("blob decryption failed: wrong key or corrupted data".into()))
}

/// AES-256-GCM encrypt with an explicit IV. Output is `ciphertext || tag`.
pub(crate) fn aes_seal(key: &[u8; KEY_SIZE], iv: &[u8], plaintext: &[u8]) -> VaultResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .map_err(|e| VaultError::PlatformUnavailable(format!("AES-GCM encryption failed: {e}")))
}

/// AES-256-GCM decrypt with an explicit IV. AEAD errors are opaque.
pub(crate) fn aes_open(key: &[u8; KEY_SIZE], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, aes_gcm::Error> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher.decrypt(Nonce::from_slice(iv), ciphertext)
}
