//! Ephemeral per-message AES-256 keys

use tvault_core::{ValidationError, VaultResult};
use zeroize::Zeroize;

use crate::{random, KEY_SIZE};

/// Operations a key may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsages {
    pub encrypt: bool,
    pub decrypt: bool,
}

impl KeyUsages {
    pub const ENCRYPT_DECRYPT: KeyUsages = KeyUsages {
        encrypt: true,
        decrypt: true,
    };
    pub const DECRYPT_ONLY: KeyUsages = KeyUsages {
        encrypt: false,
        decrypt: true,
    };
}

/// A 256-bit AES-GCM key for one message. Zeroized on drop; never persisted.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
    usages: KeyUsages,
}

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE], usages: KeyUsages) -> Self {
        Self { bytes, usages }
    }

    /// Import raw key material, e.g. the output of an unwrap.
    pub fn import(raw: &[u8], usages: KeyUsages) -> VaultResult<Self> {
        let bytes: [u8; KEY_SIZE] = raw.try_into().map_err(|_| {
            ValidationError::InvalidKey(format!(
                "expected {KEY_SIZE} key bytes, got {}",
                raw.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes, usages))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub fn usages(&self) -> KeyUsages {
        self.usages
    }

    pub(crate) fn require_encrypt(&self) -> VaultResult<()> {
        if !self.usages.encrypt {
            return Err(ValidationError::InvalidKey("key is not usable for encryption".into()).into());
        }
        Ok(())
    }

    pub(crate) fn require_decrypt(&self) -> VaultResult<()> {
        if !self.usages.decrypt {
            return Err(ValidationError::InvalidKey("key is not usable for decryption".into()).into());
        }
        Ok(())
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .field("usages", &self.usages)
            .finish()
    }
}

/// Generate a fresh random 256-bit key usable for both directions.
pub fn generate_key() -> VaultResult<SymmetricKey> {
    let bytes = random::array::<KEY_SIZE>()?;
    Ok(SymmetricKey::from_bytes(bytes, KeyUsages::ENCRYPT_DECRYPT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvault_core::VaultError;

    #[test]
    fn test_key_generation() {
        let k1 = generate_key().unwrap();
        let k2 = generate_key().unwrap();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
        assert_eq!(k1.usages(), KeyUsages::ENCRYPT_DECRYPT);
    }

    #[test]
    fn test_import_rejects_wrong_length() {
        let result = SymmetricKey::import(&[1u8; 16], KeyUsages::ENCRYPT_DECRYPT);
        assert!(matches!(
            result,
            Err(VaultError::Validation(ValidationError::InvalidKey(_)))
        ));
    }

    #[test]
    fn test_import_roundtrip() {
        let key = generate_key().unwrap();
        let imported = SymmetricKey::import(key.as_bytes(), KeyUsages::DECRYPT_ONLY).unwrap();
        assert_eq!(key.as_bytes(), imported.as_bytes());
        assert!(imported.require_encrypt().is_err());
        assert!(imported.require_decrypt().is_ok());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SymmetricKey::from_bytes([0xAB; KEY_SIZE], KeyUsages::ENCRYPT_DECRYPT);
        let debug = format!("{key:?}");
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("171"), "raw key bytes must not appear");
    }
}
