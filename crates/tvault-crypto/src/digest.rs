//! SHA-256 integrity digests over ciphertext
//!
//! The digest covers public ciphertext, not a secret, so [`verify_hash`]
//! uses ordinary equality. A constant-time compare would add nothing here.

use sha2::{Digest, Sha256};
use tvault_core::{VaultError, VaultResult};

/// A 32-byte SHA-256 digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntegrityDigest([u8; 32]);

impl IntegrityDigest {
    pub fn compute(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 characters
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> VaultResult<Self> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)
            .map_err(|e| VaultError::Format(format!("invalid digest hex {s:?}: {e}")))?;
        Ok(Self(out))
    }
}

impl std::fmt::Display for IntegrityDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// SHA-256 of `bytes` as lowercase hex.
pub fn hash(bytes: &[u8]) -> String {
    IntegrityDigest::compute(bytes).to_hex()
}

/// True if `bytes` hash to `expected_hex` (either case).
pub fn verify_hash(bytes: &[u8], expected_hex: &str) -> bool {
    hash(bytes).eq_ignore_ascii_case(expected_hex.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        assert_eq!(
            hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hex_is_lowercase_64_chars() {
        let digest = hash(&[0xFFu8; 100]);
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, digest.to_lowercase());
    }

    #[test]
    fn test_verify_hash() {
        let data = b"ciphertext bytes";
        let digest = hash(data);

        assert!(verify_hash(data, &digest));
        assert!(verify_hash(data, &digest.to_uppercase()));
        assert!(!verify_hash(b"other bytes", &digest));
        assert!(!verify_hash(data, "not hex"));
    }

    #[test]
    fn test_digest_hex_roundtrip() {
        let digest = IntegrityDigest::compute(b"payload");
        let parsed = IntegrityDigest::from_hex(&digest.to_hex()).unwrap();
        assert_eq!(parsed, digest);
        assert_eq!(parsed.to_string(), digest.to_hex());
    }

    #[test]
    fn test_digest_from_bad_hex() {
        assert!(matches!(
            IntegrityDigest::from_hex("abcd"),
            Err(VaultError::Format(_))
        ));
    }
}
