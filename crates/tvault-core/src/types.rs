use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version tag written by the current address-bound wrap scheme
pub const WRAP_VERSION_V2: &str = "v2";

/// A symmetric key wrapped for an address-labelled recipient.
///
/// All byte fields are lowercase hex. The legacy shape omits `version` and
/// `ephemeralPublicKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// `salt (32 bytes) || AES-GCM ciphertext + tag`
    #[serde(rename = "encryptedAESKey")]
    pub encrypted_aes_key: String,
    /// 12-byte AES-GCM nonce
    pub nonce: String,
    /// 32-byte addressKey, derivable from the recipient address
    #[serde(rename = "recipientPublicKey")]
    pub recipient_public_key: String,
    #[serde(
        rename = "ephemeralPublicKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ephemeral_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A symmetric key wrapped under a PBKDF2-derived passphrase key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassphraseWrappedKey {
    #[serde(rename = "encryptedKey")]
    pub encrypted_key: String,
    /// 16-byte PBKDF2 salt
    pub salt: String,
    /// 12-byte AES-GCM IV
    pub iv: String,
}

/// How a message's symmetric key was wrapped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KeyEnvelope {
    Address(WrappedKey),
    Passphrase(PassphraseWrappedKey),
}

/// Metadata anchored for one sealed message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Content id returned by the blob store
    pub content_id: String,
    /// Lowercase hex SHA-256 of the stored ciphertext
    pub digest: String,
    pub envelope: KeyEnvelope,
    pub sender: String,
    /// Recipient address, or `None` for passphrase (claim-link) messages
    pub recipient: Option<String>,
    pub unlock_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub chunked: bool,
    pub total_chunks: u32,
    /// Plaintext size in bytes
    pub size: u64,
}

/// Returned by an [`crate::Anchor`] once a record is durable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub record_id: String,
    pub location: String,
    pub anchored_at: DateTime<Utc>,
}

/// Proof from the wallet collaborator that the caller controls `address`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipProof {
    pub address: String,
    pub signature: Vec<u8>,
}

impl std::fmt::Debug for OwnershipProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnershipProof")
            .field("address", &self.address)
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

/// Pipeline stages for sealing and opening
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Encrypting,
    Hashing,
    KeyWrapping,
    Uploading,
    Anchoring,
    Downloading,
    Verifying,
    Unwrapping,
    Decrypting,
    Complete,
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Encrypting => "encrypting",
            Stage::Hashing => "hashing",
            Stage::KeyWrapping => "key_wrapping",
            Stage::Uploading => "uploading",
            Stage::Anchoring => "anchoring",
            Stage::Downloading => "downloading",
            Stage::Verifying => "verifying",
            Stage::Unwrapping => "unwrapping",
            Stage::Decrypting => "decrypting",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A progress event for UI consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub percent: u8,
    pub message: String,
}
