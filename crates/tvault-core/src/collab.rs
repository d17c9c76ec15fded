//! External collaborator contracts
//!
//! The cryptographic core never talks to a network, chain, or wallet itself.
//! These traits are the boundary; `tvault-storage` provides OpenDAL-backed
//! implementations of the first two.

use async_trait::async_trait;

use crate::error::VaultResult;
use crate::types::{AnchorReceipt, MessageRecord, OwnershipProof};

/// Content-addressed blob storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return their content id.
    async fn upload(&self, bytes: &[u8]) -> VaultResult<String>;

    /// Fetch the bytes stored under `content_id`.
    async fn download(&self, content_id: &str) -> VaultResult<Vec<u8>>;
}

/// Durable anchoring of message metadata (a blockchain in production)
#[async_trait]
pub trait Anchor: Send + Sync {
    async fn anchor(&self, record: &MessageRecord) -> VaultResult<AnchorReceipt>;

    /// Look up the record anchored for `content_id`.
    async fn resolve(&self, content_id: &str) -> VaultResult<MessageRecord>;
}

/// Wallet identity: proves the caller controls an address.
///
/// Signature verification belongs to the implementor; the pipeline only
/// checks that the proof names the labelled recipient.
#[async_trait]
pub trait IdentityProver: Send + Sync {
    async fn prove_ownership(&self, address: &str) -> VaultResult<OwnershipProof>;
}
