//! Content-addressed ciphertext storage

use async_trait::async_trait;
use opendal::{ErrorKind, Operator};
use sha2::{Digest, Sha256};
use tracing::debug;
use tvault_core::{BlobStore, VaultError, VaultResult};

/// Stores blobs at `{prefix}/blobs/{sha256-hex}`; the hex is the content id.
#[derive(Debug, Clone)]
pub struct OpendalBlobStore {
    op: Operator,
    prefix: String,
}

impl OpendalBlobStore {
    pub fn new(op: Operator, prefix: impl Into<String>) -> Self {
        Self {
            op,
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn blob_path(&self, content_id: &str) -> String {
        format!("{}/blobs/{content_id}", self.prefix)
    }
}

#[async_trait]
impl BlobStore for OpendalBlobStore {
    async fn upload(&self, bytes: &[u8]) -> VaultResult<String> {
        let content_id = hex::encode(Sha256::digest(bytes));
        let path = self.blob_path(&content_id);

        let stored = self
            .op
            .exists(&path)
            .await
            .map_err(|e| VaultError::Storage(format!("checking blob {content_id}: {e}")))?;
        if stored {
            debug!(content_id = %content_id, "dedup: blob already stored");
            return Ok(content_id);
        }

        self.op
            .write(&path, bytes.to_vec())
            .await
            .map_err(|e| VaultError::Storage(format!("uploading blob {content_id}: {e}")))?;

        debug!(content_id = %content_id, bytes = bytes.len(), "blob uploaded");
        Ok(content_id)
    }

    async fn download(&self, content_id: &str) -> VaultResult<Vec<u8>> {
        if content_id.len() != 64 || !content_id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(VaultError::Storage(format!("invalid content id {content_id:?}")));
        }

        let path = self.blob_path(content_id);
        let buffer = self.op.read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => VaultError::Storage(format!("blob {content_id} not found")),
            _ => VaultError::Storage(format!("downloading blob {content_id}: {e}")),
        })?;

        let bytes = buffer.to_vec();
        debug!(content_id = %content_id, bytes = bytes.len(), "blob downloaded");
        Ok(bytes)
    }
}
