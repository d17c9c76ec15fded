//! Storage status and health check

use opendal::{ErrorKind, Operator};
use serde::Serialize;
use tvault_core::{VaultError, VaultResult};

/// What a reachable backend currently holds under the vault prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStatus {
    pub backend: String,
    pub root: String,
    pub blobs: usize,
    pub anchored_records: usize,
}

/// List the vault prefix; fails with `Storage` when the backend is unreachable.
pub async fn check_health(op: &Operator, prefix: &str) -> VaultResult<StorageStatus> {
    let prefix = prefix.trim_end_matches('/');
    let info = op.info();
    Ok(StorageStatus {
        backend: info.scheme().to_string(),
        root: info.root().to_string(),
        blobs: count_files(op, &format!("{prefix}/blobs/")).await?,
        anchored_records: count_files(op, &format!("{prefix}/anchors/")).await?,
    })
}

/// Returns true if storage is reachable, false otherwise (non-panicking)
pub async fn is_healthy(op: &Operator, prefix: &str) -> bool {
    check_health(op, prefix).await.is_ok()
}

async fn count_files(op: &Operator, dir: &str) -> VaultResult<usize> {
    match op.list(dir).await {
        Ok(entries) => Ok(entries.iter().filter(|e| e.metadata().is_file()).count()),
        // Nothing sealed yet
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(VaultError::Storage(format!("storage health check failed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OpendalBlobStore;
    use tvault_core::BlobStore;

    fn memory_operator() -> Operator {
        Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish()
    }

    #[tokio::test]
    async fn test_empty_backend_is_healthy() {
        let op = memory_operator();
        assert!(is_healthy(&op, "vault").await);

        let status = check_health(&op, "vault").await.unwrap();
        assert_eq!(status.blobs, 0);
        assert_eq!(status.anchored_records, 0);
    }

    #[tokio::test]
    async fn test_counts_stored_blobs() {
        let op = memory_operator();
        let store = OpendalBlobStore::new(op.clone(), "vault");
        store.upload(b"one").await.unwrap();
        store.upload(b"two").await.unwrap();
        store.upload(b"two").await.unwrap();

        let status = check_health(&op, "vault/").await.unwrap();
        assert_eq!(status.blobs, 2);
    }
}
