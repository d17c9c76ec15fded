//! Anchor stand-in: persists message records next to the blobs
//!
//! In production the record is anchored on a chain. This keeps the same
//! contract against any OpenDAL backend, which is enough for local use and
//! tests.

use async_trait::async_trait;
use chrono::Utc;
use opendal::{ErrorKind, Operator};
use sha2::{Digest, Sha256};
use tracing::info;
use tvault_core::types::{AnchorReceipt, MessageRecord};
use tvault_core::{Anchor, VaultError, VaultResult};

#[derive(Debug, Clone)]
pub struct OpendalAnchor {
    op: Operator,
    prefix: String,
}

impl OpendalAnchor {
    pub fn new(op: Operator, prefix: impl Into<String>) -> Self {
        Self {
            op,
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn record_path(&self, content_id: &str) -> String {
        format!("{}/anchors/{content_id}.json", self.prefix)
    }
}

#[async_trait]
impl Anchor for OpendalAnchor {
    async fn anchor(&self, record: &MessageRecord) -> VaultResult<AnchorReceipt> {
        let json = serde_json::to_vec(record)
            .map_err(|e| VaultError::Anchor(format!("record serialization: {e}")))?;
        let location = self.record_path(&record.content_id);

        let already_anchored = self
            .op
            .exists(&location)
            .await
            .map_err(|e| VaultError::Anchor(format!("checking record {location}: {e}")))?;
        if already_anchored {
            return Err(VaultError::Anchor(format!(
                "a record for {} is already anchored",
                record.content_id
            )));
        }

        self.op
            .write(&location, json.clone())
            .await
            .map_err(|e| VaultError::Anchor(format!("writing record {location}: {e}")))?;

        let record_id = hex::encode(Sha256::digest(&json));
        info!(content_id = %record.content_id, record_id = %record_id, "record anchored");
        Ok(AnchorReceipt {
            record_id,
            location,
            anchored_at: Utc::now(),
        })
    }

    async fn resolve(&self, content_id: &str) -> VaultResult<MessageRecord> {
        if content_id.is_empty() || !content_id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(VaultError::Anchor(format!("invalid content id {content_id:?}")));
        }
        let location = self.record_path(content_id);
        let buffer = self.op.read(&location).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => VaultError::Anchor(format!("no record anchored for {content_id}")),
            _ => VaultError::Anchor(format!("reading record {location}: {e}")),
        })?;

        serde_json::from_slice(&buffer.to_vec())
            .map_err(|e| VaultError::Anchor(format!("record deserialization: {e}")))
    }
}
