//! tvault-storage: OpenDAL implementations of the storage and anchoring collaborators
//!
//! Layout under the configured prefix:
//! ```text
//! {prefix}/blobs/{sha256-hex}            ciphertext, content-addressed
//! {prefix}/anchors/{content_id}.json     anchored MessageRecord
//! ```

pub mod anchor;
pub mod blob;
pub mod health;
pub mod operator;

pub use anchor::OpendalAnchor;
pub use blob::OpendalBlobStore;
pub use health::{check_health, is_healthy, StorageStatus};
pub use operator::{build_from_config, build_operator, S3Credentials};
