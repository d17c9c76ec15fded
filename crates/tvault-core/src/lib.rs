//! tvault-core: types shared by every tvault crate
//!
//! - [`error`]: the error taxonomy every fallible operation returns
//! - [`config`]: the `tvault.toml` schema
//! - [`types`]: immutable wire value objects handed to storage and anchoring
//! - [`collab`]: traits for the external collaborators (storage, anchoring,
//!   wallet identity) the cryptographic core is driven against

pub mod collab;
pub mod config;
pub mod error;
pub mod types;

pub use collab::{Anchor, BlobStore, IdentityProver};
pub use error::{ValidationError, VaultError, VaultResult};
