//! OpenDAL Operator factory for tvault storage backends

use opendal::Operator;
use std::path::{Path, PathBuf};
use tvault_core::config::{StorageBackend, StorageConfig};
use tvault_core::{VaultError, VaultResult};

/// S3 access credentials (read from the environment by the CLI)
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Build an OpenDAL Operator from tvault config.
///
/// For S3, if `enforce_tls` is true and the endpoint uses HTTP, this returns
/// an error. Otherwise, a warning is logged for non-HTTPS endpoints.
pub fn build_from_config(cfg: &StorageConfig, creds: Option<&S3Credentials>) -> VaultResult<Operator> {
    match cfg.backend {
        StorageBackend::Memory => build_operator(opendal::services::Memory::default()),
        StorageBackend::Fs => {
            let root = expand_home(&cfg.root);
            let root = root
                .to_str()
                .ok_or_else(|| VaultError::Config(format!("storage root {} is not UTF-8", root.display())))?;
            build_operator(opendal::services::Fs::default().root(root))
        }
        StorageBackend::S3 => {
            if cfg.endpoint.starts_with("http://") {
                if cfg.enforce_tls {
                    return Err(VaultError::Config(format!(
                        "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                         Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                        cfg.endpoint
                    )));
                }
                tracing::warn!(
                    endpoint = %cfg.endpoint,
                    "S3 endpoint uses plaintext HTTP; credentials are transmitted unencrypted. \
                     Set storage.enforce_tls = true and use HTTPS in production."
                );
            }
            let creds = creds.ok_or_else(|| {
                VaultError::Config("S3 backend needs AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY".into())
            })?;

            // opendal 0.55: S3 builder uses consuming pattern (methods take `self`, return `Self`)
            let builder = opendal::services::S3::default()
                .endpoint(&cfg.endpoint)
                .region(&cfg.region)
                .bucket(&cfg.bucket)
                .access_key_id(&creds.access_key_id)
                .secret_access_key(&creds.secret_access_key);
            build_operator(builder)
        }
    }
}

/// Wrap any OpenDAL service builder with logging and retry layers.
pub fn build_operator<B: opendal::Builder>(builder: B) -> VaultResult<Operator> {
    let op = Operator::new(builder)
        .map_err(|e| VaultError::Storage(format!("creating OpenDAL operator: {e}")))?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();
    Ok(op)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}
