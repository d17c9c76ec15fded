use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};

/// Default chunk size for chunked-mode encryption (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Top-level configuration (loaded from tvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TvaultConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
    pub pipeline: PipelineConfig,
}

impl TvaultConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(text: &str) -> VaultResult<Self> {
        toml::from_str(text).map_err(|e| VaultError::Config(format!("parsing config: {e}")))
    }

    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found (using defaults)");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> VaultResult<String> {
        toml::to_string_pretty(self).map_err(|e| VaultError::Config(format!("serializing config: {e}")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Which OpenDAL service backs blob and anchor storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Fs,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket name
    pub bucket: String,
    /// Key prefix under which blobs and anchor records are stored
    pub prefix: String,
    /// Reject plaintext HTTP endpoints instead of warning
    pub enforce_tls: bool,
}

/// Crypto tuning. Wire-level constants (IV/tag length, threshold) are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Chunk size used when sealing large payloads (default: 1 MiB)
    pub chunk_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Refuse to open a message before its unlock time (default: true)
    pub enforce_time_lock: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("~/.local/share/tvault"),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "tvault".into(),
            prefix: "vault".into(),
            enforce_tls: false,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enforce_time_lock: true,
        }
    }
}
