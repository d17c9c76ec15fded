use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed input, caught before any cryptography runs.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// AEAD tag mismatch on decrypt or unwrap. Never carries partial output.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Ciphertext digest did not match the anchored digest.
    #[error("integrity mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("format error: {0}")]
    Format(String),

    /// No CSPRNG or crypto provider. Not retryable.
    #[error("platform unavailable: {0}")]
    PlatformUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("anchor error: {0}")]
    Anchor(String),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    /// True for tag failures: "wrong key" as opposed to "corrupted data".
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, VaultError::AuthenticationFailed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("media payload is empty or missing")]
    MissingMedia,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("unlock time {unlock_at} is not after {now}")]
    UnlockTimeNotInFuture { unlock_at: String, now: String },

    #[error("sender and recipient are the same address")]
    SenderIsRecipient,

    #[error("passphrase must not be empty")]
    EmptyPassphrase,

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    #[error("payload needs {chunks} chunks (maximum {max})")]
    PayloadTooLarge { chunks: u64, max: u32 },

    #[error("message is time-locked until {0}")]
    StillLocked(String),
}
