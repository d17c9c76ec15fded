//! Seal and open pipelines
//!
//! Seal: validate → generate key → encrypt → hash → wrap key → upload → anchor.
//! Open: time-lock check → download → verify digest → prove identity / derive
//! passphrase key → unwrap → decrypt.
//!
//! AES and PBKDF2 work runs on the blocking pool; everything else is a
//! sequence of awaits on the collaborators. Each operation owns a [`Scratch`]
//! that erases the message key and ciphertext when the operation ends. Seal
//! releases the key as soon as it is wrapped, before any network call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use tokio::task::spawn_blocking;
use tracing::{info, warn};
use zeroize::Zeroizing;

use tvault_core::config::{TvaultConfig, DEFAULT_CHUNK_SIZE};
use tvault_core::types::{AnchorReceipt, KeyEnvelope, MessageRecord, Stage};
use tvault_core::{Anchor, BlobStore, IdentityProver, VaultError, VaultResult};
use tvault_crypto::{
    decrypt_smart, encrypt_smart, generate_key, hash, is_addressed_to, unwrap, unwrap_with_passphrase,
    verify_hash, wrap, wrap_with_passphrase, BlobFormat, ChunkProgress, KeyUsages, SymmetricKey,
};

use crate::error::{at, join_failed, PipelineError};
use crate::progress::{ProgressReporter, ProgressSink};
use crate::teardown::Scratch;
use crate::validate::{check_unlocked, validate_send};

/// Who can open a message
#[derive(Debug)]
pub enum Recipient {
    /// A wallet address; the key is wrapped with the address-bound scheme.
    Address(String),
    /// Claim-link flow: the key is wrapped under a passphrase shared out of band.
    Passphrase(SecretString),
}

/// A message to seal
pub struct SendRequest {
    pub media: Vec<u8>,
    pub sender: String,
    pub recipient: Recipient,
    pub unlock_at: DateTime<Utc>,
}

impl std::fmt::Debug for SendRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendRequest")
            .field("media_len", &self.media.len())
            .field("sender", &self.sender)
            .field("recipient", &self.recipient)
            .field("unlock_at", &self.unlock_at)
            .finish()
    }
}

/// Result of a successful seal
#[derive(Debug, Clone, Serialize)]
pub struct SealReceipt {
    pub record: MessageRecord,
    pub anchor: AnchorReceipt,
}

/// Proof presented when opening a message
pub enum OpenCredential<'a> {
    /// The caller claims `address`; the prover must vouch for it.
    Identity(&'a dyn IdentityProver, &'a str),
    Passphrase(SecretString),
}

impl std::fmt::Debug for OpenCredential<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenCredential::Identity(_, address) => f.debug_tuple("Identity").field(address).finish(),
            OpenCredential::Passphrase(_) => f.write_str("Passphrase([REDACTED])"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Chunk size for payloads at or above the chunking threshold
    pub chunk_size: usize,
    /// Refuse to open before `unlock_at`
    pub enforce_time_lock: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            enforce_time_lock: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &TvaultConfig) -> Self {
        Self {
            chunk_size: config.crypto.chunk_size_bytes,
            enforce_time_lock: config.pipeline.enforce_time_lock,
        }
    }
}

/// Drives seal and open against a blob store and an anchor.
pub struct MessagePipeline {
    store: Arc<dyn BlobStore>,
    anchor: Arc<dyn Anchor>,
    options: PipelineOptions,
    progress: Option<ProgressSink>,
}

impl MessagePipeline {
    pub fn new(store: Arc<dyn BlobStore>, anchor: Arc<dyn Anchor>) -> Self {
        Self {
            store,
            anchor,
            options: PipelineOptions::default(),
            progress: None,
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Encrypt, upload, and anchor a message.
    ///
    /// On failure nothing partial is returned; the error names the stage. A
    /// blob uploaded before an anchoring failure stays in the store.
    pub async fn seal(&self, request: SendRequest) -> Result<SealReceipt, PipelineError> {
        let reporter = ProgressReporter::new("seal", self.progress.clone());
        let result = self.run_seal(request, &reporter).await;
        finish(&reporter, result)
    }

    /// Download, verify, unwrap, and decrypt the message described by `record`.
    pub async fn open(
        &self,
        record: &MessageRecord,
        credential: OpenCredential<'_>,
    ) -> Result<Zeroizing<Vec<u8>>, PipelineError> {
        let reporter = ProgressReporter::new("open", self.progress.clone());
        let result = self.run_open(record, credential, &reporter).await;
        finish(&reporter, result)
    }

    /// Resolve the anchored record for `content_id`, then [`open`](Self::open) it.
    pub async fn open_by_id(
        &self,
        content_id: &str,
        credential: OpenCredential<'_>,
    ) -> Result<Zeroizing<Vec<u8>>, PipelineError> {
        let reporter = ProgressReporter::new("open", self.progress.clone());
        let result = match self.anchor.resolve(content_id).await {
            Ok(record) => self.run_open(&record, credential, &reporter).await,
            Err(e) => Err(PipelineError::at(Stage::Downloading, e)),
        };
        finish(&reporter, result)
    }

    async fn run_seal(
        &self,
        request: SendRequest,
        reporter: &ProgressReporter,
    ) -> Result<SealReceipt, PipelineError> {
        validate_send(&request, Utc::now()).map_err(PipelineError::preflight)?;

        let SendRequest {
            media,
            sender,
            recipient,
            unlock_at,
        } = request;
        let media = Zeroizing::new(media);
        info!(sender = %sender, bytes = media.len(), unlock_at = %unlock_at, "sealing message");

        let mut scratch = Scratch::new();

        reporter.stage(Stage::Encrypting, "encrypting media");
        let key = scratch.hold_key(generate_key().map_err(at(Stage::Encrypting))?);
        let worker_key = Arc::clone(&key);
        let chunk_size = self.options.chunk_size;
        let chunk_reporter = reporter.clone();
        let (mut scratch, sealed) = spawn_blocking(move || {
            let on_chunk = |p: ChunkProgress| chunk_reporter.chunk(Stage::Encrypting, p);
            let sealed = encrypt_smart(&media, &worker_key, chunk_size, Some(&on_chunk)).map(|blob| {
                scratch.ciphertext = blob.bytes;
                (blob.format, blob.total_chunks, blob.plaintext_len)
            });
            (scratch, sealed)
        })
        .await
        .map_err(|e| PipelineError::at(Stage::Encrypting, join_failed(e)))?;
        let (format, total_chunks, size) = sealed.map_err(at(Stage::Encrypting))?;

        reporter.stage(Stage::Hashing, "hashing ciphertext");
        let digest = hash(&scratch.ciphertext);

        reporter.stage(Stage::KeyWrapping, "wrapping message key");
        let recipient_address = match &recipient {
            Recipient::Address(address) => Some(address.clone()),
            Recipient::Passphrase(_) => None,
        };
        let envelope = wrap_key(key, recipient)
            .await
            .map_err(at(Stage::KeyWrapping))?;
        // Only the ciphertext is needed from here on.
        scratch.release_key();

        reporter.stage(Stage::Uploading, "uploading ciphertext");
        let content_id = self
            .store
            .upload(&scratch.ciphertext)
            .await
            .map_err(at(Stage::Uploading))?;

        reporter.stage(Stage::Anchoring, "anchoring message record");
        let record = MessageRecord {
            content_id,
            digest,
            envelope,
            sender,
            recipient: recipient_address,
            unlock_at,
            created_at: Utc::now(),
            chunked: format == BlobFormat::Chunked,
            total_chunks,
            size,
        };
        let anchor = self
            .anchor
            .anchor(&record)
            .await
            .map_err(at(Stage::Anchoring))?;

        drop(scratch);
        reporter.stage(Stage::Complete, "message sealed");
        info!(content_id = %record.content_id, chunked = record.chunked, total_chunks, "message sealed");
        Ok(SealReceipt { record, anchor })
    }

    async fn run_open(
        &self,
        record: &MessageRecord,
        credential: OpenCredential<'_>,
        reporter: &ProgressReporter,
    ) -> Result<Zeroizing<Vec<u8>>, PipelineError> {
        if self.options.enforce_time_lock {
            check_unlocked(record, Utc::now()).map_err(PipelineError::preflight)?;
        }
        info!(content_id = %record.content_id, credential = ?credential, "opening message");

        let mut scratch = Scratch::new();

        reporter.stage(Stage::Downloading, "downloading ciphertext");
        scratch.ciphertext = self
            .store
            .download(&record.content_id)
            .await
            .map_err(at(Stage::Downloading))?;

        reporter.stage(Stage::Verifying, "verifying integrity digest");
        if !verify_hash(&scratch.ciphertext, &record.digest) {
            return Err(PipelineError::at(
                Stage::Verifying,
                VaultError::IntegrityMismatch {
                    expected: record.digest.clone(),
                    actual: hash(&scratch.ciphertext),
                },
            ));
        }

        reporter.stage(Stage::Unwrapping, "unwrapping message key");
        let raw_key = unwrap_key(&record.envelope, credential)
            .await
            .map_err(at(Stage::Unwrapping))?;
        let key = SymmetricKey::import(&raw_key, KeyUsages::DECRYPT_ONLY).map_err(at(Stage::Unwrapping))?;
        drop(raw_key);
        let key = scratch.hold_key(key);

        reporter.stage(Stage::Decrypting, "decrypting media");
        let chunk_reporter = reporter.clone();
        let (scratch, plaintext) = spawn_blocking(move || {
            let on_chunk = |p: ChunkProgress| chunk_reporter.chunk(Stage::Decrypting, p);
            let plaintext = decrypt_smart(&scratch.ciphertext, &key, Some(&on_chunk)).map(Zeroizing::new);
            (scratch, plaintext)
        })
        .await
        .map_err(|e| PipelineError::at(Stage::Decrypting, join_failed(e)))?;
        drop(scratch);
        let plaintext = plaintext.map_err(at(Stage::Decrypting))?;

        if plaintext.len() as u64 != record.size {
            warn!(
                content_id = %record.content_id,
                recorded = record.size,
                actual = plaintext.len(),
                "decrypted size differs from record"
            );
        }

        reporter.stage(Stage::Complete, "message opened");
        Ok(plaintext)
    }
}

fn finish<T>(reporter: &ProgressReporter, result: Result<T, PipelineError>) -> Result<T, PipelineError> {
    if let Err(e) = &result {
        reporter.failed(e.stage, &e.source);
    }
    result
}

async fn wrap_key(key: Arc<SymmetricKey>, recipient: Recipient) -> VaultResult<KeyEnvelope> {
    match recipient {
        Recipient::Address(address) => Ok(KeyEnvelope::Address(wrap(key.as_bytes(), &address)?)),
        Recipient::Passphrase(passphrase) => {
            let wrapped = spawn_blocking(move || wrap_with_passphrase(key.as_bytes(), &passphrase))
                .await
                .map_err(join_failed)??;
            Ok(KeyEnvelope::Passphrase(wrapped))
        }
    }
}

async fn unwrap_key(
    envelope: &KeyEnvelope,
    credential: OpenCredential<'_>,
) -> VaultResult<Zeroizing<Vec<u8>>> {
    match (envelope, credential) {
        (KeyEnvelope::Address(wrapped), OpenCredential::Identity(prover, address)) => {
            if !is_addressed_to(wrapped, address)? {
                return Err(VaultError::Identity(format!("message is not addressed to {address}")));
            }
            let proof = prover.prove_ownership(address).await?;
            if !proof.address.eq_ignore_ascii_case(address) {
                return Err(VaultError::Identity(format!(
                    "ownership proof is for {}, not {address}",
                    proof.address
                )));
            }
            unwrap(wrapped)
        }
        (KeyEnvelope::Passphrase(wrapped), OpenCredential::Passphrase(passphrase)) => {
            let wrapped = wrapped.clone();
            spawn_blocking(move || unwrap_with_passphrase(&wrapped, &passphrase))
                .await
                .map_err(join_failed)?
        }
        (KeyEnvelope::Address(_), OpenCredential::Passphrase(_)) => Err(VaultError::Identity(
            "message is sealed to an address; open it with an identity proof".into(),
        )),
        (KeyEnvelope::Passphrase(_), OpenCredential::Identity(..)) => Err(VaultError::Identity(
            "message is sealed with a passphrase; open it with the passphrase".into(),
        )),
    }
}
