//! Integration test: failures are tagged with their stage and never leak
//! partial output
//!
//! Covers collaborator failures (upload, anchor), tampering with stored
//! ciphertext, and requests rejected before any crypto runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use opendal::Operator;
use secrecy::SecretString;
use tvault_core::types::{AnchorReceipt, MessageRecord, ProgressEvent, Stage};
use tvault_core::{Anchor, BlobStore, ValidationError, VaultError, VaultResult};
use tvault_pipeline::{MessagePipeline, OpenCredential, PipelineOptions, ProgressSink, Recipient, SendRequest};
use tvault_storage::{OpendalAnchor, OpendalBlobStore};

const ALICE: &str = "0x8617e340b3d01fa5f11f306f4090fd50e238070d";
const BOB: &str = "0xde709f2102306220921060314715629080e2fb77";

fn memory_operator() -> Operator {
    Operator::new(opendal::services::Memory::default())
        .expect("memory operator")
        .finish()
}

fn request(media: &[u8]) -> SendRequest {
    SendRequest {
        media: media.to_vec(),
        sender: ALICE.into(),
        recipient: Recipient::Address(BOB.into()),
        unlock_at: Utc::now() + Duration::hours(1),
    }
}

fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<ProgressEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let sink: ProgressSink = Arc::new(move |e: &ProgressEvent| sink_events.lock().unwrap().push(e.clone()));
    (sink, events)
}

/// Counts calls and fails every upload.
#[derive(Default)]
struct BrokenStore {
    uploads: AtomicUsize,
}

#[async_trait]
impl BlobStore for BrokenStore {
    async fn upload(&self, _bytes: &[u8]) -> VaultResult<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Err(VaultError::Storage("bucket unreachable".into()))
    }

    async fn download(&self, content_id: &str) -> VaultResult<Vec<u8>> {
        Err(VaultError::Storage(format!("{content_id} unavailable")))
    }
}

struct RejectingAnchor;

#[async_trait]
impl Anchor for RejectingAnchor {
    async fn anchor(&self, _record: &MessageRecord) -> VaultResult<AnchorReceipt> {
        Err(VaultError::Anchor("transaction reverted".into()))
    }

    async fn resolve(&self, content_id: &str) -> VaultResult<MessageRecord> {
        Err(VaultError::Anchor(format!("no record for {content_id}")))
    }
}

#[tokio::test]
async fn upload_failure_is_tagged_and_reported() {
    let op = memory_operator();
    let store = Arc::new(BrokenStore::default());
    let (sink, events) = recording_sink();
    let pipeline = MessagePipeline::new(store.clone(), Arc::new(OpendalAnchor::new(op, "test")))
        .with_progress(sink);

    let err = pipeline.seal(request(b"never arrives")).await.unwrap_err();

    assert_eq!(err.stage, Some(Stage::Uploading));
    assert!(matches!(err.kind(), VaultError::Storage(_)));
    assert_eq!(store.uploads.load(Ordering::SeqCst), 1);

    let events = events.lock().unwrap();
    let last = events.last().unwrap();
    assert_eq!(last.stage, Stage::Failed);
    assert_eq!(last.percent, 50);
    assert!(!events.iter().any(|e| e.stage == Stage::Complete));
}

#[tokio::test]
async fn anchor_failure_leaves_blob_behind() {
    let op = memory_operator();
    let pipeline = MessagePipeline::new(
        Arc::new(OpendalBlobStore::new(op.clone(), "test")),
        Arc::new(RejectingAnchor),
    );

    let err = pipeline.seal(request(b"orphaned")).await.unwrap_err();
    assert_eq!(err.stage, Some(Stage::Anchoring));
    assert!(matches!(err.kind(), VaultError::Anchor(_)));

    let blobs = op.list("test/blobs/").await.unwrap();
    assert_eq!(blobs.iter().filter(|e| e.metadata().is_file()).count(), 1);
}

#[tokio::test]
async fn validation_runs_before_any_upload() {
    let store = Arc::new(BrokenStore::default());
    let pipeline = MessagePipeline::new(store.clone(), Arc::new(RejectingAnchor));

    let mut req = request(b"");
    let err = pipeline.seal(req).await.unwrap_err();
    assert!(err.stage.is_none());
    assert!(matches!(err.validation(), Some(ValidationError::MissingMedia)));

    req = request(b"to myself");
    req.recipient = Recipient::Address(ALICE.to_uppercase().replace("0X", "0x"));
    let err = pipeline.seal(req).await.unwrap_err();
    assert!(matches!(err.validation(), Some(ValidationError::SenderIsRecipient)));

    req = request(b"from the past");
    req.unlock_at = Utc::now() - Duration::minutes(5);
    let err = pipeline.seal(req).await.unwrap_err();
    assert!(matches!(err.validation(), Some(ValidationError::UnlockTimeNotInFuture { .. })));

    req = request(b"claim link");
    req.recipient = Recipient::Passphrase(SecretString::from(String::new()));
    let err = pipeline.seal(req).await.unwrap_err();
    assert!(matches!(err.validation(), Some(ValidationError::EmptyPassphrase)));

    assert_eq!(store.uploads.load(Ordering::SeqCst), 0);
}

/// Seal a passphrase message into `op` and return its record.
async fn sealed_record(op: &Operator) -> MessageRecord {
    let pipeline = MessagePipeline::new(
        Arc::new(OpendalBlobStore::new(op.clone(), "test")),
        Arc::new(OpendalAnchor::new(op.clone(), "test")),
    );
    let mut req = request(b"tamper with me if you can");
    req.recipient = Recipient::Passphrase(SecretString::from("pw".to_string()));
    pipeline.seal(req).await.unwrap().record
}

fn opener(op: &Operator) -> MessagePipeline {
    MessagePipeline::new(
        Arc::new(OpendalBlobStore::new(op.clone(), "test")),
        Arc::new(OpendalAnchor::new(op.clone(), "test")),
    )
    .with_options(PipelineOptions {
        enforce_time_lock: false,
        ..PipelineOptions::default()
    })
}

async fn flip_stored_bit(op: &Operator, content_id: &str) -> Vec<u8> {
    let path = format!("test/blobs/{content_id}");
    let mut bytes = op.read(&path).await.unwrap().to_vec();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    op.write(&path, bytes.clone()).await.unwrap();
    bytes
}

#[tokio::test]
async fn tampered_blob_is_an_integrity_mismatch() {
    let op = memory_operator();
    let record = sealed_record(&op).await;
    flip_stored_bit(&op, &record.content_id).await;

    let err = opener(&op)
        .open(&record, OpenCredential::Passphrase(SecretString::from("pw".to_string())))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Some(Stage::Verifying));
    assert!(matches!(
        err.kind(),
        VaultError::IntegrityMismatch { expected, .. } if *expected == record.digest
    ));
}

#[tokio::test]
async fn tampered_blob_with_forged_digest_fails_authentication() {
    let op = memory_operator();
    let mut record = sealed_record(&op).await;
    let tampered = flip_stored_bit(&op, &record.content_id).await;
    record.digest = tvault_crypto::hash(&tampered);

    let err = opener(&op)
        .open(&record, OpenCredential::Passphrase(SecretString::from("pw".to_string())))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Some(Stage::Decrypting));
    assert!(err.kind().is_authentication_failure());
}

#[tokio::test]
async fn missing_record_fails_at_downloading() {
    let op = memory_operator();
    let err = opener(&op)
        .open_by_id(&"ab".repeat(32), OpenCredential::Passphrase(SecretString::from("pw".to_string())))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Some(Stage::Downloading));
    assert!(matches!(err.kind(), VaultError::Anchor(_)));
}
