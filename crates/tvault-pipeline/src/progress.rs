//! Stage progress reporting
//!
//! Percentages are a UI contract:
//!
//! | seal        |     | open        |     |
//! |-------------|-----|-------------|-----|
//! | Encrypting  | 10  | Downloading | 10  |
//! | Hashing     | 25  | Verifying   | 30  |
//! | KeyWrapping | 35  | Unwrapping  | 50  |
//! | Uploading   | 50  | Decrypting  | 70  |
//! | Anchoring   | 90  | Complete    | 100 |
//! | Complete    | 100 |             |     |
//!
//! Chunk progress inside encryption fills the 10..25 band, inside decryption
//! the 70..95 band. `Failed` repeats the last percent reached.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};
use tvault_core::types::{ProgressEvent, Stage};
use tvault_core::VaultError;
use tvault_crypto::ChunkProgress;

/// Receives every progress event, possibly from a blocking worker thread.
pub type ProgressSink = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Percent at which `stage` begins; `None` for `Failed`.
pub fn stage_percent(stage: Stage) -> Option<u8> {
    let percent = match stage {
        Stage::Encrypting | Stage::Downloading => 10,
        Stage::Hashing => 25,
        Stage::Verifying => 30,
        Stage::KeyWrapping => 35,
        Stage::Uploading | Stage::Unwrapping => 50,
        Stage::Decrypting => 70,
        Stage::Anchoring => 90,
        Stage::Complete => 100,
        Stage::Failed => return None,
    };
    Some(percent)
}

/// Per-operation reporter. Clones share the last-percent state.
#[derive(Clone)]
pub(crate) struct ProgressReporter {
    operation: &'static str,
    sink: Option<ProgressSink>,
    last_percent: Arc<AtomicU8>,
}

impl ProgressReporter {
    pub(crate) fn new(operation: &'static str, sink: Option<ProgressSink>) -> Self {
        Self {
            operation,
            sink,
            last_percent: Arc::new(AtomicU8::new(0)),
        }
    }

    pub(crate) fn stage(&self, stage: Stage, message: impl Into<String>) {
        let percent = stage_percent(stage).unwrap_or_else(|| self.last_percent());
        let message = message.into();
        info!(operation = self.operation, stage = %stage, percent, "{message}");
        self.emit(stage, percent, message);
    }

    /// Chunk progress inside the encrypt or decrypt stage.
    pub(crate) fn chunk(&self, stage: Stage, progress: ChunkProgress) {
        let (low, high) = match stage {
            Stage::Encrypting => (10.0, 25.0),
            Stage::Decrypting => (70.0, 95.0),
            _ => return,
        };
        let percent = (low + (high - low) * progress.fraction()).floor() as u8;
        debug!(
            operation = self.operation,
            stage = %stage,
            chunk = progress.chunk_index + 1,
            total_chunks = progress.total_chunks,
            percent,
            "chunk processed"
        );
        self.emit(
            stage,
            percent,
            format!("chunk {} of {}", progress.chunk_index + 1, progress.total_chunks),
        );
    }

    pub(crate) fn failed(&self, stage: Option<Stage>, error: &VaultError) {
        let percent = self.last_percent();
        let at = stage.map(|s| s.as_str()).unwrap_or("pre-flight");
        warn!(operation = self.operation, stage = at, percent, error = %error, "pipeline failed");
        self.emit(Stage::Failed, percent, format!("{at} failed: {error}"));
    }

    fn last_percent(&self) -> u8 {
        self.last_percent.load(Ordering::Relaxed)
    }

    fn emit(&self, stage: Stage, percent: u8, message: String) {
        if stage != Stage::Failed {
            self.last_percent.store(percent, Ordering::Relaxed);
        }
        if let Some(sink) = &self.sink {
            sink(&ProgressEvent {
                stage,
                percent,
                message,
            });
        }
    }
}
