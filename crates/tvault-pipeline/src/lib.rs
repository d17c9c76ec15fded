//! tvault-pipeline: the message pipeline around the cryptographic core
//!
//! - [`validate`]: pre-flight checks that run before any crypto
//! - [`engine`]: [`MessagePipeline::seal`] and [`MessagePipeline::open`]
//! - [`progress`]: stage events and their percentages
//! - [`error`]: [`PipelineError`], a failure tagged with its stage
//!
//! Every seal and open erases its message key and intermediate ciphertext on
//! exit, whether it succeeded, failed, panicked in a worker, or was dropped
//! mid-flight.

pub mod engine;
pub mod error;
pub mod progress;
mod teardown;
pub mod validate;

pub use engine::{MessagePipeline, OpenCredential, PipelineOptions, Recipient, SealReceipt, SendRequest};
pub use error::PipelineError;
pub use progress::{stage_percent, ProgressSink};
