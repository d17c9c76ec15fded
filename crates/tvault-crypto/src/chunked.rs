//! Chunked AES-256-GCM for large payloads
//!
//! Chunked blob format (binary):
//! ```text
//! [4 bytes: chunkCount, u32 LE][12 bytes: baseIV]
//! repeated chunkCount times:
//!     [4 bytes: frame length, u32 LE][ciphertext][16 bytes: GCM tag]
//! ```
//!
//! Every chunk is sealed independently under `chunk_iv(baseIV, index)`, so a
//! reader never needs more than one chunk of plaintext in memory. Chunks are
//! processed strictly in order.

use std::io::{ErrorKind, Read, Write};
use std::ops::Range;

use tracing::debug;
use tvault_core::{ValidationError, VaultError, VaultResult};
use zeroize::Zeroizing;

use crate::keys::SymmetricKey;
use crate::standard::{aes_open, aes_seal};
use crate::{random, CHUNK_HEADER_SIZE, IV_SIZE, MAX_CHUNKS, TAG_SIZE};

/// Length prefix in front of every frame
const FRAME_PREFIX_SIZE: usize = 4;

/// Progress callback, invoked once per completed chunk
pub type ProgressFn<'a> = dyn Fn(ChunkProgress) + Send + Sync + 'a;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Zero-based index of the chunk just finished
    pub chunk_index: u32,
    pub total_chunks: u32,
    /// Plaintext bytes processed so far
    pub bytes_processed: u64,
    pub total_bytes: u64,
}

impl ChunkProgress {
    /// Fraction complete in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return f64::from(self.chunk_index + 1) / f64::from(self.total_chunks.max(1));
        }
        self.bytes_processed as f64 / self.total_bytes as f64
    }
}

/// Derive the IV for chunk `index`: `baseIV` with its last 4 bytes XORed by
/// the big-endian index.
pub fn chunk_iv(base_iv: &[u8; IV_SIZE], index: u32) -> [u8; IV_SIZE] {
    let mut iv = *base_iv;
    for (byte, mask) in iv[IV_SIZE - 4..].iter_mut().zip(index.to_be_bytes()) {
        *byte ^= mask;
    }
    iv
}

/// Number of chunks `total_len` bytes split into. Empty input still gets one chunk.
pub fn chunk_count(total_len: u64, chunk_size: usize) -> VaultResult<u32> {
    if chunk_size == 0 || chunk_size > u32::MAX as usize - TAG_SIZE {
        return Err(ValidationError::InvalidChunkSize(chunk_size).into());
    }
    let chunks = total_len.div_ceil(chunk_size as u64).max(1);
    if chunks > u64::from(MAX_CHUNKS) {
        return Err(ValidationError::PayloadTooLarge {
            chunks,
            max: MAX_CHUNKS,
        }
        .into());
    }
    Ok(chunks as u32)
}

/// Encrypt `total_len` bytes read from `reader` into chunked format on `writer`.
///
/// Holds at most one plaintext chunk and its ciphertext at a time. Fails with
/// `Format` if the reader yields fewer or more than `total_len` bytes.
///
/// Returns the number of chunks written.
pub fn encrypt_chunked_stream<R: Read, W: Write>(
    mut reader: R,
    total_len: u64,
    mut writer: W,
    key: &SymmetricKey,
    chunk_size: usize,
    on_progress: Option<&ProgressFn<'_>>,
) -> VaultResult<u32> {
    key.require_encrypt()?;
    let total_chunks = chunk_count(total_len, chunk_size)?;
    let base_iv = random::array::<IV_SIZE>()?;

    writer.write_all(&total_chunks.to_le_bytes())?;
    writer.write_all(&base_iv)?;

    let buf_len = usize::try_from(total_len).unwrap_or(usize::MAX).min(chunk_size);
    let mut buf = Zeroizing::new(vec![0u8; buf_len]);
    let mut processed = 0u64;

    for index in 0..total_chunks {
        let this_len = (total_len - processed).min(chunk_size as u64) as usize;
        let chunk = &mut buf[..this_len];
        reader.read_exact(chunk).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => VaultError::Format(format!(
                "input ended early: expected {total_len} bytes, chunk {index} incomplete"
            )),
            _ => VaultError::Io(e),
        })?;

        let ciphertext = aes_seal(key.as_bytes(), &chunk_iv(&base_iv, index), chunk)?;
        writer.write_all(&(ciphertext.len() as u32).to_le_bytes())?;
        writer.write_all(&ciphertext)?;

        processed += this_len as u64;
        if let Some(cb) = on_progress {
            cb(ChunkProgress {
                chunk_index: index,
                total_chunks,
                bytes_processed: processed,
                total_bytes: total_len,
            });
        }
    }

    let mut probe = [0u8; 1];
    if reader.read(&mut probe)? != 0 {
        return Err(VaultError::Format(format!(
            "input longer than the declared {total_len} bytes"
        )));
    }

    writer.flush()?;
    debug!(total_chunks, bytes = total_len, "chunked encryption complete");
    Ok(total_chunks)
}

/// Encrypt an in-memory payload in chunked format.
pub fn encrypt_chunked(
    plaintext: &[u8],
    key: &SymmetricKey,
    chunk_size: usize,
    on_progress: Option<&ProgressFn<'_>>,
) -> VaultResult<Vec<u8>> {
    let total_chunks = chunk_count(plaintext.len() as u64, chunk_size)?;
    let capacity = CHUNK_HEADER_SIZE
        + plaintext.len()
        + total_chunks as usize * (FRAME_PREFIX_SIZE + TAG_SIZE);

    let mut out = Vec::with_capacity(capacity);
    encrypt_chunked_stream(plaintext, plaintext.len() as u64, &mut out, key, chunk_size, on_progress)?;
    Ok(out)
}

/// Decrypt a chunked blob.
///
/// The frame layout is validated before any chunk is decrypted. A failing tag
/// on any chunk aborts with `AuthenticationFailed`; plaintext decoded so far is
/// zeroized and never returned.
pub fn decrypt_chunked(
    blob: &[u8],
    key: &SymmetricKey,
    on_progress: Option<&ProgressFn<'_>>,
) -> VaultResult<Vec<u8>> {
    key.require_decrypt()?;
    let layout = ChunkLayout::parse(blob).map_err(VaultError::Format)?;
    let total_chunks = layout.frames.len() as u32;
    let total_bytes = layout.plaintext_len() as u64;

    // Exact capacity: the buffer never reallocates, so no stale plaintext copies are left behind.
    let mut out = Zeroizing::new(Vec::with_capacity(layout.plaintext_len()));

    for (index, frame) in layout.frames.iter().enumerate() {
        let index = index as u32;
        let plain = aes_open(key.as_bytes(), &chunk_iv(&layout.base_iv, index), &blob[frame.clone()])
            .map_err(|_| {
                VaultError::AuthenticationFailed(format!(
                    "chunk {index} of {total_chunks} failed authentication: wrong key or corrupted data"
                ))
            })?;
        let plain = Zeroizing::new(plain);
        out.extend_from_slice(&plain);

        if let Some(cb) = on_progress {
            cb(ChunkProgress {
                chunk_index: index,
                total_chunks,
                bytes_processed: out.len() as u64,
                total_bytes,
            });
        }
    }

    debug!(total_chunks, bytes = out.len(), "chunked decryption complete");
    Ok(std::mem::take(&mut *out))
}

/// Parsed structure of a chunked blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChunkLayout {
    pub base_iv: [u8; IV_SIZE],
    /// Byte ranges of each `ciphertext || tag` frame within the blob
    pub frames: Vec<Range<usize>>,
}

impl ChunkLayout {
    /// Walk the header and every length prefix. Succeeds only if the frames
    /// consume the blob exactly.
    pub fn parse(blob: &[u8]) -> Result<Self, String> {
        if blob.len() < CHUNK_HEADER_SIZE {
            return Err(format!(
                "chunked blob too short for header: {} bytes (minimum {CHUNK_HEADER_SIZE})",
                blob.len()
            ));
        }
        let count = read_u32_le(blob, 0).ok_or("missing chunk count")?;
        if count == 0 || count > MAX_CHUNKS {
            return Err(format!("implausible chunk count {count} (expected 1..={MAX_CHUNKS})"));
        }
        let min_size = CHUNK_HEADER_SIZE as u64 + u64::from(count) * (FRAME_PREFIX_SIZE + TAG_SIZE) as u64;
        if (blob.len() as u64) < min_size {
            return Err(format!(
                "blob of {} bytes cannot hold {count} chunks (minimum {min_size})",
                blob.len()
            ));
        }

        let mut base_iv = [0u8; IV_SIZE];
        base_iv.copy_from_slice(&blob[4..CHUNK_HEADER_SIZE]);

        let mut frames = Vec::with_capacity(count as usize);
        let mut offset = CHUNK_HEADER_SIZE;
        for index in 0..count {
            let len = read_u32_le(blob, offset)
                .ok_or_else(|| format!("chunk {index}: length prefix truncated"))? as usize;
            if len < TAG_SIZE {
                return Err(format!("chunk {index}: frame of {len} bytes is shorter than a tag"));
            }
            let start = offset + FRAME_PREFIX_SIZE;
            let end = start
                .checked_add(len)
                .filter(|end| *end <= blob.len())
                .ok_or_else(|| format!("chunk {index}: frame of {len} bytes overruns the blob"))?;
            frames.push(start..end);
            offset = end;
        }

        if offset != blob.len() {
            return Err(format!(
                "{} trailing bytes after {count} chunks",
                blob.len() - offset
            ));
        }

        Ok(Self { base_iv, frames })
    }

    pub fn plaintext_len(&self) -> usize {
        self.frames.iter().map(|f| f.len() - TAG_SIZE).sum()
    }
}

fn read_u32_le(blob: &[u8], offset: usize) -> Option<u32> {
    let bytes = blob.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes(bytes.try_into().ok()?))
}
