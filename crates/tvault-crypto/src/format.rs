//! Format detection and size-based dispatch between standard and chunked mode
//!
//! Neither wire format carries a discriminator byte. A blob is classified as
//! chunked only when its header and every length prefix describe the blob
//! exactly; everything else long enough to hold an IV and a tag is standard.
//! The heuristic is inherited from the wire format; a future revision should
//! add an explicit format tag.

use tracing::debug;
use tvault_core::{VaultError, VaultResult};

use crate::chunked::{self, ChunkLayout, ChunkProgress, ProgressFn};
use crate::keys::SymmetricKey;
use crate::standard;
use crate::{CHUNK_THRESHOLD, IV_SIZE, TAG_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobFormat {
    Standard,
    Chunked,
    Unknown,
}

impl std::fmt::Display for BlobFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BlobFormat::Standard => "standard",
            BlobFormat::Chunked => "chunked",
            BlobFormat::Unknown => "unknown",
        })
    }
}

/// Output of [`encrypt_smart`]
pub struct SealedBlob {
    pub bytes: Vec<u8>,
    pub format: BlobFormat,
    /// 1 for standard blobs
    pub total_chunks: u32,
    pub plaintext_len: u64,
}

impl std::fmt::Debug for SealedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedBlob")
            .field("len", &self.bytes.len())
            .field("format", &self.format)
            .field("total_chunks", &self.total_chunks)
            .field("plaintext_len", &self.plaintext_len)
            .finish()
    }
}

/// Classify a blob as standard, chunked, or unknown.
pub fn detect_format(blob: &[u8]) -> BlobFormat {
    if ChunkLayout::parse(blob).is_ok() {
        BlobFormat::Chunked
    } else if blob.len() >= IV_SIZE + TAG_SIZE {
        BlobFormat::Standard
    } else {
        BlobFormat::Unknown
    }
}

/// Encrypt in chunked mode when `plaintext` is at least [`CHUNK_THRESHOLD`]
/// bytes (inclusive), otherwise in standard mode.
pub fn encrypt_smart(
    plaintext: &[u8],
    key: &SymmetricKey,
    chunk_size: usize,
    on_progress: Option<&ProgressFn<'_>>,
) -> VaultResult<SealedBlob> {
    let plaintext_len = plaintext.len() as u64;

    if plaintext.len() >= CHUNK_THRESHOLD {
        let total_chunks = chunked::chunk_count(plaintext_len, chunk_size)?;
        debug!(bytes = plaintext_len, total_chunks, "encrypting in chunked mode");
        let bytes = chunked::encrypt_chunked(plaintext, key, chunk_size, on_progress)?;
        return Ok(SealedBlob {
            bytes,
            format: BlobFormat::Chunked,
            total_chunks,
            plaintext_len,
        });
    }

    debug!(bytes = plaintext_len, "encrypting in standard mode");
    let bytes = standard::encrypt_standard(plaintext, key)?;
    if let Some(cb) = on_progress {
        cb(ChunkProgress {
            chunk_index: 0,
            total_chunks: 1,
            bytes_processed: plaintext_len,
            total_bytes: plaintext_len,
        });
    }
    Ok(SealedBlob {
        bytes,
        format: BlobFormat::Standard,
        total_chunks: 1,
        plaintext_len,
    })
}

/// Decrypt a blob of either format, dispatching on [`detect_format`].
pub fn decrypt_smart(
    blob: &[u8],
    key: &SymmetricKey,
    on_progress: Option<&ProgressFn<'_>>,
) -> VaultResult<Vec<u8>> {
    match detect_format(blob) {
        BlobFormat::Chunked => chunked::decrypt_chunked(blob, key, on_progress),
        BlobFormat::Standard => standard::decrypt_standard(blob, key),
        BlobFormat::Unknown => Err(VaultError::Format(format!(
            "blob of {} bytes matches no known format",
            blob.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::encrypt_chunked;
    use crate::keys::generate_key;
    use crate::standard::encrypt_standard;
    use crate::CHUNK_SIZE;

    const MIB: usize = 1024 * 1024;

    fn make_data(size: usize) -> Vec<u8> {
        (0..size).map(|i| (i.wrapping_mul(13) ^ (i >> 7)) as u8).collect()
    }

    #[test]
    fn test_short_blobs_never_chunked() {
        for len in 0..16 {
            let blob = vec![0x01u8; len];
            assert_ne!(detect_format(&blob), BlobFormat::Chunked, "len {len}");
        }
        // a header claiming one chunk but with no room for it
        let mut blob = 1u32.to_le_bytes().to_vec();
        blob.extend_from_slice(&[0u8; 11]);
        assert_eq!(detect_format(&blob), BlobFormat::Unknown);
    }

    #[test]
    fn test_standard_blobs_never_misclassified() {
        let key = generate_key().unwrap();
        for i in 0..2000 {
            let blob = encrypt_standard(&make_data(i % 300), &key).unwrap();
            assert_eq!(detect_format(&blob), BlobFormat::Standard, "iteration {i}");
        }
    }

    #[test]
    fn test_chunked_blobs_detected() {
        let key = generate_key().unwrap();
        for size in [0, 1, 100, 1000] {
            let blob = encrypt_chunked(&make_data(size), &key, 64, None).unwrap();
            assert_eq!(detect_format(&blob), BlobFormat::Chunked, "size {size}");
        }
    }

    #[test]
    fn test_zero_byte_file_uses_standard_path() {
        let key = generate_key().unwrap();

        let sealed = encrypt_smart(b"", &key, CHUNK_SIZE, None).unwrap();
        assert_eq!(sealed.format, BlobFormat::Standard);
        assert_eq!(sealed.total_chunks, 1);

        let decrypted = decrypt_smart(&sealed.bytes, &key, None).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let key = generate_key().unwrap();

        let below = encrypt_smart(&make_data(CHUNK_THRESHOLD - 1), &key, CHUNK_SIZE, None).unwrap();
        assert_eq!(below.format, BlobFormat::Standard);

        let at = encrypt_smart(&make_data(CHUNK_THRESHOLD), &key, CHUNK_SIZE, None).unwrap();
        assert_eq!(at.format, BlobFormat::Chunked);
        assert_eq!(at.total_chunks, 50);
        assert_eq!(detect_format(&at.bytes), BlobFormat::Chunked);
    }

    #[test]
    fn test_smart_roundtrip_boundary_sizes() {
        let key = generate_key().unwrap();
        let sizes = [
            0,
            1,
            MIB - 1,
            MIB,
            MIB + 1,
            CHUNK_THRESHOLD - 1,
            CHUNK_THRESHOLD,
            CHUNK_THRESHOLD + 1,
        ];

        for size in sizes {
            let data = make_data(size);
            let sealed = encrypt_smart(&data, &key, CHUNK_SIZE, None).unwrap();
            assert_eq!(sealed.plaintext_len, size as u64);

            let decrypted = decrypt_smart(&sealed.bytes, &key, None).unwrap();
            assert!(decrypted == data, "round-trip failed for size {size}");
        }
    }

    #[test]
    fn test_smart_wrong_key_rejected_both_paths() {
        let key = generate_key().unwrap();
        let other = generate_key().unwrap();

        let small = encrypt_smart(&make_data(10), &key, CHUNK_SIZE, None).unwrap();
        assert!(matches!(
            decrypt_smart(&small.bytes, &other, None),
            Err(VaultError::AuthenticationFailed(_))
        ));

        let chunked = encrypt_chunked(&make_data(3000), &key, 1024, None).unwrap();
        assert!(matches!(
            decrypt_smart(&chunked, &other, None),
            Err(VaultError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_unknown_format_rejected() {
        let key = generate_key().unwrap();
        assert!(matches!(
            decrypt_smart(&[0u8; 5], &key, None),
            Err(VaultError::Format(_))
        ));
    }

    #[test]
    fn test_standard_path_reports_single_progress_event() {
        let key = generate_key().unwrap();
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let cb = |p: ChunkProgress| {
            assert_eq!(p.total_chunks, 1);
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        };

        encrypt_smart(b"tiny", &key, CHUNK_SIZE, Some(&cb)).unwrap();
        assert_eq!(calls.into_inner(), 1);
    }

    #[test]
    fn test_format_display() {
        assert_eq!(BlobFormat::Chunked.to_string(), "chunked");
        assert_eq!(BlobFormat::Standard.to_string(), "standard");
    }
}
