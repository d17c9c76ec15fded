//! tvault-crypto: client-side cryptographic core for time-locked messages
//!
//! Pipeline: plaintext → AES-256-GCM (standard or chunked) → SHA-256 digest of ciphertext → wrap key
//!
//! Blob formats:
//! ```text
//! standard: [12 bytes: IV][ciphertext][16 bytes: tag]
//! chunked:  [u32le chunkCount][12 bytes: baseIV]{[u32le len][ciphertext + tag]} x chunkCount
//!           chunk IV = baseIV with bytes 8..12 XORed by the big-endian chunk index
//! ```
//!
//! Key wrapping:
//! ```text
//! address path (v2):  addressKey = SHA-256("wrap-v2:" || lowercase(address))
//!                     K = HKDF-SHA256(SHA-256(E || addressKey), salt, "tvault-wrap-v2")
//! passphrase path:    K = PBKDF2-SHA256(passphrase, salt16, 100_000)
//! ```

pub mod chunked;
pub mod digest;
pub mod erase;
pub mod format;
pub mod keys;
pub mod passphrase;
pub mod standard;
pub mod wrap;

mod random;

pub use chunked::{chunk_count, chunk_iv, decrypt_chunked, encrypt_chunked, encrypt_chunked_stream, ChunkProgress, ProgressFn};
pub use digest::{hash, verify_hash, IntegrityDigest};
pub use erase::{secure_erase, secure_erase_vec};
pub use format::{decrypt_smart, detect_format, encrypt_smart, BlobFormat, SealedBlob};
pub use keys::{generate_key, KeyUsages, SymmetricKey};
pub use passphrase::{unwrap_with_passphrase, wrap_with_passphrase};
pub use standard::{decrypt_standard, encrypt_standard};
pub use wrap::{address_key, is_addressed_to, unwrap, validate_address, wrap};

/// Size of an AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM IV (96-bit, the GCM-recommended length)
pub const IV_SIZE: usize = 12;

/// Size of an AES-GCM authentication tag (128-bit)
pub const TAG_SIZE: usize = 16;

/// Chunk size used by chunked mode unless the caller picks another (1 MiB)
pub const CHUNK_SIZE: usize = 1_048_576;

/// Payloads at or above this size are encrypted in chunked mode (50 MiB)
pub const CHUNK_THRESHOLD: usize = 52_428_800;

/// Largest chunk count the format detector accepts
pub const MAX_CHUNKS: u32 = 10_000;

/// `[u32le chunkCount][baseIV]`
pub const CHUNK_HEADER_SIZE: usize = 4 + IV_SIZE;
