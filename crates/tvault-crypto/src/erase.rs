//! Best-effort erasure of key and plaintext buffers
//!
//! Buffers below [`RANDOM_FILL_CAP`] are overwritten with random bytes and
//! then zeroed; larger ones are only zeroed. Erasure uses `zeroize`, so the
//! writes are not optimized away, but copies the allocator or the OS made
//! earlier (reallocation, swap) are out of reach. Prefer owning types that
//! zeroize on drop ([`crate::SymmetricKey`], `zeroize::Zeroizing`) and treat
//! this as defense in depth.

use rand::RngCore;
use zeroize::Zeroize;

/// Largest buffer that gets a random overwrite before zeroing (64 KiB)
pub const RANDOM_FILL_CAP: usize = 65_536;

/// Overwrite every buffer in place.
pub fn secure_erase(buffers: &mut [&mut [u8]]) {
    for buf in buffers.iter_mut() {
        if buf.len() < RANDOM_FILL_CAP {
            // A failing RNG still leaves the zeroing pass below.
            let _ = rand::rngs::OsRng.try_fill_bytes(buf);
        }
        buf.zeroize();
    }
}

/// Erase and clear a vector, including its spare capacity.
pub fn secure_erase_vec(buf: &mut Vec<u8>) {
    secure_erase(&mut [buf.as_mut_slice()]);
    buf.zeroize();
}
