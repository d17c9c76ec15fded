//! CSPRNG access. A failing OS RNG surfaces as `PlatformUnavailable`.

use rand::rngs::OsRng;
use rand::RngCore;
use tvault_core::{VaultError, VaultResult};

pub(crate) fn fill(buf: &mut [u8]) -> VaultResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| VaultError::PlatformUnavailable(format!("OS random source failed: {e}")))
}

pub(crate) fn array<const N: usize>() -> VaultResult<[u8; N]> {
    let mut out = [0u8; N];
    fill(&mut out)?;
    Ok(out)
}
