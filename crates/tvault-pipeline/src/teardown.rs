//! Scoped erasure of per-message secrets

use std::sync::Arc;

use tracing::debug;
use tvault_crypto::{secure_erase_vec, SymmetricKey};

/// Holds the message key and intermediate ciphertext for one operation.
///
/// Dropping it erases both, whichever way the operation ends: success, an
/// early `?` return, a panic in a crypto worker, or a cancelled future. The
/// key is shared with blocking workers through an `Arc`; its bytes are
/// zeroized when the last reference goes.
#[derive(Default)]
pub(crate) struct Scratch {
    key: Option<Arc<SymmetricKey>>,
    pub(crate) ciphertext: Vec<u8>,
}

impl Scratch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn hold_key(&mut self, key: SymmetricKey) -> Arc<SymmetricKey> {
        let key = Arc::new(key);
        self.key = Some(key.clone());
        key
    }

    /// Give up the key once nothing later in the operation needs it.
    pub(crate) fn release_key(&mut self) {
        if self.key.take().is_some() {
            debug!("message key released");
        }
    }

    fn erase(&mut self) {
        let ciphertext_len = self.ciphertext.len();
        secure_erase_vec(&mut self.ciphertext);
        let had_key = self.key.take().is_some();
        debug!(ciphertext_len, had_key, "scratch erased");
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        self.erase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvault_crypto::generate_key;

    #[test]
    fn test_erase_clears_ciphertext_and_key() {
        let mut scratch = Scratch::new();
        let key = scratch.hold_key(generate_key().unwrap());
        scratch.ciphertext = vec![0xAB; 4096];
        assert_eq!(Arc::strong_count(&key), 2);

        scratch.erase();
        assert!(scratch.ciphertext.is_empty());
        assert!(scratch.key.is_none());
        assert_eq!(Arc::strong_count(&key), 1);
    }

    #[test]
    fn test_drop_releases_key() {
        let mut scratch = Scratch::new();
        let key = scratch.hold_key(generate_key().unwrap());
        scratch.ciphertext = vec![0xAB; 4096];

        drop(scratch);
        assert_eq!(Arc::strong_count(&key), 1);
    }

    #[test]
    fn test_release_key_keeps_ciphertext() {
        let mut scratch = Scratch::new();
        let key = scratch.hold_key(generate_key().unwrap());
        scratch.ciphertext = vec![3; 32];

        scratch.release_key();
        assert_eq!(Arc::strong_count(&key), 1);
        assert_eq!(scratch.ciphertext, vec![3; 32]);

        // Releasing twice is harmless.
        scratch.release_key();
        assert!(scratch.key.is_none());
    }

    #[test]
    fn test_erased_on_panic() {
        let mut scratch = Scratch::new();
        let key = scratch.hold_key(generate_key().unwrap());
        scratch.ciphertext = vec![1; 64];

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _held = scratch;
            panic!("crypto worker blew up");
        }));

        assert!(result.is_err());
        assert_eq!(Arc::strong_count(&key), 1);
    }
}
