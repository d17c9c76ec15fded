//! Pre-flight checks, run before any key is generated or any byte is read.

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use tvault_core::types::MessageRecord;
use tvault_core::{ValidationError, VaultResult};
use tvault_crypto::validate_address;

use crate::engine::{Recipient, SendRequest};

/// Check a seal request against the clock `now`.
pub fn validate_send(request: &SendRequest, now: DateTime<Utc>) -> VaultResult<()> {
    if request.media.is_empty() {
        return Err(ValidationError::MissingMedia.into());
    }

    validate_address(&request.sender)?;
    match &request.recipient {
        Recipient::Address(address) => {
            validate_address(address)?;
            if address.eq_ignore_ascii_case(&request.sender) {
                return Err(ValidationError::SenderIsRecipient.into());
            }
        }
        Recipient::Passphrase(passphrase) => {
            if passphrase.expose_secret().is_empty() {
                return Err(ValidationError::EmptyPassphrase.into());
            }
        }
    }

    if request.unlock_at <= now {
        return Err(ValidationError::UnlockTimeNotInFuture {
            unlock_at: request.unlock_at.to_rfc3339(),
            now: now.to_rfc3339(),
        }
        .into());
    }
    Ok(())
}

/// Refuse to open `record` before its unlock time.
pub fn check_unlocked(record: &MessageRecord, now: DateTime<Utc>) -> VaultResult<()> {
    if now < record.unlock_at {
        return Err(ValidationError::StillLocked(record.unlock_at.to_rfc3339()).into());
    }
    Ok(())
}
