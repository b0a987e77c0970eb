//! # Secret Value Comparator
//!
//! Decides what the observed `encrypted_value` of a parameter is.
//!
//! The declared ciphertext is decrypted and compared with the plaintext
//! Parameter Store currently holds. A match keeps the declared ciphertext,
//! anything else is reported as [`OUTDATED_VALUE_SENTINEL`] so the next plan
//! shows a change without the plaintext ever leaving this module.

use crate::constants::OUTDATED_VALUE_SENTINEL;
use crate::observability::metrics;
use crate::provider::{DecryptError, Decryptor};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Outcome of comparing the declared ciphertext with the stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// The stored plaintext is what the declared ciphertext decrypts to
    Current,
    /// The stored plaintext differs, or the ciphertext cannot be decrypted
    /// with the declared key
    Stale,
}

impl Comparison {
    /// Value to record as the observed `encrypted_value`
    #[must_use]
    pub fn observed_value(self, declared: &str) -> String {
        match self {
            Comparison::Current => declared.to_string(),
            Comparison::Stale => OUTDATED_VALUE_SENTINEL.to_string(),
        }
    }
}

/// Decode a standard-alphabet base64 ciphertext
///
/// # Errors
///
/// Returns the decoder error when `encrypted_value` is not valid base64.
pub fn decode_ciphertext(encrypted_value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encrypted_value)
}

/// Decrypt already-decoded ciphertext with the declared key
///
/// # Errors
///
/// Propagates the decryption service failure.
pub async fn decrypt_declared(
    decryptor: &dyn Decryptor,
    encryption_key: &str,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    decryptor.decrypt(encryption_key, ciphertext).await
}

/// Compare the stored plaintext with what the declared ciphertext decrypts to
///
/// "Wrong key" and "not a ciphertext" failures count as [`Comparison::Stale`];
/// every other decryption failure is returned.
///
/// # Errors
///
/// Returns operational decryption failures (key disabled, access denied,
/// transport errors).
pub async fn compare(
    decryptor: &dyn Decryptor,
    encryption_key: &str,
    ciphertext: &[u8],
    stored: &str,
) -> Result<Comparison, DecryptError> {
    let declared = match decrypt_declared(decryptor, encryption_key, ciphertext).await {
        Ok(plaintext) => plaintext,
        Err(e) if e.is_undecryptable() => {
            warn!(key = %encryption_key, error = %e, "Declared ciphertext cannot be decrypted with the declared key");
            metrics::increment_stale_values();
            return Ok(Comparison::Stale);
        }
        Err(e) => return Err(e),
    };

    if declared.as_slice() == stored.as_bytes() {
        Ok(Comparison::Current)
    } else {
        debug!(key = %encryption_key, "Stored value differs from declared ciphertext");
        metrics::increment_stale_values();
        Ok(Comparison::Stale)
    }
}
