//! Key store self-test.
//!
//! Before any namespace is moved to encrypted storage the factory checks
//! that the key provider and the AEAD primitive actually work on this
//! device: an empty and a non-empty payload must both survive a
//! seal/open round trip.

use crate::aead::AeadCipher;
use crate::error::{KeychainError, Result};
use crate::marker::VERSION_KEY;
use crate::provider::SymmetricKeyProvider;

/// Associated data used for the round trips.
pub const TEST_IDENTIFIER: &str = "TestIdentifier";

/// Run the round trips, reporting the first failure.
pub fn run_self_test(provider: &dyn SymmetricKeyProvider, cipher: &dyn AeadCipher) -> Result<()> {
    let key = provider.get_or_create_key(false)?;
    let aad = TEST_IDENTIFIER.as_bytes();

    for payload in [&[][..], VERSION_KEY.as_bytes()] {
        let envelope = cipher.seal(payload, &key, aad)?;
        let opened = cipher.open(&envelope, &key, aad)?;
        if opened != payload {
            return Err(KeychainError::OpenFailed {
                reason: format!(
                    "round trip of {} bytes returned {} different bytes",
                    payload.len(),
                    opened.len()
                ),
            });
        }
    }
    Ok(())
}

/// Whether encrypted storage is usable on this device.
///
/// Failures are logged and reported as `false`.
pub fn verify_keystore_encryption(
    provider: &dyn SymmetricKeyProvider,
    cipher: &dyn AeadCipher,
) -> bool {
    match run_self_test(provider, cipher) {
        Ok(()) => {
            tracing::debug!("keystore self-test passed");
            true
        }
        Err(err) => {
            tracing::error!(error = %err, "keystore self-test failed");
            false
        }
    }
}
