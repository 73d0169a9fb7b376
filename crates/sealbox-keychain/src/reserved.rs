//! Keys reserved for keychain metadata.
//!
//! Reserved keys share the namespace with user entries but are invisible to
//! the [`Keychain`](crate::Keychain) accessors: any read, write or removal
//! naming one fails with [`KeychainError::ReservedKey`] before the store is
//! touched.

use crate::error::{KeychainError, Result};
use crate::marker::VERSION_KEY;

/// Every key the keychain keeps for itself.
pub const RESERVED_KEYS: &[&str] = &[VERSION_KEY];

/// Whether `key` is reserved for keychain metadata.
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// Fail with [`KeychainError::ReservedKey`] if `key` is reserved.
pub fn require_not_reserved(key: &str) -> Result<()> {
    if is_reserved_key(key) {
        tracing::error!(key = key, "rejected operation on reserved key");
        return Err(KeychainError::ReservedKey {
            key: key.to_string(),
        });
    }
    Ok(())
}
