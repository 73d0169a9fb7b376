//! The [`Keychain`] trait and its two backends.
//!
//! - [`EncryptedKeychain`] seals every value with AES-256-GCM under a key
//!   held by a [`SymmetricKeyProvider`](crate::provider::SymmetricKeyProvider).
//! - [`LegacyKeychain`] stores values as plain text and exists for devices
//!   whose key provider fails the self-test.
//!
//! Callers normally obtain a keychain from
//! [`KeychainFactory`](crate::factory::KeychainFactory), which picks the
//! backend per namespace.

mod encrypted;
mod legacy;

pub use encrypted::EncryptedKeychain;
pub use legacy::LegacyKeychain;

use crate::error::Result;
use crate::reserved;

/// Per-namespace string → bytes store.
///
/// Every operation on one namespace is serialised; a read interleaved with
/// a write observes either the state before or after the write. Operations
/// naming a reserved key fail with
/// [`KeychainError::ReservedKey`](crate::KeychainError::ReservedKey) and
/// leave the store untouched.
pub trait Keychain: Send + Sync {
    /// The namespace identifier.
    fn identifier(&self) -> &str;

    /// Whether values are encrypted at rest.
    fn is_encrypted(&self) -> bool;

    /// Whether `key` is reserved for keychain metadata.
    fn is_reserved_key(&self, key: &str) -> bool {
        reserved::is_reserved_key(key)
    }

    /// Whether [`get_bytes`](Self::get_bytes) would return a value.
    fn contains(&self, key: &str) -> Result<bool>;

    /// Read the bytes stored under `key`.
    ///
    /// `Ok(None)` covers every "no value" case: no entry, an entry that
    /// cannot be opened, or a key provider that cannot supply a key.
    fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`.
    fn put_bytes(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove the entry under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Remove every user entry of the namespace.
    fn remove_all(&self) -> Result<()>;

    /// Keys of every user entry, sorted. Reserved keys are never listed.
    fn keys(&self) -> Result<Vec<String>>;

    /// Read the value under `key` as UTF-8 text. Malformed sequences are
    /// replaced with U+FFFD.
    fn get_text(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .get_bytes(key)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Store `text` under `key` as its UTF-8 bytes.
    fn put_text(&self, key: &str, text: &str) -> Result<()> {
        self.put_bytes(key, text.as_bytes())
    }

    /// Store `value`, or remove the entry when `value` is `None`.
    fn put_optional_bytes(&self, key: &str, value: Option<&[u8]>) -> Result<()> {
        match value {
            Some(bytes) => self.put_bytes(key, bytes),
            None => self.remove(key),
        }
    }

    /// Store `text`, or remove the entry when `text` is `None`.
    fn put_optional_text(&self, key: &str, text: Option<&str>) -> Result<()> {
        match text {
            Some(text) => self.put_text(key, text),
            None => self.remove(key),
        }
    }
}
