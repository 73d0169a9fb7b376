//! Plaintext keychain for devices without a working key provider.
//!
//! Text values are stored verbatim and byte values as Base64 in the
//! platform default (76-column, line-wrapped) form. This is the layout the
//! legacy import reads back, so a namespace written here can later be moved
//! to encrypted storage without loss.

use sealbox_prefs::{PreferenceStore, Preferences};

use crate::encoding;
use crate::error::{KeychainError, Result};
use crate::keychain::Keychain;
use crate::lock::NamespaceLock;
use crate::reserved::{is_reserved_key, require_not_reserved};

/// Keychain that stores values without encryption.
#[derive(Debug)]
pub struct LegacyKeychain {
    identifier: String,
    prefs: Preferences,
    lock: NamespaceLock,
}

impl LegacyKeychain {
    /// Open the namespace `identifier` of `store`.
    ///
    /// Like [`EncryptedKeychain::new`](super::EncryptedKeychain::new), the
    /// handle gets a private lock until [`with_lock`](Self::with_lock) hands
    /// it a shared one.
    pub fn new(store: &PreferenceStore, identifier: &str) -> Result<Self> {
        if identifier.is_empty() {
            return Err(KeychainError::InvalidIdentifier(identifier.to_string()));
        }
        Ok(Self {
            identifier: identifier.to_string(),
            prefs: store.namespace(identifier)?,
            lock: NamespaceLock::default(),
        })
    }

    /// Serialise on `lock` instead of a private one.
    pub fn with_lock(mut self, lock: NamespaceLock) -> Self {
        self.lock = lock;
        self
    }

    /// Lock that serialises operations of this handle.
    pub fn lock(&self) -> &NamespaceLock {
        &self.lock
    }

    /// Raw preferences of the namespace.
    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    fn read_bytes_locked(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .prefs
            .get_text(key)?
            .and_then(|text| encoding::decode_lenient(&text)))
    }

    fn write_locked(&self, key: &str, stored: &str) -> Result<()> {
        self.prefs.edit().put_text(key, stored).apply()?;
        Ok(())
    }
}

impl Keychain for LegacyKeychain {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn is_encrypted(&self) -> bool {
        false
    }

    fn contains(&self, key: &str) -> Result<bool> {
        require_not_reserved(key)?;
        let _guard = self.lock.acquire()?;
        Ok(self.read_bytes_locked(key)?.is_some())
    }

    fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        require_not_reserved(key)?;
        let _guard = self.lock.acquire()?;
        self.read_bytes_locked(key)
    }

    fn put_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        require_not_reserved(key)?;
        let _guard = self.lock.acquire()?;
        self.write_locked(key, &encoding::encode_wrapped(value))
    }

    /// Text is returned exactly as stored.
    fn get_text(&self, key: &str) -> Result<Option<String>> {
        require_not_reserved(key)?;
        let _guard = self.lock.acquire()?;
        Ok(self.prefs.get_text(key)?)
    }

    fn put_text(&self, key: &str, text: &str) -> Result<()> {
        require_not_reserved(key)?;
        let _guard = self.lock.acquire()?;
        self.write_locked(key, text)
    }

    fn remove(&self, key: &str) -> Result<()> {
        require_not_reserved(key)?;
        let _guard = self.lock.acquire()?;
        self.prefs.edit().remove(key).apply()?;
        Ok(())
    }

    fn remove_all(&self) -> Result<()> {
        let _guard = self.lock.acquire()?;
        self.prefs.edit().clear().apply()?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let _guard = self.lock.acquire()?;
        Ok(self
            .prefs
            .get_all()?
            .into_keys()
            .filter(|key| !is_reserved_key(key))
            .collect())
    }
}
