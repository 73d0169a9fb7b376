//! AES-256-GCM backed keychain.
//!
//! Each value is sealed under the provider's symmetric key with the
//! namespace identifier as associated data, then stored as Base64 text in
//! the namespace's preferences. An envelope copied into another namespace
//! therefore fails to open there.

use std::sync::Arc;

use sealbox_prefs::{PreferenceStore, Preferences};

use crate::aead::{AeadCipher, AesGcmCipher, SymmetricKey};
use crate::encoding;
use crate::error::{KeychainError, Result};
use crate::keychain::Keychain;
use crate::lock::NamespaceLock;
use crate::marker;
use crate::provider::SymmetricKeyProvider;
use crate::reserved::{is_reserved_key, require_not_reserved};

/// Keychain whose values are encrypted at rest.
pub struct EncryptedKeychain {
    pub(crate) identifier: String,
    pub(crate) prefs: Preferences,
    pub(crate) provider: Arc<dyn SymmetricKeyProvider>,
    pub(crate) cipher: Arc<dyn AeadCipher>,
    pub(crate) lock: NamespaceLock,
}

impl EncryptedKeychain {
    /// Open the namespace `identifier` of `store`.
    ///
    /// The handle gets a private lock, so two handles built here for the same
    /// namespace are not serialised against each other. Pass the registry
    /// lock with `with_lock(locks.lock_for(identifier))`, or obtain handles
    /// from [`KeychainFactory`](crate::KeychainFactory), which does that.
    pub fn new(
        store: &PreferenceStore,
        identifier: &str,
        provider: Arc<dyn SymmetricKeyProvider>,
    ) -> Result<Self> {
        if identifier.is_empty() {
            return Err(KeychainError::InvalidIdentifier(identifier.to_string()));
        }
        Ok(Self {
            identifier: identifier.to_string(),
            prefs: store.namespace(identifier)?,
            provider,
            cipher: Arc::new(AesGcmCipher),
            lock: NamespaceLock::default(),
        })
    }

    /// Replace the AEAD primitive.
    pub fn with_cipher(mut self, cipher: Arc<dyn AeadCipher>) -> Self {
        self.cipher = cipher;
        self
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

    /// Raw preferences of the namespace, as stored on disk.
    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// Whether the namespace carries the current version marker.
    pub fn has_encrypted_content(&self) -> Result<bool> {
        let _guard = self.lock.acquire()?;
        marker::is_encrypted_content(&self.prefs)
    }

    /// Fetch the symmetric key, logging the failure when there is none.
    pub(crate) fn master_key(&self) -> Option<SymmetricKey> {
        match self.provider.get_or_create_key(false) {
            Ok(key) => Some(key),
            Err(err) => {
                tracing::error!(
                    identifier = %self.identifier,
                    error = %err,
                    "symmetric key is not available"
                );
                None
            }
        }
    }

    fn aad(&self) -> &[u8] {
        self.identifier.as_bytes()
    }

    /// Read and open `key`. The caller holds the namespace lock.
    fn read_locked(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(text) = self.prefs.get_text(key)? else {
            return Ok(None);
        };
        let Some(envelope) = encoding::decode_stored(&text) else {
            return Ok(None);
        };
        let Some(master) = self.master_key() else {
            return Ok(None);
        };
        match self.cipher.open(&envelope, &master, self.aad()) {
            Ok(plaintext) => Ok(Some(plaintext)),
            Err(err) => {
                tracing::debug!(
                    identifier = %self.identifier,
                    key,
                    error = %err,
                    "stored value could not be opened"
                );
                Ok(None)
            }
        }
    }

    /// Seal `plaintext` for this namespace.
    pub(crate) fn seal_with(&self, master: &SymmetricKey, plaintext: &[u8]) -> Result<String> {
        let envelope = self.cipher.seal(plaintext, master, self.aad())?;
        Ok(encoding::encode(&envelope))
    }
}

impl Keychain for EncryptedKeychain {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn is_encrypted(&self) -> bool {
        true
    }

    fn contains(&self, key: &str) -> Result<bool> {
        require_not_reserved(key)?;
        let _guard = self.lock.acquire()?;
        Ok(self.read_locked(key)?.is_some())
    }

    fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        require_not_reserved(key)?;
        let _guard = self.lock.acquire()?;
        self.read_locked(key)
    }

    fn put_bytes(&self, key: &str, value: &[u8]) -> Result<()> {
        require_not_reserved(key)?;
        let _guard = self.lock.acquire()?;

        let Some(master) = self.master_key() else {
            tracing::warn!(identifier = %self.identifier, key, "write dropped: no key");
            return Ok(());
        };
        let stored = match self.seal_with(&master, value) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(
                    identifier = %self.identifier,
                    key,
                    error = %err,
                    "write dropped: seal failed"
                );
                return Ok(());
            }
        };
        self.prefs.edit().put_text(key, &stored).apply()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        require_not_reserved(key)?;
        let _guard = self.lock.acquire()?;
        self.prefs.edit().remove(key).apply()?;
        Ok(())
    }

    fn remove_all(&self) -> Result<()> {
        let _guard = self.lock.acquire()?;
        let mut editor = self.prefs.edit();
        editor.clear();
        marker::stamp(&mut editor);
        editor.apply()?;
        tracing::debug!(identifier = %self.identifier, "keychain cleared");
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

impl std::fmt::Debug for EncryptedKeychain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedKeychain")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}
