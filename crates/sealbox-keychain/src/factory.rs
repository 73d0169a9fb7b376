//! Keychain bootstrapper.
//!
//! [`KeychainFactory`] hands out one shared keychain per namespace. On the
//! first request for a namespace it decides the backend:
//!
//! 1. A namespace already carrying the version marker is encrypted.
//! 2. Otherwise, if the key store self-test passes, the namespace's legacy
//!    entries are imported and the namespace becomes encrypted.
//! 3. Otherwise the namespace stays on the plaintext [`LegacyKeychain`].
//!
//! The self-test runs at most once per factory.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use sealbox_prefs::PreferenceStore;
use tracing::{debug, error, info, warn};

use crate::aead::{AeadCipher, AesGcmCipher};
use crate::config::{FactoryMode, KeychainConfig};
use crate::error::{KeychainError, Result};
use crate::keychain::{EncryptedKeychain, Keychain, LegacyKeychain};
use crate::lock::NamespaceLocks;
use crate::marker;
use crate::provider::{self, SymmetricKeyProvider};
use crate::selftest;

/// Creates and caches keychains over one preference store.
pub struct KeychainFactory {
    store: PreferenceStore,
    provider: Arc<dyn SymmetricKeyProvider>,
    cipher: Arc<dyn AeadCipher>,
    mode: FactoryMode,
    locks: NamespaceLocks,
    keychains: DashMap<String, Arc<dyn Keychain>>,
    self_test: OnceLock<bool>,
}

impl KeychainFactory {
    pub fn new(store: PreferenceStore, provider: Arc<dyn SymmetricKeyProvider>) -> Self {
        Self {
            store,
            provider,
            cipher: Arc::new(AesGcmCipher),
            mode: FactoryMode::default(),
            locks: NamespaceLocks::new(),
            keychains: DashMap::new(),
            self_test: OnceLock::new(),
        }
    }

    /// Open the store and key provider named by `config`.
    pub fn from_config(config: &KeychainConfig) -> Result<Self> {
        let db_path = config.database_path();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = PreferenceStore::open(&db_path)?;
        let provider: Arc<dyn SymmetricKeyProvider> =
            Arc::from(provider::platform_key_provider(&config.key_file()));

        info!(database = %db_path.display(), mode = %config.mode, "keychain factory ready");
        Ok(Self::new(store, provider).with_mode(config.mode))
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn AeadCipher>) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_mode(mut self, mode: FactoryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> FactoryMode {
        self.mode
    }

    pub fn store(&self) -> &PreferenceStore {
        &self.store
    }

    /// Whether encrypted storage works on this device. Cached after the
    /// first call.
    pub fn encryption_supported(&self) -> bool {
        *self.self_test.get_or_init(|| {
            selftest::verify_keystore_encryption(self.provider.as_ref(), self.cipher.as_ref())
        })
    }

    /// The keychain for `identifier`, created on first use.
    pub fn keychain(&self, identifier: &str) -> Result<Arc<dyn Keychain>> {
        if let Some(existing) = self.keychains.get(identifier) {
            return Ok(Arc::clone(existing.value()));
        }

        let built = self.build(identifier)?;
        // Another thread may have won the race; its instance is kept.
        let entry = self
            .keychains
            .entry(identifier.to_string())
            .or_insert(built);
        Ok(Arc::clone(entry.value()))
    }

    /// A fresh encrypted handle on `identifier`, sharing the namespace lock
    /// with every other handle from this factory.
    pub fn encrypted_keychain(&self, identifier: &str) -> Result<EncryptedKeychain> {
        Ok(
            EncryptedKeychain::new(&self.store, identifier, Arc::clone(&self.provider))?
                .with_cipher(Arc::clone(&self.cipher))
                .with_lock(self.locks.lock_for(identifier)),
        )
    }

    /// A fresh plaintext handle on `identifier`.
    pub fn legacy_keychain(&self, identifier: &str) -> Result<LegacyKeychain> {
        Ok(LegacyKeychain::new(&self.store, identifier)?.with_lock(self.locks.lock_for(identifier)))
    }

    /// Drop cached instances. Subsequent requests re-run backend selection;
    /// the self-test verdict is kept.
    pub fn clear_cache(&self) {
        self.keychains.clear();
    }

    fn build(&self, identifier: &str) -> Result<Arc<dyn Keychain>> {
        let encrypted = self.encrypted_keychain(identifier)?;

        if encrypted.has_encrypted_content()? {
            if self.mode == FactoryMode::LegacyOnly {
                warn!(identifier, "namespace is encrypted, ignoring legacy-only mode");
            }
            debug!(identifier, "using encrypted keychain");
            return Ok(Arc::new(encrypted));
        }

        if self.mode == FactoryMode::LegacyOnly {
            debug!(identifier, "using legacy keychain");
            return Ok(Arc::new(self.legacy_keychain(identifier)?));
        }

        if !self.encryption_supported() {
            if self.mode == FactoryMode::EncryptedOnly {
                return Err(KeychainError::KeyUnavailable);
            }
            warn!(identifier, "encryption unsupported, using legacy keychain");
            return Ok(Arc::new(self.legacy_keychain(identifier)?));
        }

        match encrypted.import_from_preferences() {
            Ok(report) => {
                if !report.dropped.is_empty() {
                    warn!(
                        identifier,
                        dropped = report.dropped.len(),
                        "legacy values of unsupported kinds were removed"
                    );
                }
                Ok(Arc::new(encrypted))
            }
            Err(err) if self.mode == FactoryMode::EncryptedOnly => Err(err),
            Err(err) => {
                error!(identifier, error = %err, "legacy import failed, using legacy keychain");
                Ok(Arc::new(self.legacy_keychain(identifier)?))
            }
        }
    }
}

impl std::fmt::Debug for KeychainFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeychainFactory")
            .field("mode", &self.mode)
            .field("cached", &self.keychains.len())
            .field("self_test", &self.self_test.get())
            .finish_non_exhaustive()
    }
}

/// Whether the namespace `identifier` of `store` is in encrypted form.
pub fn is_encrypted_namespace(store: &PreferenceStore, identifier: &str) -> Result<bool> {
    marker::is_encrypted_content(&store.namespace(identifier)?)
}
