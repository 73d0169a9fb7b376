//! # sealbox-keychain
//!
//! Encrypted key-value keychain on top of [`sealbox_prefs`].
//!
//! Each namespace maps string keys to opaque byte values. Values are sealed
//! with AES-256-GCM under a symmetric key held by a
//! [`SymmetricKeyProvider`], with the namespace identifier bound in as
//! associated data, and stored as Base64 text. A namespace written by the
//! older plaintext keychain is imported into encrypted form on first access,
//! once, provided the key store passes a self-test.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use sealbox_keychain::{Keychain, KeychainFactory, MemoryKeyProvider};
//! use sealbox_prefs::PreferenceStore;
//!
//! # fn example() -> sealbox_keychain::Result<()> {
//! let store = PreferenceStore::open_in_memory()?;
//! let factory = KeychainFactory::new(store, Arc::new(MemoryKeyProvider::new()));
//!
//! let keychain = factory.keychain("session")?;
//! keychain.put_text("token", "s3cr3t")?;
//! assert_eq!(keychain.get_text("token")?.as_deref(), Some("s3cr3t"));
//! assert!(keychain.is_encrypted());
//! # Ok(())
//! # }
//! ```

pub mod aead;
pub mod config;
pub mod encoding;
pub mod error;
pub mod factory;
pub mod import;
pub mod keychain;
pub mod lock;
pub mod marker;
pub mod provider;
pub mod reserved;
pub mod selftest;

// ── re-exports ───────────────────────────────────────────────────────

pub use aead::{AeadCipher, AesGcmCipher, SymmetricKey};
pub use config::{FactoryMode, KeychainConfig};
pub use error::{KeychainError, Result};
pub use factory::{KeychainFactory, is_encrypted_namespace};
pub use import::{ImportReport, LegacyValue};
pub use keychain::{EncryptedKeychain, Keychain, LegacyKeychain};
pub use lock::{NamespaceLock, NamespaceLocks};
pub use marker::{VERSION, VERSION_KEY};
pub use provider::{FileKeyProvider, MemoryKeyProvider, SymmetricKeyProvider, platform_key_provider};
pub use selftest::verify_keystore_encryption;

#[cfg(target_os = "macos")]
pub use provider::MacOsKeyProvider;
