//! Symmetric key providers.
//!
//! The keychain never persists key material itself. It asks a
//! [`SymmetricKeyProvider`] for the namespace-wide AES key on every
//! operation and drops the handle when the operation ends. Providers wrap
//! platform-specific secure storage:
//!
//! - **macOS**: Keychain Services via `security-framework`
//! - **Fallback**: [`FileKeyProvider`], a random key wrapped under a
//!   device-derived key
//! - **Tests / ephemeral use**: [`MemoryKeyProvider`]
//!
//! # Security Notes
//!
//! - The file-based fallback is a compromise. The device-derived key can be
//!   reconstructed by anyone with access to the same machine and user
//!   account. A hardware-backed store should be preferred where available.
//! - Key files are restricted to the current user (mode 0600 on Unix).

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ring::pbkdf2;
use zeroize::Zeroize;

use crate::aead::{self, KEY_LEN, MIN_ENVELOPE_LEN, SymmetricKey};
use crate::error::{KeychainError, Result};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Source of the symmetric key used to seal and open keychain values.
///
/// Implementations must be `Send + Sync` so one provider can back every
/// namespace of a process.
pub trait SymmetricKeyProvider: Send + Sync {
    /// Return the provider's key, creating it on first use.
    ///
    /// With `force_recreate` set, any existing key is discarded and a new
    /// one generated; every value sealed under the old key becomes
    /// unreadable. The keychain always passes `false`.
    ///
    /// # Errors
    ///
    /// Returns [`KeychainError::KeyUnavailable`] or
    /// [`KeychainError::KeyProvider`] when no key can be supplied.
    fn get_or_create_key(&self, force_recreate: bool) -> Result<SymmetricKey>;
}

// ---------------------------------------------------------------------------
// In-memory provider
// ---------------------------------------------------------------------------

/// Provider that keeps its key in process memory.
///
/// The provider can be switched off with [`set_available`](Self::set_available)
/// to simulate a platform key store that stops answering.
#[derive(Default)]
pub struct MemoryKeyProvider {
    key: Mutex<Option<[u8; KEY_LEN]>>,
    unavailable: AtomicBool,
    requests: AtomicUsize,
}

impl MemoryKeyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a known key.
    pub fn with_key(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            key: Mutex::new(Some(bytes)),
            unavailable: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent request succeed (`true`) or fail (`false`).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Number of key requests served or refused so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl SymmetricKeyProvider for MemoryKeyProvider {
    fn get_or_create_key(&self, force_recreate: bool) -> Result<SymmetricKey> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(KeychainError::KeyUnavailable);
        }

        let mut slot = self
            .key
            .lock()
            .map_err(|e| KeychainError::Internal(format!("key mutex poisoned: {e}")))?;

        if force_recreate || slot.is_none() {
            let fresh = SymmetricKey::generate()?;
            *slot = Some(*fresh.as_bytes());
        }

        match slot.as_ref() {
            Some(bytes) => SymmetricKey::from_bytes(bytes),
            None => Err(KeychainError::KeyUnavailable),
        }
    }
}

impl std::fmt::Debug for MemoryKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKeyProvider")
            .field("unavailable", &self.unavailable)
            .field("requests", &self.requests)
            .finish_non_exhaustive()
    }
}

impl Drop for MemoryKeyProvider {
    fn drop(&mut self) {
        if let Ok(slot) = self.key.get_mut() {
            if let Some(bytes) = slot.as_mut() {
                bytes.zeroize();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// File-based fallback
// ---------------------------------------------------------------------------

/// Application salt mixed into the device-derived key. Changing this
/// invalidates every stored key file.
const APP_SALT: &[u8; 32] = b"sealbox-keychain-key-file-v1\x00\x00\x00\x00";

/// PBKDF2 iteration count for the device-derived wrapping key.
const PBKDF2_ITERATIONS: u32 = 600_000;

/// Associated data binding a wrapped key to its purpose.
const WRAP_AAD: &[u8] = b"sealbox:key-file";

/// Provider that stores a random key wrapped under a device-derived key.
///
/// The key file layout (binary):
/// ```text
/// [12 bytes: AES-256-GCM nonce]
/// [48 bytes: wrapped key + 16-byte tag]
/// ```
///
/// The unwrapped key is cached after the first successful load so PBKDF2
/// runs once per provider.
pub struct FileKeyProvider {
    key_file: PathBuf,
    cached: Mutex<Option<[u8; KEY_LEN]>>,
}

impl FileKeyProvider {
    /// Create a provider storing its key at `key_file`. The file is created
    /// on first use.
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        Self {
            key_file: key_file.into(),
            cached: Mutex::new(None),
        }
    }

    /// Default key file location: `<data_dir>/keychain.key`.
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join("keychain.key")
    }

    /// Path of the key file.
    pub fn key_file(&self) -> &Path {
        &self.key_file
    }

    /// Derive the wrapping key from machine-specific data.
    fn device_derived_key() -> Result<SymmetricKey> {
        let hostname = Self::hostname();
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown-user".into());

        let mut material = Vec::with_capacity(hostname.len() + username.len() + APP_SALT.len());
        material.extend_from_slice(hostname.as_bytes());
        material.extend_from_slice(username.as_bytes());
        material.extend_from_slice(APP_SALT);

        let iterations =
            NonZeroU32::new(PBKDF2_ITERATIONS).expect("PBKDF2_ITERATIONS is non-zero");
        let mut out = [0u8; KEY_LEN];
        pbkdf2::derive(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            APP_SALT,
            &material,
            &mut out,
        );
        material.zeroize();

        let key = SymmetricKey::from_bytes(&out);
        out.zeroize();
        key
    }

    fn hostname() -> String {
        #[cfg(unix)]
        {
            std::fs::read_to_string("/etc/hostname")
                .map(|s| s.trim().to_string())
                .or_else(|_| std::env::var("HOSTNAME"))
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown-host".into())
        }

        #[cfg(not(unix))]
        {
            std::env::var("COMPUTERNAME")
                .or_else(|_| std::env::var("HOSTNAME"))
                .unwrap_or_else(|_| "unknown-host".into())
        }
    }

    fn load(&self) -> Result<SymmetricKey> {
        let data = std::fs::read(&self.key_file)?;
        if data.len() < MIN_ENVELOPE_LEN + KEY_LEN {
            return Err(KeychainError::KeyProvider {
                reason: "key file is too small / corrupted".into(),
            });
        }

        let wrapping = Self::device_derived_key()?;
        let mut raw = aead::open(&data, &wrapping, WRAP_AAD).map_err(|_| {
            KeychainError::KeyProvider {
                reason: "key file cannot be unwrapped on this device".into(),
            }
        })?;
        let key = SymmetricKey::from_bytes(&raw);
        raw.zeroize();

        tracing::debug!(path = %self.key_file.display(), "loaded keychain key from file");
        key
    }

    fn create(&self) -> Result<SymmetricKey> {
        let key = SymmetricKey::generate()?;
        let wrapping = Self::device_derived_key()?;
        let wrapped = aead::seal(key.as_bytes(), &wrapping, WRAP_AAD)?;

        if let Some(parent) = self.key_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.key_file, &wrapped)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.key_file, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!(path = %self.key_file.display(), "created keychain key file");
        Ok(key)
    }
}

impl SymmetricKeyProvider for FileKeyProvider {
    fn get_or_create_key(&self, force_recreate: bool) -> Result<SymmetricKey> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|e| KeychainError::Internal(format!("key cache poisoned: {e}")))?;

        if !force_recreate {
            if let Some(bytes) = cached.as_ref() {
                return SymmetricKey::from_bytes(bytes);
            }
        }

        let key = if !force_recreate && self.key_file.exists() {
            self.load()?
        } else {
            self.create()?
        };
        *cached = Some(*key.as_bytes());
        Ok(key)
    }
}

impl Drop for FileKeyProvider {
    fn drop(&mut self) {
        if let Ok(cached) = self.cached.get_mut() {
            if let Some(bytes) = cached.as_mut() {
                bytes.zeroize();
            }
        }
    }
}

impl std::fmt::Debug for FileKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeyProvider")
            .field("key_file", &self.key_file)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// macOS Keychain Services
// ---------------------------------------------------------------------------

/// The Security framework error code for "item not found"
/// (`errSecItemNotFound = -25300`).
#[cfg(target_os = "macos")]
const MACOS_ERR_SEC_ITEM_NOT_FOUND: i32 = -25300;

/// Provider backed by the user's login keychain (generic password item).
#[cfg(target_os = "macos")]
#[derive(Debug)]
pub struct MacOsKeyProvider {
    service_name: String,
    account_name: String,
}

#[cfg(target_os = "macos")]
impl MacOsKeyProvider {
    const DEFAULT_SERVICE: &'static str = "com.sealbox.keychain";
    const DEFAULT_ACCOUNT: &'static str = "keychain-key";

    pub fn new() -> Self {
        Self::with_names(Self::DEFAULT_SERVICE, Self::DEFAULT_ACCOUNT)
    }

    /// Use custom service and account names, e.g. to isolate test runs.
    pub fn with_names(service: &str, account: &str) -> Self {
        Self {
            service_name: service.to_string(),
            account_name: account.to_string(),
        }
    }

    fn create(&self) -> Result<SymmetricKey> {
        use security_framework::passwords::set_generic_password;

        let key = SymmetricKey::generate()?;
        set_generic_password(&self.service_name, &self.account_name, key.as_bytes()).map_err(
            |e| KeychainError::KeyProvider {
                reason: format!("macOS keychain write failed: {e}"),
            },
        )?;
        tracing::info!(service = %self.service_name, "created keychain key in macOS keychain");
        Ok(key)
    }
}

#[cfg(target_os = "macos")]
impl Default for MacOsKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "macos")]
impl SymmetricKeyProvider for MacOsKeyProvider {
    fn get_or_create_key(&self, force_recreate: bool) -> Result<SymmetricKey> {
        use security_framework::passwords::get_generic_password;

        if force_recreate {
            return self.create();
        }

        match get_generic_password(&self.service_name, &self.account_name) {
            Ok(mut data) => {
                let key = SymmetricKey::from_bytes(&data);
                data.zeroize();
                key
            }
            Err(e) if e.code() == MACOS_ERR_SEC_ITEM_NOT_FOUND => self.create(),
            Err(e) => Err(KeychainError::KeyProvider {
                reason: format!("macOS keychain read failed: {e}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Returns the best available key provider for the current platform.
///
/// - **macOS**: [`MacOsKeyProvider`]
/// - **Other platforms**: [`FileKeyProvider`] at `key_file`
///
/// `key_file` is ignored on macOS.
pub fn platform_key_provider(key_file: &Path) -> Box<dyn SymmetricKeyProvider> {
    let _ = &key_file;

    #[cfg(target_os = "macos")]
    {
        tracing::info!("using macOS Keychain Services for the keychain key");
        Box::new(MacOsKeyProvider::new())
    }
    #[cfg(not(target_os = "macos"))]
    {
        tracing::info!(path = %key_file.display(), "using file-based key provider");
        Box::new(FileKeyProvider::new(key_file))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
