//! Keychain error types.
//!
//! Every keychain subsystem surfaces errors through [`KeychainError`]. Not
//! every variant reaches callers of the [`Keychain`](crate::Keychain)
//! accessors: reads map key and AEAD failures to "absent", writes drop
//! themselves on those failures. Only the self-test, the legacy import and
//! the factory report them as errors.

use sealbox_prefs::PrefsError;

/// Unified error type for the sealbox keychain.
#[derive(Debug, thiserror::Error)]
pub enum KeychainError {
    // -- Caller errors ------------------------------------------------------
    /// A user operation named a key reserved for keychain metadata.
    #[error("key {key:?} is reserved for keychain metadata")]
    ReservedKey { key: String },

    /// The namespace identifier is not usable (e.g. empty).
    #[error("invalid keychain identifier: {0:?}")]
    InvalidIdentifier(String),

    // -- Key provider errors ------------------------------------------------
    /// The symmetric key provider could not supply a key.
    #[error("symmetric key unavailable")]
    KeyUnavailable,

    /// The provider backend failed while loading or creating the key.
    #[error("key provider failed: {reason}")]
    KeyProvider { reason: String },

    // -- Crypto errors ------------------------------------------------------
    /// Sealing a value failed (RNG failure, primitive error).
    #[error("seal failed: {reason}")]
    SealFailed { reason: String },

    /// Opening an envelope failed (tag mismatch, truncation, wrong AAD).
    #[error("open failed: {reason}")]
    OpenFailed { reason: String },

    // -- Import errors ------------------------------------------------------
    /// A legacy entry holds a value kind the encrypted keychain cannot
    /// represent. Reported per key; never aborts an import.
    #[error("unsupported legacy value of kind {kind} under key {key:?}")]
    UnsupportedLegacyType { key: String, kind: &'static str },

    // -- Underlying errors --------------------------------------------------
    /// The preference store failed to read or commit.
    #[error("store error: {0}")]
    Store(#[from] PrefsError),

    /// I/O error from the filesystem (key files, config files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("config error: {reason}")]
    Config { reason: String },

    /// Catch-all for unexpected internal errors.
    #[error("internal keychain error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the keychain crate.
pub type Result<T> = std::result::Result<T, KeychainError>;
