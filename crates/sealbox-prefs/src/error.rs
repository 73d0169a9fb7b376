//! Error types for the sealbox-prefs crate.
//!
//! All preference operations return [`PrefsError`] via [`PrefsResult`].

use thiserror::Error;

/// Alias for `Result<T, PrefsError>`.
pub type PrefsResult<T> = Result<T, PrefsError>;

/// Errors that can occur in the preference store.
#[derive(Debug, Error)]
pub enum PrefsError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A text set could not be encoded or decoded as JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The database was written by a newer build.
    #[error("schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: u32, supported: u32 },

    /// The namespace identifier is not usable (e.g. empty).
    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),

    /// A stored row carries a value kind this build does not understand.
    #[error("unknown value kind {kind:?} for key {key:?}")]
    UnknownKind { key: String, kind: String },

    /// The connection mutex was poisoned by a panicking writer.
    #[error("connection lock poisoned: {0}")]
    Poisoned(String),
}
