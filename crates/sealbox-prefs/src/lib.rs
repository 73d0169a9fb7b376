//! # sealbox-prefs
//!
//! Namespaced preference store for sealbox.
//!
//! Each namespace is an isolated string → scalar map. Values are persisted
//! in SQLite (WAL mode) and every mutation is buffered in an [`Editor`] that
//! commits as a single transaction, so a batch is either fully visible or
//! not visible at all.
//!
//! ## Quick start
//!
//! ```rust
//! use sealbox_prefs::PreferenceStore;
//!
//! # fn example() -> sealbox_prefs::PrefsResult<()> {
//! let store = PreferenceStore::open_in_memory()?;
//! let prefs = store.namespace("settings")?;
//!
//! prefs.edit().put_text("user", "alice").put_int("launches", 3).apply()?;
//!
//! assert_eq!(prefs.get_text("user")?.as_deref(), Some("alice"));
//! assert_eq!(prefs.get_int("launches", 0)?, 3);
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod error;
pub mod migration;
pub mod preferences;
pub mod value;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::PreferenceStore;
pub use error::{PrefsError, PrefsResult};
pub use preferences::{Editor, Preferences};
pub use value::PrefValue;
