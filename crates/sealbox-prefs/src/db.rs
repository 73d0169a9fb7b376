//! SQLite database setup with WAL mode and performance pragmas.
//!
//! The [`PreferenceStore`] struct wraps a `rusqlite::Connection` behind an
//! `Arc<Mutex<>>`. Every namespace handle produced by the store shares the
//! same connection, so batch commits from different namespaces are
//! serialised by SQLite itself.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{PrefsError, PrefsResult};
use crate::migration;
use crate::preferences::Preferences;

/// Thread-safe handle to a preference database.
#[derive(Clone)]
pub struct PreferenceStore {
    conn: Arc<Mutex<Connection>>,
}

impl PreferenceStore {
    /// Open (or create) a preference database at `path`, apply pragmas and
    /// create the schema if needed.
    pub fn open(path: impl AsRef<Path>) -> PrefsResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening preference store");

        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store, mainly for tests.
    pub fn open_in_memory() -> PrefsResult<Self> {
        debug!("opening in-memory preference store");
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> PrefsResult<Self> {
        Self::apply_pragmas(&conn)?;
        migration::ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a handle on the namespace `id`.
    ///
    /// Namespaces are created lazily: nothing is written until the first
    /// batch commit that puts an entry.
    ///
    /// # Errors
    ///
    /// Returns [`PrefsError::InvalidNamespace`] if `id` is empty.
    pub fn namespace(&self, id: &str) -> PrefsResult<Preferences> {
        if id.is_empty() {
            return Err(PrefsError::InvalidNamespace(id.to_string()));
        }
        Ok(Preferences::new(self.clone(), id.to_string()))
    }

    /// List every namespace that currently holds at least one entry.
    pub fn namespaces(&self) -> PrefsResult<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT namespace FROM preferences ORDER BY namespace")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Run a closure against the connection while holding the store lock.
    pub(crate) fn with_connection<F, T>(&self, f: F) -> PrefsResult<T>
    where
        F: FnOnce(&Connection) -> PrefsResult<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| PrefsError::Poisoned(e.to_string()))?;
        f(&conn)
    }

    /// Mutable variant of [`with_connection`](Self::with_connection), used
    /// for transactions.
    pub(crate) fn with_connection_mut<F, T>(&self, f: F) -> PrefsResult<T>
    where
        F: FnOnce(&mut Connection) -> PrefsResult<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| PrefsError::Poisoned(e.to_string()))?;
        f(&mut conn)
    }

    // ── pragmas ──────────────────────────────────────────────────────

    fn apply_pragmas(conn: &Connection) -> PrefsResult<()> {
        // WAL mode: readers never block the single writer.
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // FULL sync: a committed batch survives power loss.
        conn.pragma_update(None, "synchronous", "FULL")?;

        conn.pragma_update(None, "temp_store", "MEMORY")?;

        // Busy timeout so a second process waits instead of failing immediately.
        conn.pragma_update(None, "busy_timeout", 5_000_i32)?;

        debug!("preference store pragmas applied");
        Ok(())
    }
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore").finish_non_exhaustive()
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory_creates_schema() {
        let store = PreferenceStore::open_in_memory().unwrap();
        let version = store
            .with_connection(migration::current_version)
            .unwrap();
        assert_eq!(version, migration::SCHEMA_VERSION);
    }

    #[test]
    fn empty_namespace_is_rejected() {
        let store = PreferenceStore::open_in_memory().unwrap();
        assert!(matches!(
            store.namespace(""),
            Err(PrefsError::InvalidNamespace(_))
        ));
    }

    #[test]
    fn namespaces_lists_only_populated() {
        let store = PreferenceStore::open_in_memory().unwrap();
        let a = store.namespace("a").unwrap();
        let _b = store.namespace("b").unwrap();

        a.edit().put_text("k", "v").apply().unwrap();

        assert_eq!(store.namespaces().unwrap(), vec!["a".to_string()]);
    }
}
