//! Preference table schema.
//!
//! There is a single schema. Its version is kept in SQLite's `user_version`
//! header field; a database stamped by a newer build is refused rather than
//! read with the wrong layout.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{PrefsError, PrefsResult};

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS preferences (
        namespace  TEXT NOT NULL,
        key        TEXT NOT NULL,
        kind       TEXT NOT NULL CHECK(kind IN ('text','int','float','bool','text_set')),
        value      BLOB,
        PRIMARY KEY (namespace, key)
    ) WITHOUT ROWID;
";

/// Create the preference table on a fresh database and stamp its version.
///
/// Does nothing when the database is already at [`SCHEMA_VERSION`].
pub fn ensure_schema(conn: &Connection) -> PrefsResult<()> {
    let found = current_version(conn)?;
    if found == SCHEMA_VERSION {
        debug!(version = found, "preference schema up to date");
        return Ok(());
    }
    if found > SCHEMA_VERSION {
        return Err(PrefsError::UnsupportedSchema {
            found,
            supported: SCHEMA_VERSION,
        });
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    info!(version = SCHEMA_VERSION, "preference schema created");
    Ok(())
}

/// Schema version stamped on `conn`, 0 for an empty database.
pub fn current_version(conn: &Connection) -> PrefsResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}
