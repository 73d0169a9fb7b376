//! Per-namespace preference handle and its batch editor.
//!
//! A [`Preferences`] value reads entries of one namespace. Every mutation
//! goes through an [`Editor`], which buffers changes and commits them in a
//! single SQLite transaction on [`Editor::apply`]. Readers therefore observe
//! either the whole batch or none of it.

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::types::Value;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::db::PreferenceStore;
use crate::error::{PrefsError, PrefsResult};
use crate::value::PrefValue;

/// Handle on a single namespace of a [`PreferenceStore`].
#[derive(Debug, Clone)]
pub struct Preferences {
    store: PreferenceStore,
    namespace: String,
}

impl Preferences {
    pub(crate) fn new(store: PreferenceStore, namespace: String) -> Self {
        Self { store, namespace }
    }

    /// The namespace this handle reads and writes.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Read the value stored under `key`, of any kind.
    pub fn get(&self, key: &str) -> PrefsResult<Option<PrefValue>> {
        self.store.with_connection(|conn| {
            let row = conn
                .query_row(
                    "SELECT kind, value FROM preferences WHERE namespace = ?1 AND key = ?2",
                    params![self.namespace, key],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, Value>(1)?)),
                )
                .optional()?;
            row.map(|(kind, value)| decode(key, &kind, value)).transpose()
        })
    }

    /// Read a text value. Entries of another kind read as absent.
    pub fn get_text(&self, key: &str) -> PrefsResult<Option<String>> {
        Ok(match self.get(key)? {
            Some(PrefValue::Text(s)) => Some(s),
            _ => None,
        })
    }

    /// Read an integer value, or `default` when the key is absent or holds
    /// another kind.
    pub fn get_int(&self, key: &str, default: i64) -> PrefsResult<i64> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_int())
            .unwrap_or(default))
    }

    /// Whether any value is stored under `key`.
    pub fn contains(&self, key: &str) -> PrefsResult<bool> {
        self.store.with_connection(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM preferences WHERE namespace = ?1 AND key = ?2)",
                params![self.namespace, key],
                |row| row.get(0),
            )?;
            Ok(exists)
        })
    }

    /// Snapshot every entry of the namespace.
    pub fn get_all(&self) -> PrefsResult<BTreeMap<String, PrefValue>> {
        self.store.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, kind, value FROM preferences WHERE namespace = ?1 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![self.namespace], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Value>(2)?,
                ))
            })?;

            let mut out = BTreeMap::new();
            for row in rows {
                let (key, kind, value) = row?;
                let decoded = decode(&key, &kind, value)?;
                out.insert(key, decoded);
            }
            Ok(out)
        })
    }

    /// Start a batch of changes against this namespace.
    pub fn edit(&self) -> Editor<'_> {
        Editor {
            prefs: self,
            clear: false,
            ops: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Editor
// ---------------------------------------------------------------------------

enum EditOp {
    Put(String, PrefValue),
    Remove(String),
}

/// Buffered batch of changes to one namespace.
///
/// `clear` is applied before every other change in the batch regardless of
/// the order in which it was requested; puts and removes then run in call
/// order.
pub struct Editor<'a> {
    prefs: &'a Preferences,
    clear: bool,
    ops: Vec<EditOp>,
}

impl Editor<'_> {
    pub fn put(&mut self, key: &str, value: PrefValue) -> &mut Self {
        self.ops.push(EditOp::Put(key.to_string(), value));
        self
    }

    pub fn put_text(&mut self, key: &str, value: &str) -> &mut Self {
        self.put(key, PrefValue::Text(value.to_string()))
    }

    pub fn put_int(&mut self, key: &str, value: i64) -> &mut Self {
        self.put(key, PrefValue::Int(value))
    }

    pub fn put_float(&mut self, key: &str, value: f64) -> &mut Self {
        self.put(key, PrefValue::Float(value))
    }

    pub fn put_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.put(key, PrefValue::Bool(value))
    }

    pub fn put_text_set(&mut self, key: &str, value: BTreeSet<String>) -> &mut Self {
        self.put(key, PrefValue::TextSet(value))
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.ops.push(EditOp::Remove(key.to_string()));
        self
    }

    /// Remove every entry of the namespace as the first step of the batch.
    pub fn clear(&mut self) -> &mut Self {
        self.clear = true;
        self
    }

    /// Whether the batch holds no changes.
    pub fn is_empty(&self) -> bool {
        !self.clear && self.ops.is_empty()
    }

    /// Commit the batch atomically. The editor is left empty afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`PrefsError::Sqlite`] if the transaction fails; in that case
    /// none of the buffered changes are visible.
    pub fn apply(&mut self) -> PrefsResult<()> {
        if self.is_empty() {
            return Ok(());
        }

        let clear = std::mem::take(&mut self.clear);
        let ops = std::mem::take(&mut self.ops);
        let namespace = self.prefs.namespace.as_str();

        self.prefs.store.with_connection_mut(|conn| {
            let tx = conn.transaction()?;

            if clear {
                tx.execute(
                    "DELETE FROM preferences WHERE namespace = ?1",
                    params![namespace],
                )?;
            }

            for op in &ops {
                match op {
                    EditOp::Put(key, value) => {
                        tx.execute(
                            "INSERT INTO preferences (namespace, key, kind, value)
                             VALUES (?1, ?2, ?3, ?4)
                             ON CONFLICT(namespace, key)
                             DO UPDATE SET kind = excluded.kind, value = excluded.value",
                            params![namespace, key, value.kind(), encode(value)?],
                        )?;
                    }
                    EditOp::Remove(key) => {
                        tx.execute(
                            "DELETE FROM preferences WHERE namespace = ?1 AND key = ?2",
                            params![namespace, key],
                        )?;
                    }
                }
            }

            tx.commit()?;
            Ok(())
        })?;

        debug!(
            namespace = namespace,
            clear,
            changes = ops.len(),
            "committed preference batch"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Value encoding
// ---------------------------------------------------------------------------

fn encode(value: &PrefValue) -> PrefsResult<Value> {
    Ok(match value {
        PrefValue::Text(s) => Value::Text(s.clone()),
        PrefValue::Int(i) => Value::Integer(*i),
        PrefValue::Float(f) => Value::Real(*f),
        PrefValue::Bool(b) => Value::Integer(i64::from(*b)),
        PrefValue::TextSet(set) => Value::Text(serde_json::to_string(set)?),
    })
}

fn decode(key: &str, kind: &str, value: Value) -> PrefsResult<PrefValue> {
    Ok(match (kind, value) {
        ("text", Value::Text(s)) => PrefValue::Text(s),
        ("int", Value::Integer(i)) => PrefValue::Int(i),
        ("float", Value::Real(f)) => PrefValue::Float(f),
        ("float", Value::Integer(i)) => PrefValue::Float(i as f64),
        ("bool", Value::Integer(i)) => PrefValue::Bool(i != 0),
        ("text_set", Value::Text(s)) => PrefValue::TextSet(serde_json::from_str(&s)?),
        (kind, _) => {
            return Err(PrefsError::UnknownKind {
                key: key.to_string(),
                kind: kind.to_string(),
            });
        }
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
