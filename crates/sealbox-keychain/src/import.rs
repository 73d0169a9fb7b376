//! One-shot migration of a plaintext namespace into encrypted form.
//!
//! The import seals every text entry, drops entries of other kinds and
//! stamps the version marker, all in one batch. If the key is unavailable
//! or any seal fails, nothing is written and the namespace stays legacy so
//! the import can run again later.

use std::collections::BTreeMap;

use sealbox_prefs::{PrefValue, Preferences};

use crate::encoding::{self, LegacyTextForm};
use crate::error::{KeychainError, Result};
use crate::keychain::{EncryptedKeychain, Keychain};
use crate::marker;
use crate::reserved::is_reserved_key;

/// A legacy entry as seen by the import.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyValue {
    Text(String),
    /// Any non-text value; the payload names its kind.
    Other(&'static str),
}

impl From<&PrefValue> for LegacyValue {
    fn from(value: &PrefValue) -> Self {
        match value {
            PrefValue::Text(text) => LegacyValue::Text(text.clone()),
            other => LegacyValue::Other(other.kind()),
        }
    }
}

impl From<String> for LegacyValue {
    fn from(text: String) -> Self {
        LegacyValue::Text(text)
    }
}

impl From<&str> for LegacyValue {
    fn from(text: &str) -> Self {
        LegacyValue::Text(text.to_string())
    }
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Keys now holding sealed values, sorted.
    pub imported: Vec<String>,
    /// Imported keys whose text was taken as Base64-encoded bytes.
    pub decoded_base64: Vec<String>,
    /// Keys removed because their kind is not supported, with that kind.
    pub dropped: Vec<(String, &'static str)>,
    /// The namespace already held encrypted content; nothing was done.
    pub already_encrypted: bool,
}

impl ImportReport {
    /// Errors describing each dropped entry.
    pub fn dropped_errors(&self) -> Vec<KeychainError> {
        self.dropped
            .iter()
            .map(|(key, kind)| KeychainError::UnsupportedLegacyType {
                key: key.clone(),
                kind: *kind,
            })
            .collect()
    }
}

impl EncryptedKeychain {
    /// Convert this namespace's own plaintext entries into encrypted form.
    pub fn import_from_preferences(&self) -> Result<ImportReport> {
        self.import_from(&self.prefs)
    }

    /// Import the entries of `legacy` into this namespace.
    ///
    /// When `legacy` is this keychain's namespace the snapshot is taken
    /// under the namespace lock.
    pub fn import_from(&self, legacy: &Preferences) -> Result<ImportReport> {
        let _guard = self.lock.acquire()?;
        let snapshot: BTreeMap<String, LegacyValue> = legacy
            .get_all()?
            .iter()
            .map(|(key, value)| (key.clone(), LegacyValue::from(value)))
            .collect();
        self.import_locked(&snapshot)
    }

    /// Import an explicit snapshot of legacy entries.
    pub fn import_legacy(&self, snapshot: &BTreeMap<String, LegacyValue>) -> Result<ImportReport> {
        let _guard = self.lock.acquire()?;
        self.import_locked(snapshot)
    }

    fn import_locked(&self, snapshot: &BTreeMap<String, LegacyValue>) -> Result<ImportReport> {
        if marker::is_encrypted_content(&self.prefs)? {
            tracing::info!(
                identifier = %self.identifier(),
                "namespace already encrypted, import skipped"
            );
            return Ok(ImportReport {
                already_encrypted: true,
                ..ImportReport::default()
            });
        }

        let master = self.master_key().ok_or(KeychainError::KeyUnavailable)?;

        let mut report = ImportReport::default();
        let mut sealed = Vec::with_capacity(snapshot.len());

        for (key, value) in snapshot {
            if is_reserved_key(key) {
                continue;
            }
            match value {
                LegacyValue::Text(text) => {
                    let (bytes, form) = encoding::classify_legacy_text(text);
                    let stored = self.seal_with(&master, &bytes).map_err(|err| {
                        tracing::error!(
                            identifier = %self.identifier(),
                            key = %key,
                            error = %err,
                            "import aborted: seal failed"
                        );
                        err
                    })?;
                    if form == LegacyTextForm::Base64 {
                        report.decoded_base64.push(key.clone());
                    }
                    report.imported.push(key.clone());
                    sealed.push((key.as_str(), stored));
                }
                LegacyValue::Other(kind) => {
                    tracing::warn!(
                        identifier = %self.identifier(),
                        key = %key,
                        kind,
                        "dropping legacy value of unsupported kind"
                    );
                    report.dropped.push((key.clone(), *kind));
                }
            }
        }

        let mut editor = self.prefs.edit();
        for (key, stored) in &sealed {
            editor.put_text(key, stored);
        }
        for (key, _) in &report.dropped {
            editor.remove(key);
        }
        marker::stamp(&mut editor);
        editor.apply()?;

        tracing::info!(
            identifier = %self.identifier(),
            imported = report.imported.len(),
            dropped = report.dropped.len(),
            "legacy keychain imported"
        );
        Ok(report)
    }
}
