//! Version marker for encrypted namespaces.
//!
//! A namespace is in encrypted form exactly when the integer under
//! [`VERSION_KEY`] equals [`VERSION`]. The marker is written by the legacy
//! import and by `remove_all`, and is never visible through the keychain
//! accessors.

use sealbox_prefs::{Editor, Preferences};

use crate::error::Result;

/// Preference key holding the encrypted keychain schema version.
pub const VERSION_KEY: &str = "com.wultra.PowerAuthKeychain.IsEncrypted";

/// Current encrypted keychain schema version.
pub const VERSION: i64 = 1;

/// Whether `prefs` holds encrypted keychain content.
///
/// Only the exact current version counts; a missing marker, a marker of
/// another kind, or any other number means the namespace is not in
/// encrypted form.
pub fn is_encrypted_content(prefs: &Preferences) -> Result<bool> {
    Ok(prefs.get_int(VERSION_KEY, 0)? == VERSION)
}

/// Queue the current marker into `editor`.
pub(crate) fn stamp(editor: &mut Editor<'_>) {
    editor.put_int(VERSION_KEY, VERSION);
}
