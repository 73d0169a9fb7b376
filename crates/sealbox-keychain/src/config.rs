//! Keychain configuration.
//!
//! [`KeychainConfig`] says where the preference database and the key file
//! live and which backend policy the factory follows. Values come from, in
//! increasing precedence: [`Default`], a TOML file ([`KeychainConfig::load`]),
//! `SEALBOX_*` environment variables ([`KeychainConfig::apply_env`]) and the
//! builder-style `with_*` setters.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{KeychainError, Result};
use crate::provider::FileKeyProvider;

/// Backend policy applied by the [`KeychainFactory`](crate::KeychainFactory).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryMode {
    /// Encrypt when the self-test passes, otherwise fall back to legacy.
    #[default]
    Automatic,
    /// Refuse to hand out plaintext keychains for new namespaces.
    EncryptedOnly,
    /// Never move namespaces to encrypted storage.
    LegacyOnly,
}

impl FromStr for FactoryMode {
    type Err = KeychainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "automatic" | "auto" => Ok(Self::Automatic),
            "encrypted_only" | "encrypted" => Ok(Self::EncryptedOnly),
            "legacy_only" | "legacy" => Ok(Self::LegacyOnly),
            other => Err(KeychainError::Config {
                reason: format!("unknown keychain mode {other:?}"),
            }),
        }
    }
}

impl std::fmt::Display for FactoryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Automatic => "automatic",
            Self::EncryptedOnly => "encrypted_only",
            Self::LegacyOnly => "legacy_only",
        };
        f.write_str(name)
    }
}

/// Storage locations and policy for the keychain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeychainConfig {
    /// Directory holding the database and key file unless they are set
    /// explicitly.
    ///
    /// Default: **`./data`**.
    pub data_dir: PathBuf,

    /// Preference database. Default: `<data_dir>/sealbox.db`.
    pub database_path: Option<PathBuf>,

    /// Wrapped key file used by the file key provider.
    /// Default: `<data_dir>/keychain.key`.
    pub key_file: Option<PathBuf>,

    /// Backend policy. Default: **automatic**.
    pub mode: FactoryMode,

    /// `tracing` filter directive used by the CLI. Default: **`info`**.
    pub log_level: String,
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            database_path: None,
            key_file: None,
            mode: FactoryMode::Automatic,
            log_level: "info".to_string(),
        }
    }
}

impl KeychainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a TOML configuration file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "configuration file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| KeychainError::Config {
            reason: format!("failed to parse {}: {e}", path.display()),
        })?;

        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Serialise to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| KeychainError::Config {
            reason: format!("failed to serialise configuration: {e}"),
        })
    }

    /// Override fields from `SEALBOX_*` environment variables.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Override fields from a variable lookup.
    pub fn apply_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(dir) = get("SEALBOX_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(db) = get("SEALBOX_DATABASE") {
            self.database_path = Some(PathBuf::from(db));
        }
        if let Some(key_file) = get("SEALBOX_KEY_FILE") {
            self.key_file = Some(PathBuf::from(key_file));
        }
        if let Some(mode) = get("SEALBOX_MODE") {
            self.mode = mode.parse()?;
        }
        if let Some(level) = get("SEALBOX_LOG_LEVEL") {
            self.log_level = level;
        }
        Ok(self)
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn with_key_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    pub fn with_mode(mut self, mode: FactoryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Effective database path.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("sealbox.db"))
    }

    /// Effective key file path.
    pub fn key_file(&self) -> PathBuf {
        self.key_file
            .clone()
            .unwrap_or_else(|| FileKeyProvider::default_path(&self.data_dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_derive_paths_from_data_dir() {
        let config = KeychainConfig::new().with_data_dir("/var/lib/sealbox");
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/sealbox/sealbox.db"));
        assert_eq!(config.key_file(), PathBuf::from("/var/lib/sealbox/keychain.key"));
        assert_eq!(config.mode, FactoryMode::Automatic);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = KeychainConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, KeychainConfig::default());
    }

    #[test]
    fn loads_partial_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sealbox.toml");
        std::fs::write(&path, "data_dir = \"/srv\"\nmode = \"legacy_only\"\n").unwrap();

        let config = KeychainConfig::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv"));
        assert_eq!(config.mode, FactoryMode::LegacyOnly);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "mode = \"sometimes\"").unwrap();
        assert!(matches!(
            KeychainConfig::load(&path),
            Err(KeychainError::Config { .. })
        ));
    }

    #[test]
    fn env_overrides_fields() {
        let vars = HashMap::from([
            ("SEALBOX_DATABASE", "/tmp/x.db"),
            ("SEALBOX_MODE", "encrypted-only"),
            ("SEALBOX_LOG_LEVEL", "debug"),
            ("SEALBOX_KEY_FILE", ""),
        ]);
        let config = KeychainConfig::default()
            .apply_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/tmp/x.db"));
        assert_eq!(config.mode, FactoryMode::EncryptedOnly);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.key_file, None);
    }

    #[test]
    fn toml_round_trip() {
        let config = KeychainConfig::default().with_key_file("/k").with_mode(FactoryMode::LegacyOnly);
        let parsed: KeychainConfig = toml::from_str(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn unknown_mode_is_config_error() {
        assert!("sometimes".parse::<FactoryMode>().is_err());
        assert_eq!("AUTO".parse::<FactoryMode>().unwrap(), FactoryMode::Automatic);
    }
}
