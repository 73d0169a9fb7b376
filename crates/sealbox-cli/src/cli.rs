//! CLI argument definitions for sealbox.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// sealbox -- encrypted key-value keychain.
#[derive(Parser)]
#[command(
    name = "sealbox",
    version,
    about = "sealbox -- encrypted key-value keychain",
    long_about = "Stores secrets per namespace, sealed with AES-256-GCM under a device key. \
                  Plaintext namespaces from older versions are imported on first access."
)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, global = true, default_value = "sealbox.toml")]
    pub config: PathBuf,

    /// Override the data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override the log filter (e.g. `debug`, `sealbox_keychain=trace`).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the value stored under a key.
    Get {
        namespace: String,
        key: String,
        /// Print the raw bytes as Base64 instead of text.
        #[arg(long)]
        base64: bool,
    },

    /// Store a value under a key.
    Put {
        namespace: String,
        key: String,
        value: String,
        /// Treat VALUE as Base64-encoded bytes.
        #[arg(long)]
        base64: bool,
    },

    /// Remove a key.
    Remove { namespace: String, key: String },

    /// Remove every key of a namespace.
    Clear { namespace: String },

    /// List the keys of a namespace.
    Keys { namespace: String },

    /// Show how a namespace is stored.
    Status { namespace: String },

    /// Import a plaintext namespace into encrypted storage.
    Import { namespace: String },

    /// Check that the device key store and cipher work.
    SelfTest,

    /// Write a plaintext entry the way older versions did.
    LegacyPut {
        namespace: String,
        key: String,
        value: String,
    },
}
