//! Shared helper functions used across CLI subcommands.

use anyhow::{Context, Result};
use sealbox_keychain::KeychainConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
///
/// `RUST_LOG` wins over `default_level` when set. Logs go to stderr so
/// command output on stdout stays clean.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Resolve the effective configuration: file, then `SEALBOX_*` variables,
/// then command-line flags.
pub fn load_config(cli: &Cli) -> Result<KeychainConfig> {
    let mut config = KeychainConfig::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?
        .apply_env()
        .context("invalid SEALBOX_* environment")?;

    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(level) = &cli.log_level {
        config = config.with_log_level(level);
    }
    Ok(config)
}
