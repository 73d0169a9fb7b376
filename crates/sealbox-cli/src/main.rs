//! CLI entry point for sealbox.
//!
//! This binary provides the `sealbox` command for reading and writing
//! keychain entries, inspecting namespaces and running the legacy import
//! and self-test by hand.

mod cli;
mod helpers;

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::Parser;
use sealbox_keychain::{
    AesGcmCipher, Keychain, KeychainConfig, KeychainFactory, is_encrypted_namespace,
    platform_key_provider, selftest,
};
use tracing::info;

use crate::cli::{Cli, Commands};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = helpers::load_config(&cli)?;
    helpers::init_tracing(&config.log_level);

    match cli.command {
        Commands::Get {
            namespace,
            key,
            base64,
        } => cmd_get(&config, &namespace, &key, base64),
        Commands::Put {
            namespace,
            key,
            value,
            base64,
        } => cmd_put(&config, &namespace, &key, &value, base64),
        Commands::Remove { namespace, key } => cmd_remove(&config, &namespace, &key),
        Commands::Clear { namespace } => cmd_clear(&config, &namespace),
        Commands::Keys { namespace } => cmd_keys(&config, &namespace),
        Commands::Status { namespace } => cmd_status(&config, &namespace),
        Commands::Import { namespace } => cmd_import(&config, &namespace),
        Commands::SelfTest => cmd_self_test(&config),
        Commands::LegacyPut {
            namespace,
            key,
            value,
        } => cmd_legacy_put(&config, &namespace, &key, &value),
    }
}

fn open_factory(config: &KeychainConfig) -> Result<KeychainFactory> {
    KeychainFactory::from_config(config).context("failed to open keychain storage")
}

// ---------------------------------------------------------------------------
// Subcommands: entries
// ---------------------------------------------------------------------------

fn cmd_get(config: &KeychainConfig, namespace: &str, key: &str, base64: bool) -> Result<()> {
    let keychain = open_factory(config)?.keychain(namespace)?;

    let Some(bytes) = keychain.get_bytes(key)? else {
        bail!("no value for {key:?} in {namespace:?}");
    };
    if base64 {
        println!("{}", STANDARD.encode(&bytes));
    } else {
        println!("{}", String::from_utf8_lossy(&bytes));
    }
    Ok(())
}

fn cmd_put(
    config: &KeychainConfig,
    namespace: &str,
    key: &str,
    value: &str,
    base64: bool,
) -> Result<()> {
    let keychain = open_factory(config)?.keychain(namespace)?;

    let bytes = if base64 {
        STANDARD
            .decode(value.trim())
            .context("VALUE is not valid base64")?
    } else {
        value.as_bytes().to_vec()
    };
    keychain.put_bytes(key, &bytes)?;

    // Writes are dropped, not failed, when the key store is unavailable.
    if !keychain.contains(key)? {
        bail!("value for {key:?} was not stored; see log for details");
    }
    info!(namespace, key, "value stored");
    Ok(())
}

fn cmd_remove(config: &KeychainConfig, namespace: &str, key: &str) -> Result<()> {
    open_factory(config)?.keychain(namespace)?.remove(key)?;
    info!(namespace, key, "value removed");
    Ok(())
}

fn cmd_clear(config: &KeychainConfig, namespace: &str) -> Result<()> {
    open_factory(config)?.keychain(namespace)?.remove_all()?;
    info!(namespace, "namespace cleared");
    Ok(())
}

fn cmd_keys(config: &KeychainConfig, namespace: &str) -> Result<()> {
    for key in open_factory(config)?.keychain(namespace)?.keys()? {
        println!("{key}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommands: maintenance
// ---------------------------------------------------------------------------

fn cmd_status(config: &KeychainConfig, namespace: &str) -> Result<()> {
    let factory = open_factory(config)?;
    let on_disk = is_encrypted_namespace(factory.store(), namespace)?;
    let keychain = factory.keychain(namespace)?;

    println!("namespace:          {namespace}");
    println!("database:           {}", config.database_path().display());
    println!("mode:               {}", factory.mode());
    println!("encrypted content:  {on_disk}");
    println!(
        "backend:            {}",
        if keychain.is_encrypted() { "encrypted" } else { "legacy" }
    );
    println!("entries:            {}", keychain.keys()?.len());
    Ok(())
}

fn cmd_import(config: &KeychainConfig, namespace: &str) -> Result<()> {
    let factory = open_factory(config)?;
    if !factory.encryption_supported() {
        bail!("key store self-test failed; import not attempted");
    }

    let report = factory
        .encrypted_keychain(namespace)?
        .import_from_preferences()
        .with_context(|| format!("import of {namespace:?} failed"))?;

    if report.already_encrypted {
        println!("{namespace}: already encrypted");
        return Ok(());
    }
    println!("{namespace}: imported {} entries", report.imported.len());
    for key in &report.decoded_base64 {
        println!("  {key} (base64 bytes)");
    }
    for (key, kind) in &report.dropped {
        println!("  dropped {key} ({kind})");
    }
    Ok(())
}

fn cmd_self_test(config: &KeychainConfig) -> Result<()> {
    let provider = platform_key_provider(&config.key_file());
    selftest::run_self_test(provider.as_ref(), &AesGcmCipher)
        .context("self-test failed")?;
    println!("self-test passed");
    Ok(())
}

fn cmd_legacy_put(config: &KeychainConfig, namespace: &str, key: &str, value: &str) -> Result<()> {
    let factory = open_factory(config)?;
    if is_encrypted_namespace(factory.store(), namespace)? {
        bail!("{namespace:?} already holds encrypted content");
    }
    factory.legacy_keychain(namespace)?.put_text(key, value)?;
    info!(namespace, key, "legacy value stored");
    Ok(())
}
