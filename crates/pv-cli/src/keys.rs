//! # Key Subcommand
//!
//! Signer identity management: generate-or-load the key file and print
//! the public identity. Private key material is never printed.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use pv_crypto::KeyStore;

/// Arguments for the `proofvault key` subcommand.
#[derive(Args, Debug)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub command: KeyCommand,
}

/// Key subcommands.
#[derive(Subcommand, Debug)]
pub enum KeyCommand {
    /// Create the key file if absent, then print the public identity.
    Generate,
    /// Print the public identity of an existing key file.
    Show,
}

/// Run the key subcommand against the configured key file path.
pub fn run_key(args: &KeyArgs, keystore_path: &Path) -> Result<u8> {
    let store = match args.command {
        KeyCommand::Generate => KeyStore::load_or_generate(keystore_path)
            .with_context(|| format!("initializing key file {}", keystore_path.display()))?,
        KeyCommand::Show => KeyStore::load(keystore_path)
            .with_context(|| format!("loading key file {}", keystore_path.display()))?,
    };

    println!(
        "{}",
        serde_json::json!({
            "keystore": keystore_path.display().to_string(),
            "publicKey": store.public_key_hex(),
            "address": store.address(),
        })
    );
    Ok(0)
}
