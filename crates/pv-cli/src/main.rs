//! # proofvault CLI entry point
//!
//! Parses command-line arguments, resolves environment configuration,
//! wires the repository, ledger client, key store, and confirmation
//! engine, and dispatches to the subcommand handlers.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pv_cli::config::AppConfig;
use pv_cli::keys::{run_key, KeyArgs};
use pv_cli::records::{
    run_list, run_register, run_retry, run_status, run_verify, AppContext, ListArgs,
    RegisterArgs,
};
use pv_crypto::KeyStore;
use pv_engine::{ConfirmationEngine, RegistrationService};
use pv_ledger::{HttpLedgerClient, LedgerClient};
use pv_store::{init_pool, EvidenceRepository, InMemoryRepository, PgEvidenceRepository};

/// ProofVault — evidence registration and confirmation engine.
///
/// Registers PDF documents, produces signed attestations, submits them
/// to the external ledger, and tracks confirmation to a terminal state.
#[derive(Parser, Debug)]
#[command(name = "proofvault", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Signer identity management (generate, show).
    Key(KeyArgs),

    /// Register a PDF document as evidence.
    Register(RegisterArgs),

    /// Print the current status of a record.
    Status {
        /// Record id.
        id: String,
    },

    /// Re-verify a record's integrity and consult the ledger.
    Verify {
        /// Record id.
        id: String,
    },

    /// Retry confirmation of an errored record.
    Retry {
        /// Record id.
        id: String,
    },

    /// List records with filters and pagination.
    List(ListArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    // Key management needs only the key file path.
    if let Commands::Key(args) = &cli.command {
        let keystore_path = std::env::var("PV_KEYSTORE_PATH")
            .unwrap_or_else(|_| "proofvault-key.json".to_string());
        return run_key(args, keystore_path.as_ref());
    }

    let config = AppConfig::from_env()?;
    let ctx = build_context(&config).await?;

    let code = match &cli.command {
        Commands::Key(_) => unreachable!("handled above"),
        Commands::Register(args) => run_register(&ctx, args).await?,
        Commands::Status { id } => run_status(&ctx, id).await?,
        Commands::Verify { id } => run_verify(&ctx, id).await?,
        Commands::Retry { id } => run_retry(&ctx, id).await?,
        Commands::List(args) => run_list(&ctx, args).await?,
    };

    ctx.engine.shutdown().await;
    Ok(code)
}

/// Wire the repository, signer, ledger client, engine, and service.
async fn build_context(config: &AppConfig) -> Result<AppContext> {
    let repo: Arc<dyn EvidenceRepository> = match init_pool().await? {
        Some(pool) => Arc::new(PgEvidenceRepository::new(pool)),
        None => Arc::new(InMemoryRepository::new()),
    };

    let keystore = Arc::new(
        KeyStore::load_or_generate(&config.keystore_path).with_context(|| {
            format!("initializing key file {}", config.keystore_path.display())
        })?,
    );

    let ledger: Arc<dyn LedgerClient> = Arc::new(
        HttpLedgerClient::new(config.ledger.clone())
            .context("building ledger client")?,
    );

    let engine = Arc::new(ConfirmationEngine::start(
        repo.clone(),
        ledger.clone(),
        keystore.clone(),
        config.engine,
    ));
    let service = RegistrationService::new(
        repo,
        engine.clone(),
        ledger,
        keystore,
        config.registration,
    );

    Ok(AppContext { engine, service })
}
