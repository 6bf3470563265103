//! # Record Subcommands
//!
//! Registration, status, verification, listing, and operator retry.
//! Output is JSON on stdout, one document per invocation, so the
//! commands compose with `jq` in operational scripts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;

use pv_core::EvidenceId;
use pv_engine::{ConfirmationEngine, RegistrationOutcome, RegistrationService};
use pv_store::{EvidenceStatus, NewEvidence, RecordQuery};

/// A running engine plus the service surface over it.
pub struct AppContext {
    /// The confirmation engine (owned for shutdown).
    pub engine: Arc<ConfirmationEngine>,
    /// The public service surface.
    pub service: RegistrationService,
}

/// Arguments for `proofvault register`.
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Path to the PDF to register.
    pub file: PathBuf,

    /// Display filename; defaults to the file's name on disk.
    #[arg(long)]
    pub filename: Option<String>,

    /// Submitter label.
    #[arg(long)]
    pub submitter: String,

    /// Organization label.
    #[arg(long)]
    pub org: String,

    /// Wait for the record to reach a terminal status before exiting.
    #[arg(long)]
    pub watch: bool,
}

/// Arguments for `proofvault list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Filter by status (e.g. SUBMITTED, FINALIZED_COMMITMENT).
    #[arg(long)]
    pub status: Option<String>,

    /// Filter by organization label.
    #[arg(long)]
    pub org: Option<String>,

    /// Page size.
    #[arg(long, default_value_t = 50)]
    pub limit: u32,

    /// Page offset.
    #[arg(long, default_value_t = 0)]
    pub offset: u64,
}

/// Register a document and optionally watch confirmation to the end.
pub async fn run_register(ctx: &AppContext, args: &RegisterArgs) -> Result<u8> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let filename = match &args.filename {
        Some(name) => name.clone(),
        None => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string()),
    };

    let outcome = ctx
        .service
        .register(NewEvidence {
            document_bytes: bytes,
            filename,
            submitter_label: args.submitter.clone(),
            organization_label: args.org.clone(),
        })
        .await?;

    let (label, id) = match &outcome {
        RegistrationOutcome::Created(view) => ("created", view.id),
        RegistrationOutcome::AlreadyExists(view) => ("already_exists", view.id),
    };
    print_json(&serde_json::json!({
        "outcome": label,
        "record": outcome.view(),
    }))?;

    if args.watch && outcome.is_created() {
        watch_until_terminal(ctx, id).await?;
    }
    Ok(0)
}

/// Poll the record until it reaches a terminal status, printing each
/// status change.
async fn watch_until_terminal(ctx: &AppContext, id: EvidenceId) -> Result<()> {
    let mut last: Option<EvidenceStatus> = None;
    loop {
        let Some(view) = ctx.service.get_record(id).await? else {
            bail!("record {id} disappeared while watching");
        };
        if last != Some(view.status) {
            tracing::info!(%id, status = %view.status, "status change");
            last = Some(view.status);
        }
        if view.status.is_terminal() {
            print_json(&view)?;
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

/// Print the current view of one record.
pub async fn run_status(ctx: &AppContext, id: &str) -> Result<u8> {
    let id = parse_id(id)?;
    match ctx.service.get_record(id).await? {
        Some(view) => {
            print_json(&view)?;
            Ok(0)
        }
        None => {
            bail!("no record with id {id}");
        }
    }
}

/// Re-verify a record and print the report. Exit code 1 when the record
/// does not verify.
pub async fn run_verify(ctx: &AppContext, id: &str) -> Result<u8> {
    let id = parse_id(id)?;
    let report = ctx.service.verify(id).await?;
    print_json(&report)?;
    Ok(if report.verified { 0 } else { 1 })
}

/// Operator retry of an errored record.
pub async fn run_retry(ctx: &AppContext, id: &str) -> Result<u8> {
    let id = parse_id(id)?;
    let view = ctx.service.retry(id).await?;
    print_json(&view)?;
    Ok(0)
}

/// List records with filters and pagination.
pub async fn run_list(ctx: &AppContext, args: &ListArgs) -> Result<u8> {
    let status = match &args.status {
        Some(raw) => Some(parse_status(raw)?),
        None => None,
    };
    let query = RecordQuery {
        status,
        organization_label: args.org.clone(),
        limit: args.limit,
        offset: args.offset,
        ..Default::default()
    };
    let page = ctx.service.list_records(&query).await?;
    print_json(&serde_json::json!({
        "total": page.total,
        "limit": page.limit,
        "offset": page.offset,
        "records": page.items,
    }))?;
    Ok(0)
}

fn parse_id(raw: &str) -> Result<EvidenceId> {
    EvidenceId::parse(raw).with_context(|| format!("{raw:?} is not a record id"))
}

fn parse_status(raw: &str) -> Result<EvidenceStatus> {
    let upper = raw.to_uppercase();
    EvidenceStatus::parse(&upper)
        .with_context(|| format!("{raw:?} is not a status; expected NEW, SUBMITTED, PENDING_COMMITMENT, FINALIZED_COMMITMENT, or ERRORED_COMMITMENT"))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
