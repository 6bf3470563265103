//! # pv-cli — Operator CLI for ProofVault
//!
//! Provides the `proofvault` command-line interface for operating the
//! evidence registration and confirmation engine from a shell:
//!
//! - `proofvault key generate` / `proofvault key show` — signer identity.
//! - `proofvault register <file>` — register a PDF, optionally watching
//!   confirmation to a terminal state.
//! - `proofvault status | verify | retry <id>` — per-record operations.
//! - `proofvault list` — filtered, paginated record listing.
//!
//! Configuration comes from `PV_*` environment variables; persistence is
//! PostgreSQL when `DATABASE_URL` is set and in-memory otherwise.

pub mod config;
pub mod keys;
pub mod records;

pub use config::AppConfig;
