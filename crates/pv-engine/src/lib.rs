//! # pv-engine — Confirmation Engine and Registration Service
//!
//! The orchestration layer above the repository, ledger client, and
//! fingerprint builder:
//!
//! - [`ConfirmationEngine`] drives each record through
//!   NEW → SUBMITTED → PENDING_COMMITMENT → FINALIZED_COMMITMENT (or
//!   ERRORED_COMMITMENT) with a bounded worker pool, exponential polling,
//!   a per-record total deadline, and a recovery sweeper. Every mutation
//!   is a repository CAS; a stale swap means another worker already made
//!   the transition and is treated as success.
//! - [`RegistrationService`] is the public contract consumed by the HTTP
//!   edge: validate, insert-or-conflict, enqueue, and return immediately.
//!   Ledger trouble never fails `register` — it shows up in the record's
//!   status and `last_error` instead.
//! - [`verify`](RegistrationService::verify) re-derives everything a
//!   verifier can re-derive — content hash, fingerprint, signature — and
//!   surfaces the ledger's opinion next to the local result.

pub mod config;
pub mod engine;
pub mod error;
pub mod registration;
pub mod schedule;
pub mod verify;
pub mod views;

pub use config::{EngineConfig, RegistrationConfig};
pub use engine::ConfirmationEngine;
pub use error::{EngineError, RegistrationError, ValidationError, VerifyError};
pub use registration::{RegistrationOutcome, RegistrationService};
pub use schedule::PollSchedule;
pub use verify::{FingerprintCheck, VerificationReport};
pub use views::RecordView;
