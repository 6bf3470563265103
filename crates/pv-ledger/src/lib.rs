//! # pv-ledger — Typed Ledger Client
//!
//! Remote submit/query against the external ledger service with
//! disciplined failure handling:
//!
//! - Every failure is categorized into the shared taxonomy before any
//!   policy decision is made; retryability is a property of the category.
//! - Submission retries with exponential backoff and jitter; client
//!   errors (the attestation itself is bad) never retry.
//! - `submit` and `get_status` each sit behind their own circuit breaker;
//!   an open breaker fails fast without touching the network.
//!
//! The [`LedgerClient`] trait is the seam: [`HttpLedgerClient`] is the
//! production transport, [`ScriptedLedgerClient`] the deterministic
//! in-process double for engine tests. A deployment that needed a second
//! confirmation backend would add another implementation here.

pub mod breaker;
pub mod client;
pub mod error;
pub mod mock;
pub mod retry;
pub mod types;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use client::{HttpLedgerClient, LedgerClient, LedgerConfig};
pub use error::{
    CircuitOpen, LedgerClientError, StatusError, SubmissionFailure, SubmitError,
};
pub use mock::ScriptedLedgerClient;
pub use retry::RetryPolicy;
pub use types::{LedgerAck, LedgerStatus, SubmitAttestation, SubmitEnvelope};
