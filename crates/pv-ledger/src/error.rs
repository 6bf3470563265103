//! # Ledger Failure Taxonomy
//!
//! Every transport failure is classified into [`LedgerClientError`]
//! before any policy decision happens, and each variant maps onto the
//! shared [`ErrorCategory`]. The confirmation engine matches on these
//! types exhaustively — there is no stringly-typed error handling
//! anywhere between the wire and the state machine.

use thiserror::Error;

use pv_core::ErrorCategory;

/// A categorized failure from one ledger call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerClientError {
    /// Connection refused, DNS failure, socket close.
    #[error("ledger network error: {reason}")]
    Network {
        /// Transport-level detail.
        reason: String,
    },

    /// The per-call deadline elapsed.
    #[error("ledger request timed out after {elapsed_ms}ms")]
    Timeout {
        /// Configured deadline in milliseconds.
        elapsed_ms: u64,
    },

    /// The ledger answered with a 5xx status.
    #[error("ledger server error: HTTP {status} — {body}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// The ledger answered 429.
    #[error("ledger rate limited: HTTP {status}")]
    RateLimited {
        /// HTTP status code (429).
        status: u16,
    },

    /// The ledger answered a non-429 4xx; the request itself is
    /// malformed (bad signature, hash mismatch) and retrying cannot help.
    #[error("ledger rejected request: HTTP {status} — {body}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        body: String,
    },

    /// Anything that fits no other class.
    #[error("ledger unknown error: {reason}")]
    Unknown {
        /// Whatever detail is available.
        reason: String,
    },
}

impl LedgerClientError {
    /// The taxonomy category of this failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } => ErrorCategory::Network,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Server { .. } => ErrorCategory::Server,
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::Client { .. } => ErrorCategory::Client,
            Self::Unknown { .. } => ErrorCategory::Unknown,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// A request short-circuited by an open circuit breaker.
///
/// Not counted as a submission attempt; the network was never touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("circuit open for ledger endpoint {endpoint}")]
pub struct CircuitOpen {
    /// The logical endpoint whose breaker is open.
    pub endpoint: &'static str,
}

/// The ordered per-attempt errors after submission retries ran out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ledger submission failed after {} attempts; last: {}", .attempts.len(), last_message(.attempts))]
pub struct SubmissionFailure {
    /// Each attempt's categorized error, in order.
    pub attempts: Vec<LedgerClientError>,
}

fn last_message(attempts: &[LedgerClientError]) -> String {
    attempts
        .last()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no attempts recorded".to_string())
}

impl SubmissionFailure {
    /// The category of the final attempt.
    pub fn final_category(&self) -> ErrorCategory {
        self.attempts
            .last()
            .map(|e| e.category())
            .unwrap_or(ErrorCategory::Unknown)
    }
}

/// Outcome classification of a failed `submit`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The breaker was open; nothing reached the network.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),

    /// A non-retryable rejection; the attestation needs caller
    /// intervention.
    #[error("ledger rejected submission: {0}")]
    Rejected(LedgerClientError),

    /// All retryable attempts were consumed.
    #[error(transparent)]
    RetriesExhausted(#[from] SubmissionFailure),
}

/// Outcome classification of a failed `get_status`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// The breaker was open; nothing reached the network.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),

    /// The query itself failed.
    #[error("ledger status query failed: {0}")]
    Query(LedgerClientError),
}

impl StatusError {
    /// The taxonomy category of this failure.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CircuitOpen(_) => ErrorCategory::CircuitOpen,
            Self::Query(e) => e.category(),
        }
    }
}
