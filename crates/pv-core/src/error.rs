//! # Shared Error Types and Failure Taxonomy
//!
//! Defines the canonicalization error and the closed [`ErrorCategory`]
//! taxonomy that classifies every remote-call failure in the system.
//! Retry decisions, circuit-breaker accounting, and the `last_error`
//! column on evidence records all speak this taxonomy, so it lives at the
//! bottom of the dependency DAG.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical content; use strings
    /// or integers.
    #[error("float values are not permitted in canonical content: {0}")]
    FloatRejected(f64),

    /// The value could not be represented as JSON at all.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Error parsing a hex digest string.
#[derive(Error, Debug)]
pub enum DigestParseError {
    /// Wrong number of hex characters (64 expected).
    #[error("digest must be 64 hex chars, got {0}")]
    Length(usize),

    /// A non-hex character at the given offset.
    #[error("digest contains non-hex characters at offset {0}")]
    NonHex(usize),
}

/// Closed classification of remote-call failures.
///
/// Retryability is a property of the category, not of the call site:
/// transient transport conditions retry, everything else requires caller
/// intervention. No wildcard matches — adding a variant forces every
/// policy decision to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// Connection refused, DNS failure, socket close.
    Network,
    /// A per-call deadline elapsed.
    Timeout,
    /// The remote answered with a 5xx status.
    Server,
    /// The remote answered 429.
    RateLimited,
    /// The remote answered a non-429 4xx; the request itself is bad.
    Client,
    /// Anything that fits no other class.
    Unknown,
    /// A circuit breaker short-circuited the call.
    CircuitOpen,
    /// The per-record confirmation deadline elapsed.
    DeadlineExceeded,
}

impl ErrorCategory {
    /// The canonical wire/storage name of this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT_ERROR",
            Self::Server => "SERVER_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::Client => "CLIENT_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
        }
    }

    /// Whether a call failing with this category may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::Server | Self::RateLimited
        )
    }

    /// Parse a stored category name back into the closed enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NETWORK_ERROR" => Some(Self::Network),
            "TIMEOUT_ERROR" => Some(Self::Timeout),
            "SERVER_ERROR" => Some(Self::Server),
            "RATE_LIMITED" => Some(Self::RateLimited),
            "CLIENT_ERROR" => Some(Self::Client),
            "UNKNOWN_ERROR" => Some(Self::Unknown),
            "CIRCUIT_OPEN" => Some(Self::CircuitOpen),
            "DEADLINE_EXCEEDED" => Some(Self::DeadlineExceeded),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
