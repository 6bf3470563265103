//! # Evidence Identifiers
//!
//! Newtype wrapper for the evidence record identifier. Using a dedicated
//! type instead of a bare UUID keeps record ids from being confused with
//! ledger transaction ids or any other identifier namespace.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an evidence record, assigned on first ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceId(pub Uuid);

impl EvidenceId {
    /// Generate a new random (v4) evidence identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse from the canonical hyphenated form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for EvidenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque transaction identifier returned by the ledger on accepted
/// submission.
///
/// Fully opaque: nothing in the system derives meaning from its shape,
/// and it is never conflated with timestamps or ordinals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedgerTxId(pub String);

impl LedgerTxId {
    /// Wrap a ledger-issued identifier.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LedgerTxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
