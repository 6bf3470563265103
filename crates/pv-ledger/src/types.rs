//! # Wire Types
//!
//! The submission envelope, acknowledgement, and status enumeration —
//! tagged Rust types at the edge of the ledger's loosely-shaped JSON.
//! Response parsing returns typed values or categorized errors; nothing
//! downstream ever inspects raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pv_attest::{Attestation, AttestationContent, AttestationMetadata, AttestationProof};
use pv_core::{FingerprintHash, LedgerTxId};

/// The signed part of a submission envelope.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitAttestation<'a> {
    /// The signed content object.
    pub content: &'a AttestationContent,
    /// Proofs over the content.
    pub proofs: &'a [AttestationProof],
}

/// One element of the submission payload array.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitEnvelope<'a> {
    /// Signed attestation material.
    pub attestation: SubmitAttestation<'a>,
    /// Display metadata (fingerprint, organization, tags).
    pub metadata: &'a AttestationMetadata,
}

impl<'a> SubmitEnvelope<'a> {
    /// Wrap an attestation as the single-element payload the ledger
    /// submission endpoint expects.
    pub fn payload(attestation: &'a Attestation) -> [SubmitEnvelope<'a>; 1] {
        [SubmitEnvelope {
            attestation: SubmitAttestation {
                content: &attestation.content,
                proofs: &attestation.proofs,
            },
            metadata: &attestation.metadata,
        }]
    }
}

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAck {
    /// The ledger-issued transaction identifier.
    pub tx_id: LedgerTxId,
    /// True when the ledger response carried no identifier and the
    /// locally computed fingerprint was recorded instead.
    pub synthetic: bool,
}

/// The ledger's opinion of a submitted attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerStatus {
    /// Accepted, not yet committed.
    PendingCommitment,
    /// Committed; terminal on the ledger side.
    FinalizedCommitment,
    /// Commitment failed; terminal on the ledger side.
    ErroredCommitment,
    /// The ledger does not (yet) know the transaction.
    NotFound,
}

impl LedgerStatus {
    /// The canonical wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingCommitment => "PENDING_COMMITMENT",
            Self::FinalizedCommitment => "FINALIZED_COMMITMENT",
            Self::ErroredCommitment => "ERRORED_COMMITMENT",
            Self::NotFound => "NOT_FOUND",
        }
    }

    /// Parse a wire status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING_COMMITMENT" => Some(Self::PendingCommitment),
            "FINALIZED_COMMITMENT" => Some(Self::FinalizedCommitment),
            "ERRORED_COMMITMENT" => Some(Self::ErroredCommitment),
            "NOT_FOUND" => Some(Self::NotFound),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedgerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extract the acknowledgement from a submission response body.
///
/// The ledger answers with one of several shapes: a top-level `hash` or
/// `fingerprintHash`, the same nested under `data`, or an array of such
/// objects. The first identifier found wins. When none is present, the
/// locally computed fingerprint stands in and the ack is marked
/// synthetic.
pub fn parse_ack(body: &Value, local_fingerprint: &FingerprintHash) -> LedgerAck {
    let candidate = match body {
        Value::Array(items) => items.first().and_then(extract_id),
        other => extract_id(other),
    };

    match candidate {
        Some(id) => LedgerAck {
            tx_id: LedgerTxId::new(id),
            synthetic: false,
        },
        None => LedgerAck {
            tx_id: LedgerTxId::new(local_fingerprint.to_hex()),
            synthetic: true,
        },
    }
}

fn extract_id(value: &Value) -> Option<String> {
    let direct = value
        .get("hash")
        .or_else(|| value.get("fingerprintHash"))
        .and_then(Value::as_str);
    if let Some(id) = direct {
        return Some(id.to_string());
    }
    value
        .get("data")
        .and_then(|data| data.get("hash").or_else(|| data.get("fingerprintHash")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract the status from a status-query response body (`{data: {status}}`).
pub fn parse_status_body(body: &Value) -> Option<LedgerStatus> {
    body.get("data")
        .and_then(|data| data.get("status"))
        .and_then(Value::as_str)
        .and_then(LedgerStatus::parse)
}
