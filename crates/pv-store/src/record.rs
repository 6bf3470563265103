//! # Evidence Records and the Status State Machine
//!
//! [`EvidenceStatus`] is a closed enumeration — unknown status values can
//! be neither stored nor read back. The legal transition graph lives in
//! [`EvidenceStatus::can_transition`] with no wildcard arms, so adding a
//! status forces every policy decision to be revisited.
//!
//! ```text
//! NEW ──submit──► SUBMITTED ──first poll──► PENDING_COMMITMENT
//!  │                 │                          │
//!  │ client error    │ client error             │ ledger finalized
//!  ▼                 ▼                          ▼
//! ERRORED_COMMITMENT ◄── ledger errored ── FINALIZED_COMMITMENT (terminal)
//!        │
//!        └── operator retry ──► SUBMITTED
//! ```

use serde::{Deserialize, Serialize};

use pv_core::{ContentHash, ErrorCategory, EvidenceId, FingerprintHash, LedgerTxId, Timestamp};

/// Confirmation status of an evidence record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceStatus {
    /// Ingested; not yet accepted by the ledger.
    New,
    /// The ledger acknowledged the submission.
    Submitted,
    /// The ledger reports the attestation as pending commitment.
    PendingCommitment,
    /// The ledger finalized the commitment. Terminal.
    FinalizedCommitment,
    /// Confirmation failed. Terminal unless an operator retries.
    ErroredCommitment,
}

impl EvidenceStatus {
    /// The canonical storage/wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Submitted => "SUBMITTED",
            Self::PendingCommitment => "PENDING_COMMITMENT",
            Self::FinalizedCommitment => "FINALIZED_COMMITMENT",
            Self::ErroredCommitment => "ERRORED_COMMITMENT",
        }
    }

    /// Parse a stored status name. Unknown names are rejected, never
    /// defaulted — a row carrying one indicates corruption.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(Self::New),
            "SUBMITTED" => Some(Self::Submitted),
            "PENDING_COMMITMENT" => Some(Self::PendingCommitment),
            "FINALIZED_COMMITMENT" => Some(Self::FinalizedCommitment),
            "ERRORED_COMMITMENT" => Some(Self::ErroredCommitment),
            _ => None,
        }
    }

    /// Whether polling stops at this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FinalizedCommitment | Self::ErroredCommitment)
    }

    /// Whether `from → to` is a legal edge of the state machine.
    ///
    /// Self-transitions are legal everywhere: they are how CAS-guarded
    /// patches (poll stamps, recorded errors) apply without a status
    /// change. The only backward edge is the operator retry
    /// `ERRORED_COMMITMENT → SUBMITTED`.
    pub fn can_transition(from: Self, to: Self) -> bool {
        if from == to {
            return true;
        }
        match (from, to) {
            (Self::New, Self::Submitted) => true,
            // A non-retryable rejection at submit time skips SUBMITTED.
            (Self::New, Self::ErroredCommitment) => true,
            (Self::Submitted, Self::PendingCommitment) => true,
            (Self::Submitted, Self::FinalizedCommitment) => true,
            (Self::Submitted, Self::ErroredCommitment) => true,
            (Self::PendingCommitment, Self::FinalizedCommitment) => true,
            (Self::PendingCommitment, Self::ErroredCommitment) => true,
            (Self::ErroredCommitment, Self::Submitted) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for EvidenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured error recorded on a record after a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    /// Failure class from the shared taxonomy.
    pub category: ErrorCategory,
    /// Human-readable detail.
    pub message: String,
}

impl RecordError {
    /// Build a record error.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Input to [`crate::EvidenceRepository::insert_new`].
#[derive(Clone)]
pub struct NewEvidence {
    /// Raw document bytes. Never transmitted to the ledger.
    pub document_bytes: Vec<u8>,
    /// Display filename.
    pub filename: String,
    /// Display submitter label.
    pub submitter_label: String,
    /// Display organization label.
    pub organization_label: String,
}

impl std::fmt::Debug for NewEvidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewEvidence")
            .field("document_bytes", &format!("<{} bytes>", self.document_bytes.len()))
            .field("filename", &self.filename)
            .field("submitter_label", &self.submitter_label)
            .field("organization_label", &self.organization_label)
            .finish()
    }
}

/// The canonical unit of persisted state.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    /// Server-assigned record identifier.
    pub id: EvidenceId,
    /// SHA-256 of the document bytes; unique across all records.
    pub content_hash: ContentHash,
    /// Raw document bytes, at rest only.
    pub document_bytes: Vec<u8>,
    /// Display filename (not trusted for authorization).
    pub filename: String,
    /// Display submitter label.
    pub submitter_label: String,
    /// Display organization label.
    pub organization_label: String,
    /// Ingest timestamp.
    pub created_at: Timestamp,
    /// Fingerprint of the canonicalized attestation content, once built.
    pub fingerprint_hash: Option<FingerprintHash>,
    /// Ledger transaction id, once a submission was acknowledged.
    pub ledger_tx_id: Option<LedgerTxId>,
    /// Confirmation status.
    pub status: EvidenceStatus,
    /// When the ledger was last polled for this record.
    pub last_status_check_at: Option<Timestamp>,
    /// The most recent failure, if any.
    pub last_error: Option<RecordError>,
}

impl std::fmt::Debug for EvidenceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceRecord")
            .field("id", &self.id)
            .field("content_hash", &self.content_hash)
            .field("document_bytes", &format!("<{} bytes>", self.document_bytes.len()))
            .field("filename", &self.filename)
            .field("status", &self.status)
            .field("ledger_tx_id", &self.ledger_tx_id)
            .finish_non_exhaustive()
    }
}

/// Outcome of an insert attempt.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// A new record was created with status NEW.
    Created(EvidenceRecord),
    /// A record with the same content hash already exists; nothing was
    /// mutated.
    Duplicate(EvidenceRecord),
}

impl InsertOutcome {
    /// The record either way.
    pub fn record(&self) -> &EvidenceRecord {
        match self {
            Self::Created(r) | Self::Duplicate(r) => r,
        }
    }

    /// Whether this insert created a new record.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Fields applied alongside a CAS transition.
///
/// `None` fields are left untouched. `clear_last_error` wipes the stored
/// error (used by the operator retry path).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPatch {
    /// Set the ledger transaction id.
    pub ledger_tx_id: Option<LedgerTxId>,
    /// Set the attestation fingerprint.
    pub fingerprint_hash: Option<FingerprintHash>,
    /// Record a failure.
    pub last_error: Option<RecordError>,
    /// Wipe any recorded failure.
    pub clear_last_error: bool,
    /// Stamp the latest ledger poll.
    pub last_status_check_at: Option<Timestamp>,
}

impl RecordPatch {
    /// An empty patch (status change only).
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the ledger transaction id.
    pub fn with_tx_id(mut self, tx_id: LedgerTxId) -> Self {
        self.ledger_tx_id = Some(tx_id);
        self
    }

    /// Set the attestation fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: FingerprintHash) -> Self {
        self.fingerprint_hash = Some(fingerprint);
        self
    }

    /// Record a failure.
    pub fn with_error(mut self, error: RecordError) -> Self {
        self.last_error = Some(error);
        self
    }

    /// Wipe any recorded failure.
    pub fn clearing_error(mut self) -> Self {
        self.clear_last_error = true;
        self
    }

    /// Stamp the latest ledger poll.
    pub fn with_status_check(mut self, at: Timestamp) -> Self {
        self.last_status_check_at = Some(at);
        self
    }

    /// Whether the patch touches nothing but the poll stamp.
    ///
    /// Records in FINALIZED_COMMITMENT accept only such patches.
    pub fn is_status_check_only(&self) -> bool {
        self.ledger_tx_id.is_none()
            && self.fingerprint_hash.is_none()
            && self.last_error.is_none()
            && !self.clear_last_error
    }

    /// Apply the patch to a record in place.
    pub fn apply(&self, record: &mut EvidenceRecord) {
        if let Some(tx_id) = &self.ledger_tx_id {
            record.ledger_tx_id = Some(tx_id.clone());
        }
        if let Some(fp) = &self.fingerprint_hash {
            record.fingerprint_hash = Some(*fp);
        }
        if self.clear_last_error {
            record.last_error = None;
        }
        if let Some(err) = &self.last_error {
            record.last_error = Some(err.clone());
        }
        if let Some(at) = &self.last_status_check_at {
            record.last_status_check_at = Some(*at);
        }
    }
}
