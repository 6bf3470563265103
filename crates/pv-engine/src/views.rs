//! Byte-free projections of evidence records.
//!
//! Everything the HTTP edge may surface: all record fields except the
//! document bytes, which never leave the repository.

use serde::Serialize;

use pv_core::{ContentHash, EvidenceId, FingerprintHash, LedgerTxId, Timestamp};
use pv_store::{EvidenceRecord, EvidenceStatus, RecordError};

/// An evidence record without its document bytes.
#[derive(Debug, Clone, Serialize)]
pub struct RecordView {
    /// Record identifier.
    pub id: EvidenceId,
    /// Content hash of the document bytes.
    pub content_hash: ContentHash,
    /// Display filename.
    pub filename: String,
    /// Display submitter label.
    pub submitter_label: String,
    /// Display organization label.
    pub organization_label: String,
    /// Ingest timestamp.
    pub created_at: Timestamp,
    /// Attestation fingerprint, once built.
    pub fingerprint_hash: Option<FingerprintHash>,
    /// Ledger transaction id, once acknowledged.
    pub ledger_tx_id: Option<LedgerTxId>,
    /// Confirmation status.
    pub status: EvidenceStatus,
    /// When the ledger was last polled.
    pub last_status_check_at: Option<Timestamp>,
    /// The most recent failure, if any.
    pub last_error: Option<RecordError>,
}

impl From<EvidenceRecord> for RecordView {
    fn from(record: EvidenceRecord) -> Self {
        Self {
            id: record.id,
            content_hash: record.content_hash,
            filename: record.filename,
            submitter_label: record.submitter_label,
            organization_label: record.organization_label,
            created_at: record.created_at,
            fingerprint_hash: record.fingerprint_hash,
            ledger_tx_id: record.ledger_tx_id,
            status: record.status,
            last_status_check_at: record.last_status_check_at,
            last_error: record.last_error,
        }
    }
}
