//! # Repository Contract
//!
//! The `EvidenceRepository` trait is the single shared write path for
//! evidence records. Implementations must guarantee:
//!
//! - `insert_new` resolves concurrent inserts of identical content to
//!   exactly one `Created` outcome; all others observe `Duplicate`.
//! - `transition` is a compare-and-swap on `status`: the patch applies
//!   only when the current status equals the expected one, and the legal
//!   transition graph is enforced at this seam.
//! - `list` accepts only allowlisted sort fields and parameterizes every
//!   filter value.

use async_trait::async_trait;
use thiserror::Error;

use pv_core::EvidenceId;

use crate::record::{
    EvidenceRecord, EvidenceStatus, InsertOutcome, NewEvidence, RecordPatch,
};

/// Error from repository operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// CAS mismatch: the record's status was not the expected one.
    ///
    /// Benign under concurrency — another worker advanced the record.
    /// Callers treat it as success for idempotency.
    #[error("stale state on {id}: expected {expected}, found {actual}")]
    StaleState {
        /// The record that was being transitioned.
        id: EvidenceId,
        /// The status the caller expected.
        expected: EvidenceStatus,
        /// The status actually found.
        actual: EvidenceStatus,
    },

    /// No record with the given id.
    #[error("evidence record not found: {0}")]
    NotFound(EvidenceId),

    /// The requested edge is not part of the state machine.
    #[error("illegal transition {from} -> {to}")]
    IllegalTransition {
        /// Requested source status.
        from: EvidenceStatus,
        /// Requested target status.
        to: EvidenceStatus,
    },

    /// Finalized records accept only poll-stamp patches.
    #[error("record {0} is finalized; only the poll stamp may change")]
    ImmutableRecord(EvidenceId),

    /// A stored row could not be mapped back into the closed model.
    #[error("corrupt record row: {0}")]
    Corrupt(String),

    /// Backend failure (connection, constraint, serialization).
    #[error("store backend error: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Sort fields exposed by `list`. A closed allowlist — sort input never
/// reaches SQL as a raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    /// Order by ingest time.
    #[default]
    CreatedAt,
    /// Order by the last ledger poll.
    LastStatusCheckAt,
}

impl SortField {
    /// The backing column name.
    pub fn as_column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::LastStatusCheckAt => "last_status_check_at",
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first.
    #[default]
    Descending,
    /// Oldest first.
    Ascending,
}

impl SortOrder {
    /// The SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Descending => "DESC",
            Self::Ascending => "ASC",
        }
    }
}

/// Filters, pagination, and sorting for `list`.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    /// Restrict to one status.
    pub status: Option<EvidenceStatus>,
    /// Restrict to one organization label.
    pub organization_label: Option<String>,
    /// Restrict to one submitter label.
    pub submitter_label: Option<String>,
    /// Sort field (allowlisted).
    pub sort: SortField,
    /// Sort direction.
    pub order: SortOrder,
    /// Page size; zero means the default of 50.
    pub limit: u32,
    /// Page offset.
    pub offset: u64,
}

impl RecordQuery {
    /// Effective page size.
    pub fn effective_limit(&self) -> u32 {
        if self.limit == 0 {
            50
        } else {
            self.limit
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// The records on this page.
    pub items: Vec<T>,
    /// Total matching records across all pages.
    pub total: u64,
    /// The limit that produced this page.
    pub limit: u32,
    /// The offset that produced this page.
    pub offset: u64,
}

impl<T> Page<T> {
    /// Map the page items, keeping the paging envelope.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// The persistence contract for evidence records.
#[async_trait]
pub trait EvidenceRepository: Send + Sync {
    /// Insert a new record with status NEW, or return the existing record
    /// when the content hash is already present. The uniqueness check and
    /// insert are atomic.
    async fn insert_new(&self, new: NewEvidence) -> Result<InsertOutcome, StoreError>;

    /// Compare-and-swap the record's status and apply the patch.
    ///
    /// Validates the `from → to` edge against the state machine, then
    /// applies atomically only if the current status equals `from`.
    /// Returns the updated record.
    async fn transition(
        &self,
        id: EvidenceId,
        from: EvidenceStatus,
        to: EvidenceStatus,
        patch: RecordPatch,
    ) -> Result<EvidenceRecord, StoreError>;

    /// Load a record by id.
    async fn load(&self, id: EvidenceId) -> Result<Option<EvidenceRecord>, StoreError>;

    /// List records with filters, pagination, and allowlisted sorting.
    async fn list(&self, query: &RecordQuery) -> Result<Page<EvidenceRecord>, StoreError>;

    /// Records in the given statuses, least-recently-polled first.
    ///
    /// Drives the confirmation engine's recovery sweep; backed by the
    /// `(status, last_status_check_at)` index.
    async fn sweep(
        &self,
        statuses: &[EvidenceStatus],
        limit: u32,
    ) -> Result<Vec<EvidenceRecord>, StoreError>;

    /// Operator-initiated hard delete. Returns whether a record existed.
    async fn delete(&self, id: EvidenceId) -> Result<bool, StoreError>;
}

/// Shared transition validation for all backends.
pub(crate) fn validate_transition(
    id: EvidenceId,
    from: EvidenceStatus,
    to: EvidenceStatus,
    patch: &RecordPatch,
) -> Result<(), StoreError> {
    if !EvidenceStatus::can_transition(from, to) {
        return Err(StoreError::IllegalTransition { from, to });
    }
    if from == EvidenceStatus::FinalizedCommitment && !patch.is_status_check_only() {
        return Err(StoreError::ImmutableRecord(id));
    }
    Ok(())
}
