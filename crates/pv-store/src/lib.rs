//! # pv-store — Evidence Persistence
//!
//! Owns the [`EvidenceRecord`] model and the repository contract that is
//! the single shared write path for record mutations.
//!
//! ## Concurrency Model
//!
//! Every mutation after the initial insert is a compare-and-swap on the
//! record's status: the update applies only if the current status equals
//! the expected one, and a mismatch surfaces as
//! [`StoreError::StaleState`]. The CAS is the serialization point — per
//! record, transitions are totally ordered, and concurrent workers racing
//! on the same record resolve to exactly one winner without any
//! application-level lock.
//!
//! ## Backends
//!
//! - [`InMemoryRepository`] — a mutex-guarded map, used by tests and
//!   single-process deployments.
//! - [`PgEvidenceRepository`] — PostgreSQL via SQLx, where uniqueness is
//!   the `content_hash UNIQUE` constraint and CAS is
//!   `UPDATE … WHERE id = $1 AND status = $2`.

pub mod memory;
pub mod postgres;
pub mod record;
pub mod repo;

pub use memory::InMemoryRepository;
pub use postgres::{init_pool, PgEvidenceRepository};
pub use record::{
    EvidenceRecord, EvidenceStatus, InsertOutcome, NewEvidence, RecordError, RecordPatch,
};
pub use repo::{EvidenceRepository, Page, RecordQuery, SortField, SortOrder, StoreError};
