//! # Registration Service
//!
//! The public contract consumed by the HTTP edge. `register` validates,
//! inserts, enqueues, and returns immediately — confirmation progresses
//! asynchronously and is observable through `get_record`. Ledger trouble
//! never fails a registration.

use std::sync::Arc;

use pv_core::EvidenceId;
use pv_crypto::KeyStore;
use pv_ledger::LedgerClient;
use pv_store::{
    EvidenceRepository, InsertOutcome, NewEvidence, Page, RecordQuery, StoreError,
};

use crate::config::RegistrationConfig;
use crate::engine::ConfirmationEngine;
use crate::error::{RegistrationError, ValidationError, VerifyError};
use crate::verify::{verify_record, VerificationReport};
use crate::views::RecordView;

/// Magic-byte prefix every accepted document must carry.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Maximum label length in bytes.
const MAX_LABEL_BYTES: usize = 255;

/// Outcome of a registration request.
#[derive(Debug)]
pub enum RegistrationOutcome {
    /// A new record was created and queued for confirmation.
    Created(RecordView),
    /// The content hash was already registered; the existing record is
    /// returned untouched (a conflict at the HTTP layer).
    AlreadyExists(RecordView),
}

impl RegistrationOutcome {
    /// The record view either way.
    pub fn view(&self) -> &RecordView {
        match self {
            Self::Created(view) | Self::AlreadyExists(view) => view,
        }
    }

    /// Whether this registration created a new record.
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// The public registration, query, verification, and retry surface.
pub struct RegistrationService {
    repo: Arc<dyn EvidenceRepository>,
    engine: Arc<ConfirmationEngine>,
    ledger: Arc<dyn LedgerClient>,
    keystore: Arc<KeyStore>,
    config: RegistrationConfig,
}

impl RegistrationService {
    /// Assemble the service over a repository, a running engine, and the
    /// same ledger client and signer identity the engine uses.
    pub fn new(
        repo: Arc<dyn EvidenceRepository>,
        engine: Arc<ConfirmationEngine>,
        ledger: Arc<dyn LedgerClient>,
        keystore: Arc<KeyStore>,
        config: RegistrationConfig,
    ) -> Self {
        Self {
            repo,
            engine,
            ledger,
            keystore,
            config,
        }
    }

    /// Accept raw bytes plus metadata, returning a record handle
    /// immediately. On `Created`, the record is durable before this
    /// returns and confirmation is queued fire-and-forget.
    pub async fn register(
        &self,
        new: NewEvidence,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        self.validate(&new)?;

        match self.repo.insert_new(new).await? {
            InsertOutcome::Created(record) => {
                tracing::info!(
                    id = %record.id,
                    content_hash = %record.content_hash,
                    "evidence registered"
                );
                self.engine.enqueue(record.id);
                Ok(RegistrationOutcome::Created(record.into()))
            }
            InsertOutcome::Duplicate(existing) => {
                tracing::info!(
                    id = %existing.id,
                    content_hash = %existing.content_hash,
                    "duplicate registration"
                );
                Ok(RegistrationOutcome::AlreadyExists(existing.into()))
            }
        }
    }

    /// Current status and all non-byte fields of a record.
    pub async fn get_record(
        &self,
        id: EvidenceId,
    ) -> Result<Option<RecordView>, RegistrationError> {
        Ok(self.repo.load(id).await?.map(RecordView::from))
    }

    /// List records with filters, pagination, and allowlisted sorting.
    pub async fn list_records(
        &self,
        query: &RecordQuery,
    ) -> Result<Page<RecordView>, RegistrationError> {
        Ok(self.repo.list(query).await?.map(RecordView::from))
    }

    /// Operator retry of an errored record.
    pub async fn retry(&self, id: EvidenceId) -> Result<RecordView, StoreError> {
        Ok(self.engine.retry(id).await?.into())
    }

    /// Operator hard delete.
    pub async fn delete(&self, id: EvidenceId) -> Result<bool, StoreError> {
        self.repo.delete(id).await
    }

    /// Re-run the fingerprint derivation on the stored record and consult
    /// the ledger; any discrepancy yields a NOT-VERIFIED report. The
    /// record is never mutated.
    pub async fn verify(&self, id: EvidenceId) -> Result<VerificationReport, VerifyError> {
        verify_record(&self.repo, &self.ledger, &self.keystore, id).await
    }

    fn validate(&self, new: &NewEvidence) -> Result<(), ValidationError> {
        if !new.document_bytes.starts_with(PDF_MAGIC) {
            return Err(ValidationError::NotPdf);
        }
        if new.document_bytes.len() > self.config.max_bytes {
            return Err(ValidationError::TooLarge {
                size: new.document_bytes.len(),
                max: self.config.max_bytes,
            });
        }
        check_label("filename", &new.filename)?;
        check_label("submitter_label", &new.submitter_label)?;
        check_label("organization_label", &new.organization_label)?;
        Ok(())
    }
}

fn check_label(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingLabel { field });
    }
    if value.len() > MAX_LABEL_BYTES {
        return Err(ValidationError::LabelTooLong {
            field,
            len: value.len(),
        });
    }
    Ok(())
}
