//! # In-Memory Repository
//!
//! A mutex-guarded map backend for tests and single-process deployments.
//! One lock covers both the record map and the content-hash index, so the
//! uniqueness check plus insert is a single atomic step and CAS
//! transitions serialize naturally.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use pv_core::{ContentHash, EvidenceId, Timestamp};

use crate::record::{
    EvidenceRecord, EvidenceStatus, InsertOutcome, NewEvidence, RecordPatch,
};
use crate::repo::{
    validate_transition, EvidenceRepository, Page, RecordQuery, SortOrder, StoreError,
};

#[derive(Default)]
struct Inner {
    records: HashMap<EvidenceId, EvidenceRecord>,
    by_hash: HashMap<ContentHash, EvidenceId>,
}

/// Mutex-guarded in-memory evidence repository.
#[derive(Default)]
pub struct InMemoryRepository {
    inner: Mutex<Inner>,
}

impl InMemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }
}

#[async_trait]
impl EvidenceRepository for InMemoryRepository {
    async fn insert_new(&self, new: NewEvidence) -> Result<InsertOutcome, StoreError> {
        let content_hash = ContentHash::compute(&new.document_bytes);
        let mut inner = self.inner.lock();

        if let Some(existing_id) = inner.by_hash.get(&content_hash) {
            let existing = inner.records[existing_id].clone();
            return Ok(InsertOutcome::Duplicate(existing));
        }

        let record = EvidenceRecord {
            id: EvidenceId::new(),
            content_hash,
            document_bytes: new.document_bytes,
            filename: new.filename,
            submitter_label: new.submitter_label,
            organization_label: new.organization_label,
            created_at: Timestamp::now(),
            fingerprint_hash: None,
            ledger_tx_id: None,
            status: EvidenceStatus::New,
            last_status_check_at: None,
            last_error: None,
        };
        inner.by_hash.insert(content_hash, record.id);
        inner.records.insert(record.id, record.clone());
        Ok(InsertOutcome::Created(record))
    }

    async fn transition(
        &self,
        id: EvidenceId,
        from: EvidenceStatus,
        to: EvidenceStatus,
        patch: RecordPatch,
    ) -> Result<EvidenceRecord, StoreError> {
        validate_transition(id, from, to, &patch)?;
        let mut inner = self.inner.lock();
        let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if record.status != from {
            return Err(StoreError::StaleState {
                id,
                expected: from,
                actual: record.status,
            });
        }

        patch.apply(record);
        record.status = to;
        Ok(record.clone())
    }

    async fn load(&self, id: EvidenceId) -> Result<Option<EvidenceRecord>, StoreError> {
        Ok(self.inner.lock().records.get(&id).cloned())
    }

    async fn list(&self, query: &RecordQuery) -> Result<Page<EvidenceRecord>, StoreError> {
        let inner = self.inner.lock();
        let mut matching: Vec<&EvidenceRecord> = inner
            .records
            .values()
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .filter(|r| {
                query
                    .organization_label
                    .as_deref()
                    .map_or(true, |org| r.organization_label == org)
            })
            .filter(|r| {
                query
                    .submitter_label
                    .as_deref()
                    .map_or(true, |sub| r.submitter_label == sub)
            })
            .collect();

        matching.sort_by(|a, b| {
            let ord = match query.sort {
                crate::repo::SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                crate::repo::SortField::LastStatusCheckAt => {
                    a.last_status_check_at.cmp(&b.last_status_check_at)
                }
            };
            match query.order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });

        let total = matching.len() as u64;
        let limit = query.effective_limit();
        let items = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();

        Ok(Page {
            items,
            total,
            limit,
            offset: query.offset,
        })
    }

    async fn sweep(
        &self,
        statuses: &[EvidenceStatus],
        limit: u32,
    ) -> Result<Vec<EvidenceRecord>, StoreError> {
        let inner = self.inner.lock();
        let mut due: Vec<&EvidenceRecord> = inner
            .records
            .values()
            .filter(|r| statuses.contains(&r.status))
            .collect();
        // Never-polled records sort first, then least-recently-polled.
        due.sort_by(|a, b| a.last_status_check_at.cmp(&b.last_status_check_at));
        Ok(due.into_iter().take(limit as usize).cloned().collect())
    }

    async fn delete(&self, id: EvidenceId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        match inner.records.remove(&id) {
            Some(record) => {
                inner.by_hash.remove(&record.content_hash);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pv_core::LedgerTxId;
    use std::sync::Arc;

    fn pdf(name: &str) -> NewEvidence {
        NewEvidence {
            document_bytes: format!("%PDF-1.7 {name}").into_bytes(),
            filename: format!("{name}.pdf"),
            submitter_label: "alice".into(),
            organization_label: "Acme".into(),
        }
    }

    #[tokio::test]
    async fn insert_creates_new_record() {
        let repo = InMemoryRepository::new();
        let outcome = repo.insert_new(pdf("a")).await.unwrap();
        assert!(outcome.is_created());
        let record = outcome.record();
        assert_eq!(record.status, EvidenceStatus::New);
        assert!(record.ledger_tx_id.is_none());
        assert_eq!(
            record.content_hash,
            ContentHash::compute(b"%PDF-1.7 a")
        );
    }

    #[tokio::test]
    async fn duplicate_returns_existing_without_mutation() {
        let repo = InMemoryRepository::new();
        let first = repo.insert_new(pdf("a")).await.unwrap();

        // Same bytes, different labels.
        let mut second_input = pdf("a");
        second_input.filename = "renamed.pdf".into();
        second_input.submitter_label = "bob".into();
        let second = repo.insert_new(second_input).await.unwrap();

        assert!(!second.is_created());
        assert_eq!(second.record().id, first.record().id);
        // Labels on the existing record are unchanged.
        assert_eq!(second.record().filename, "a.pdf");
        assert_eq!(second.record().submitter_label, "alice");
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_inserts_resolve_to_one_created() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.insert_new(pdf("same")).await.unwrap()
            }));
        }

        let mut created = 0;
        let mut duplicate_ids = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                InsertOutcome::Created(r) => {
                    created += 1;
                    duplicate_ids.push(r.id);
                }
                InsertOutcome::Duplicate(r) => duplicate_ids.push(r.id),
            }
        }
        assert_eq!(created, 1);
        assert!(duplicate_ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn transition_cas_success_applies_patch() {
        let repo = InMemoryRepository::new();
        let record = repo.insert_new(pdf("a")).await.unwrap().record().clone();

        let updated = repo
            .transition(
                record.id,
                EvidenceStatus::New,
                EvidenceStatus::Submitted,
                RecordPatch::none().with_tx_id(LedgerTxId::new("tx-1")),
            )
            .await
            .unwrap();

        assert_eq!(updated.status, EvidenceStatus::Submitted);
        assert_eq!(updated.ledger_tx_id.as_ref().unwrap().as_str(), "tx-1");
    }

    #[tokio::test]
    async fn transition_cas_mismatch_is_stale_state() {
        let repo = InMemoryRepository::new();
        let record = repo.insert_new(pdf("a")).await.unwrap().record().clone();

        repo.transition(
            record.id,
            EvidenceStatus::New,
            EvidenceStatus::Submitted,
            RecordPatch::none(),
        )
        .await
        .unwrap();

        // A second worker still believing the record is NEW loses the race.
        let err = repo
            .transition(
                record.id,
                EvidenceStatus::New,
                EvidenceStatus::Submitted,
                RecordPatch::none(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleState { .. }));
    }

    #[tokio::test]
    async fn concurrent_cas_has_exactly_one_winner() {
        let repo = Arc::new(InMemoryRepository::new());
        let record = repo.insert_new(pdf("a")).await.unwrap().record().clone();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            let id = record.id;
            handles.push(tokio::spawn(async move {
                repo.transition(
                    id,
                    EvidenceStatus::New,
                    EvidenceStatus::Submitted,
                    RecordPatch::none(),
                )
                .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn illegal_transition_rejected() {
        let repo = InMemoryRepository::new();
        let record = repo.insert_new(pdf("a")).await.unwrap().record().clone();

        let err = repo
            .transition(
                record.id,
                EvidenceStatus::New,
                EvidenceStatus::PendingCommitment,
                RecordPatch::none(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn finalized_record_accepts_only_poll_stamp() {
        let repo = InMemoryRepository::new();
        let record = repo.insert_new(pdf("a")).await.unwrap().record().clone();
        repo.transition(
            record.id,
            EvidenceStatus::New,
            EvidenceStatus::Submitted,
            RecordPatch::none().with_tx_id(LedgerTxId::new("tx")),
        )
        .await
        .unwrap();
        repo.transition(
            record.id,
            EvidenceStatus::Submitted,
            EvidenceStatus::FinalizedCommitment,
            RecordPatch::none(),
        )
        .await
        .unwrap();

        let err = repo
            .transition(
                record.id,
                EvidenceStatus::FinalizedCommitment,
                EvidenceStatus::FinalizedCommitment,
                RecordPatch::none().with_tx_id(LedgerTxId::new("tx-2")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ImmutableRecord(_)));

        repo.transition(
            record.id,
            EvidenceStatus::FinalizedCommitment,
            EvidenceStatus::FinalizedCommitment,
            RecordPatch::none().with_status_check(Timestamp::now()),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn transition_on_missing_record_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo
            .transition(
                EvidenceId::new(),
                EvidenceStatus::New,
                EvidenceStatus::Submitted,
                RecordPatch::none(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let repo = InMemoryRepository::new();
        for i in 0..5 {
            let mut input = pdf(&format!("doc{i}"));
            if i % 2 == 0 {
                input.organization_label = "Beta".into();
            }
            repo.insert_new(input).await.unwrap();
        }

        let all = repo.list(&RecordQuery::default()).await.unwrap();
        assert_eq!(all.total, 5);
        assert_eq!(all.items.len(), 5);

        let beta = repo
            .list(&RecordQuery {
                organization_label: Some("Beta".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(beta.total, 3);

        let page = repo
            .list(&RecordQuery {
                limit: 2,
                offset: 4,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, 5);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let repo = InMemoryRepository::new();
        let a = repo.insert_new(pdf("a")).await.unwrap().record().clone();
        repo.insert_new(pdf("b")).await.unwrap();
        repo.transition(
            a.id,
            EvidenceStatus::New,
            EvidenceStatus::Submitted,
            RecordPatch::none(),
        )
        .await
        .unwrap();

        let submitted = repo
            .list(&RecordQuery {
                status: Some(EvidenceStatus::Submitted),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(submitted.total, 1);
        assert_eq!(submitted.items[0].id, a.id);
    }

    #[tokio::test]
    async fn sweep_returns_least_recently_polled_first() {
        let repo = InMemoryRepository::new();
        let a = repo.insert_new(pdf("a")).await.unwrap().record().clone();
        let b = repo.insert_new(pdf("b")).await.unwrap().record().clone();
        for id in [a.id, b.id] {
            repo.transition(
                id,
                EvidenceStatus::New,
                EvidenceStatus::Submitted,
                RecordPatch::none(),
            )
            .await
            .unwrap();
        }
        // Only b has been polled; a (never polled) must sweep first.
        repo.transition(
            b.id,
            EvidenceStatus::Submitted,
            EvidenceStatus::Submitted,
            RecordPatch::none().with_status_check(Timestamp::now()),
        )
        .await
        .unwrap();

        let due = repo
            .sweep(&[EvidenceStatus::Submitted], 10)
            .await
            .unwrap();
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].id, a.id);
        assert_eq!(due[1].id, b.id);

        // Terminal states are not swept.
        let none = repo
            .sweep(&[EvidenceStatus::FinalizedCommitment], 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_record_and_frees_hash() {
        let repo = InMemoryRepository::new();
        let record = repo.insert_new(pdf("a")).await.unwrap().record().clone();

        assert!(repo.delete(record.id).await.unwrap());
        assert!(!repo.delete(record.id).await.unwrap());
        assert!(repo.load(record.id).await.unwrap().is_none());

        // The content hash is free again.
        let again = repo.insert_new(pdf("a")).await.unwrap();
        assert!(again.is_created());
    }
}
