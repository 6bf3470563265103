//! # PostgreSQL Repository
//!
//! SQLx-backed persistence for evidence records.
//!
//! - Uniqueness rides the `content_hash UNIQUE` constraint:
//!   `INSERT … ON CONFLICT DO NOTHING RETURNING` decides Created vs
//!   Duplicate without a separate existence check.
//! - CAS transitions are a single
//!   `UPDATE … WHERE id = $1 AND status = $2`; `rows_affected` decides
//!   whether the swap won.
//! - Status strings are mapped through the closed [`EvidenceStatus`]
//!   enum on the way out; a row with an unknown status is corruption,
//!   not a default.

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use uuid::Uuid;

use async_trait::async_trait;

use pv_core::{ContentHash, ErrorCategory, EvidenceId, FingerprintHash, LedgerTxId, Timestamp};

use crate::record::{
    EvidenceRecord, EvidenceStatus, InsertOutcome, NewEvidence, RecordError, RecordPatch,
};
use crate::repo::{
    validate_transition, EvidenceRepository, Page, RecordQuery, StoreError,
};

const RECORD_COLUMNS: &str = "id, content_hash, document_bytes, filename, submitter_label, \
     organization_label, created_at, fingerprint_hash, ledger_tx_id, status, \
     last_status_check_at, last_error_category, last_error_message";

/// Initialize the connection pool and run embedded migrations.
///
/// Returns `None` when `DATABASE_URL` is not set — callers fall back to
/// the in-memory repository. Returns `Err` when the URL is set but the
/// connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — using the in-memory repository. \
                 Records will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    Ok(Some(pool))
}

/// PostgreSQL-backed evidence repository.
#[derive(Clone)]
pub struct PgEvidenceRepository {
    pool: PgPool,
}

impl PgEvidenceRepository {
    /// Wrap an initialized pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EvidenceRepository for PgEvidenceRepository {
    async fn insert_new(&self, new: NewEvidence) -> Result<InsertOutcome, StoreError> {
        let content_hash = ContentHash::compute(&new.document_bytes);
        let id = EvidenceId::new();
        let created_at = Timestamp::now();

        let inserted = sqlx::query_as::<_, EvidenceRow>(&format!(
            "INSERT INTO evidence_records \
             (id, content_hash, document_bytes, filename, submitter_label, \
              organization_label, created_at, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (content_hash) DO NOTHING \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id.0)
        .bind(content_hash.to_hex())
        .bind(&new.document_bytes)
        .bind(&new.filename)
        .bind(&new.submitter_label)
        .bind(&new.organization_label)
        .bind(created_at.as_datetime())
        .bind(EvidenceStatus::New.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome::Created(row.into_record()?));
        }

        // Conflict: fetch the record that owns this content hash.
        let existing = sqlx::query_as::<_, EvidenceRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM evidence_records WHERE content_hash = $1"
        ))
        .bind(content_hash.to_hex())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            StoreError::Corrupt(format!(
                "content hash {content_hash} conflicted but no row owns it"
            ))
        })?;

        Ok(InsertOutcome::Duplicate(existing.into_record()?))
    }

    async fn transition(
        &self,
        id: EvidenceId,
        from: EvidenceStatus,
        to: EvidenceStatus,
        patch: RecordPatch,
    ) -> Result<EvidenceRecord, StoreError> {
        validate_transition(id, from, to, &patch)?;

        let updated = sqlx::query_as::<_, EvidenceRow>(&format!(
            "UPDATE evidence_records SET \
               status = $3, \
               ledger_tx_id = COALESCE($4, ledger_tx_id), \
               fingerprint_hash = COALESCE($5, fingerprint_hash), \
               last_status_check_at = COALESCE($6, last_status_check_at), \
               last_error_category = CASE WHEN $9 THEN NULL ELSE COALESCE($7, last_error_category) END, \
               last_error_message  = CASE WHEN $9 THEN NULL ELSE COALESCE($8, last_error_message) END \
             WHERE id = $1 AND status = $2 \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id.0)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(patch.ledger_tx_id.as_ref().map(|t| t.as_str().to_string()))
        .bind(patch.fingerprint_hash.as_ref().map(|f| f.to_hex()))
        .bind(patch.last_status_check_at.as_ref().map(|t| *t.as_datetime()))
        .bind(patch.last_error.as_ref().map(|e| e.category.as_str().to_string()))
        .bind(patch.last_error.as_ref().map(|e| e.message.clone()))
        .bind(patch.clear_last_error)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(row.into_record()?);
        }

        // The CAS lost or the record is gone; load to tell which.
        let current = sqlx::query(
            "SELECT status FROM evidence_records WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match current {
            None => Err(StoreError::NotFound(id)),
            Some(row) => {
                let status: String = row.get("status");
                let actual = EvidenceStatus::parse(&status).ok_or_else(|| {
                    StoreError::Corrupt(format!("unknown status {status:?} on {id}"))
                })?;
                Err(StoreError::StaleState {
                    id,
                    expected: from,
                    actual,
                })
            }
        }
    }

    async fn load(&self, id: EvidenceId) -> Result<Option<EvidenceRecord>, StoreError> {
        let row = sqlx::query_as::<_, EvidenceRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM evidence_records WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(EvidenceRow::into_record).transpose()
    }

    async fn list(&self, query: &RecordQuery) -> Result<Page<EvidenceRecord>, StoreError> {
        // Filters bind in a fixed order; the sort column comes from the
        // closed SortField allowlist, never from caller input.
        let mut conditions = Vec::new();
        let mut arg_index = 0u32;
        if query.status.is_some() {
            arg_index += 1;
            conditions.push(format!("status = ${arg_index}"));
        }
        if query.organization_label.is_some() {
            arg_index += 1;
            conditions.push(format!("organization_label = ${arg_index}"));
        }
        if query.submitter_label.is_some() {
            arg_index += 1;
            conditions.push(format!("submitter_label = ${arg_index}"));
        }
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let order_clause = format!(
            "ORDER BY {} {}",
            query.sort.as_column(),
            query.order.as_sql()
        );
        let limit = query.effective_limit();
        let select_sql = format!(
            "SELECT {RECORD_COLUMNS} FROM evidence_records {where_clause} \
             {order_clause} LIMIT {limit} OFFSET {offset}",
            offset = query.offset
        );
        let count_sql =
            format!("SELECT COUNT(*) AS total FROM evidence_records {where_clause}");

        let mut select = sqlx::query_as::<_, EvidenceRow>(&select_sql);
        let mut count = sqlx::query(&count_sql);
        if let Some(status) = query.status {
            select = select.bind(status.as_str());
            count = count.bind(status.as_str());
        }
        if let Some(org) = &query.organization_label {
            select = select.bind(org.clone());
            count = count.bind(org.clone());
        }
        if let Some(sub) = &query.submitter_label {
            select = select.bind(sub.clone());
            count = count.bind(sub.clone());
        }

        let rows = select.fetch_all(&self.pool).await?;
        let total: i64 = count.fetch_one(&self.pool).await?.get("total");

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(row.into_record()?);
        }

        Ok(Page {
            items,
            total: total as u64,
            limit,
            offset: query.offset,
        })
    }

    async fn sweep(
        &self,
        statuses: &[EvidenceStatus],
        limit: u32,
    ) -> Result<Vec<EvidenceRecord>, StoreError> {
        let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let rows = sqlx::query_as::<_, EvidenceRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM evidence_records \
             WHERE status = ANY($1) \
             ORDER BY last_status_check_at ASC NULLS FIRST \
             LIMIT $2"
        ))
        .bind(names)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(row.into_record()?);
        }
        Ok(records)
    }

    async fn delete(&self, id: EvidenceId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM evidence_records WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct EvidenceRow {
    id: Uuid,
    content_hash: String,
    document_bytes: Vec<u8>,
    filename: String,
    submitter_label: String,
    organization_label: String,
    created_at: DateTime<Utc>,
    fingerprint_hash: Option<String>,
    ledger_tx_id: Option<String>,
    status: String,
    last_status_check_at: Option<DateTime<Utc>>,
    last_error_category: Option<String>,
    last_error_message: Option<String>,
}

impl EvidenceRow {
    fn into_record(self) -> Result<EvidenceRecord, StoreError> {
        let status = EvidenceStatus::parse(&self.status).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown status {:?} on {}", self.status, self.id))
        })?;
        let content_hash = ContentHash::from_hex(&self.content_hash)
            .map_err(|e| StoreError::Corrupt(format!("bad content_hash on {}: {e}", self.id)))?;
        let fingerprint_hash = self
            .fingerprint_hash
            .as_deref()
            .map(FingerprintHash::from_hex)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("bad fingerprint_hash on {}: {e}", self.id)))?;
        let last_error = match (self.last_error_category, self.last_error_message) {
            (Some(category), Some(message)) => {
                let category = ErrorCategory::parse(&category).ok_or_else(|| {
                    StoreError::Corrupt(format!(
                        "unknown error category {category:?} on {}",
                        self.id
                    ))
                })?;
                Some(RecordError { category, message })
            }
            _ => None,
        };

        Ok(EvidenceRecord {
            id: EvidenceId(self.id),
            content_hash,
            document_bytes: self.document_bytes,
            filename: self.filename,
            submitter_label: self.submitter_label,
            organization_label: self.organization_label,
            created_at: Timestamp::from_utc(self.created_at),
            fingerprint_hash,
            ledger_tx_id: self.ledger_tx_id.map(LedgerTxId::new),
            status,
            last_status_check_at: self.last_status_check_at.map(Timestamp::from_utc),
            last_error,
        })
    }
}
