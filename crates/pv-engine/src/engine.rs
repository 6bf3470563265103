//! # Confirmation Engine
//!
//! Drives every evidence record through the confirmation state machine:
//! build and submit the attestation, poll the ledger on an exponential
//! schedule, and settle on a terminal status — all against a per-record
//! deadline.
//!
//! ## Concurrency
//!
//! A bounded worker pool drains an unbounded queue of record ids. The
//! `in_flight` map guarantees at most one worker drives a given record at
//! a time; duplicate enqueues are dropped at pickup. Every repository
//! mutation is a CAS, so even if two drivers did race, exactly one swap
//! wins and the loser logs and moves on — a stale swap is proof that the
//! work already happened.
//!
//! ## Recovery
//!
//! A periodic sweeper re-enqueues non-terminal records ordered by how
//! long ago they were last polled. A record orphaned by a crash or a
//! full queue is picked up on the next sweep; nothing depends on the
//! original `register` call's enqueue surviving.
//!
//! ## Shutdown
//!
//! Graceful: a watch signal stops intake and wakes sleeping drivers,
//! in-flight work drains within the configured grace period, stragglers
//! are aborted.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use pv_attest::{AttestationInputs, FingerprintBuilder};
use pv_core::{ErrorCategory, EvidenceId, Timestamp};
use pv_crypto::KeyStore;
use pv_ledger::{LedgerClient, LedgerStatus, SubmitError};
use pv_store::{
    EvidenceRecord, EvidenceRepository, EvidenceStatus, RecordError, RecordPatch, StoreError,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::schedule::PollSchedule;

struct Inner {
    repo: Arc<dyn EvidenceRepository>,
    ledger: Arc<dyn LedgerClient>,
    keystore: Arc<KeyStore>,
    builder: FingerprintBuilder,
    config: EngineConfig,
    schedule: PollSchedule,
    queue_tx: mpsc::UnboundedSender<EvidenceId>,
    in_flight: DashMap<EvidenceId, ()>,
    shutdown_rx: watch::Receiver<bool>,
}

/// The asynchronous confirmation orchestrator.
///
/// Created with [`ConfirmationEngine::start`], which spawns the worker
/// pool and the recovery sweeper immediately.
pub struct ConfirmationEngine {
    inner: Arc<Inner>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConfirmationEngine {
    /// Spawn the worker pool and sweeper and return the running engine.
    pub fn start(
        repo: Arc<dyn EvidenceRepository>,
        ledger: Arc<dyn LedgerClient>,
        keystore: Arc<KeyStore>,
        config: EngineConfig,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(Inner {
            repo,
            ledger,
            keystore,
            builder: FingerprintBuilder,
            schedule: PollSchedule::new(config.poll_initial, config.poll_ceiling),
            config,
            queue_tx,
            in_flight: DashMap::new(),
            shutdown_rx,
        });

        let queue_rx = Arc::new(AsyncMutex::new(queue_rx));
        let mut tasks = Vec::with_capacity(config.worker_pool_size + 1);
        for worker in 0..config.worker_pool_size.max(1) {
            tasks.push(tokio::spawn(worker_loop(
                inner.clone(),
                queue_rx.clone(),
                worker,
            )));
        }
        tasks.push(tokio::spawn(sweeper_loop(inner.clone())));

        tracing::info!(
            workers = config.worker_pool_size.max(1),
            "confirmation engine started"
        );

        Self {
            inner,
            shutdown_tx,
            tasks: Mutex::new(tasks),
        }
    }

    /// Queue a record for confirmation. Fire-and-forget: progress is
    /// observable through the record's status.
    pub fn enqueue(&self, id: EvidenceId) {
        if self.inner.queue_tx.send(id).is_err() {
            tracing::warn!(%id, "confirmation queue closed; record awaits the next sweep");
        }
    }

    /// Operator retry: move an errored record back to SUBMITTED, keeping
    /// `ledger_tx_id` and `fingerprint_hash` when known, and re-enqueue.
    /// The driver only re-submits when the transaction id is null.
    pub async fn retry(&self, id: EvidenceId) -> Result<EvidenceRecord, StoreError> {
        let record = self
            .inner
            .repo
            .transition(
                id,
                EvidenceStatus::ErroredCommitment,
                EvidenceStatus::Submitted,
                RecordPatch::none().clearing_error(),
            )
            .await?;
        tracing::info!(%id, tx_id = ?record.ledger_tx_id, "operator retry accepted");
        self.enqueue(id);
        Ok(record)
    }

    /// Number of records currently being driven.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Graceful shutdown: stop intake, drain in-flight drivers up to the
    /// configured grace period, abort stragglers.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let deadline = tokio::time::Instant::now() + self.inner.config.shutdown_grace;
        for mut task in tasks {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if tokio::time::timeout(remaining, &mut task).await.is_err() {
                task.abort();
            }
        }
        tracing::info!("confirmation engine stopped");
    }
}

async fn worker_loop(
    inner: Arc<Inner>,
    queue: Arc<AsyncMutex<mpsc::UnboundedReceiver<EvidenceId>>>,
    worker: usize,
) {
    let mut shutdown = inner.shutdown_rx.clone();
    loop {
        let next = tokio::select! {
            _ = shutdown.changed() => None,
            id = async { queue.lock().await.recv().await } => id,
        };
        match next {
            Some(id) => drive(&inner, id).await,
            None => {
                tracing::debug!(worker, "worker stopping");
                return;
            }
        }
    }
}

async fn sweeper_loop(inner: Arc<Inner>) {
    let mut shutdown = inner.shutdown_rx.clone();
    let active = [
        EvidenceStatus::New,
        EvidenceStatus::Submitted,
        EvidenceStatus::PendingCommitment,
    ];
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = tokio::time::sleep(inner.config.sweep_interval) => {}
        }
        match inner.repo.sweep(&active, inner.config.sweep_batch).await {
            Ok(records) => {
                for record in records {
                    if !inner.in_flight.contains_key(&record.id) {
                        let _ = inner.queue_tx.send(record.id);
                    }
                }
            }
            Err(e) => tracing::warn!("recovery sweep failed: {e}"),
        }
    }
}

/// Claim the record and drive it to rest. The `in_flight` entry is the
/// per-record mutual exclusion: a second worker picking up the same id
/// drops it here.
async fn drive(inner: &Arc<Inner>, id: EvidenceId) {
    if inner.in_flight.insert(id, ()).is_some() {
        tracing::debug!(%id, "record already in flight; dropping duplicate enqueue");
        return;
    }
    if let Err(e) = drive_record(inner, id).await {
        tracing::error!(%id, "confirmation driver failed: {e}");
    }
    inner.in_flight.remove(&id);
}

async fn drive_record(inner: &Arc<Inner>, id: EvidenceId) -> Result<(), EngineError> {
    let mut poll_attempt: u32 = 0;
    let mut submit_attempt: u32 = 0;

    loop {
        if *inner.shutdown_rx.borrow() {
            return Ok(());
        }

        let Some(record) = inner.repo.load(id).await? else {
            // Hard-deleted underneath us.
            return Ok(());
        };

        if record.status.is_terminal() {
            return Ok(());
        }

        let elapsed = record.created_at.elapsed();
        if elapsed >= inner.config.total_deadline {
            let error = RecordError::new(
                ErrorCategory::DeadlineExceeded,
                format!("no terminal ledger state after {}s", elapsed.as_secs()),
            );
            cas(
                inner,
                id,
                record.status,
                EvidenceStatus::ErroredCommitment,
                RecordPatch::none().with_error(error),
            )
            .await?;
            tracing::warn!(%id, "confirmation deadline exceeded");
            return Ok(());
        }

        let needs_submission = record.status == EvidenceStatus::New
            || (record.status == EvidenceStatus::Submitted && record.ledger_tx_id.is_none());

        let delay = if needs_submission {
            submit_attempt += 1;
            match submit_record(inner, &record).await? {
                SubmitStep::Acked => {
                    poll_attempt = 0;
                    inner.schedule.delay(1)
                }
                SubmitStep::Terminal => return Ok(()),
                SubmitStep::RetryLater => inner.schedule.delay(submit_attempt),
            }
        } else {
            poll_attempt += 1;
            match poll_record(inner, &record).await? {
                PollStep::Terminal => return Ok(()),
                PollStep::Continue => inner.schedule.delay(poll_attempt),
            }
        };

        // Never sleep past the record's deadline.
        let remaining = inner
            .config
            .total_deadline
            .saturating_sub(record.created_at.elapsed());
        let delay = delay.min(remaining.max(Duration::from_millis(1)));
        let mut shutdown = inner.shutdown_rx.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => return Ok(()),
        }
    }
}

enum SubmitStep {
    /// Acknowledged; move on to polling.
    Acked,
    /// The record reached a terminal status.
    Terminal,
    /// Transient trouble; try again on the next pass.
    RetryLater,
}

async fn submit_record(
    inner: &Arc<Inner>,
    record: &EvidenceRecord,
) -> Result<SubmitStep, EngineError> {
    let inputs = AttestationInputs {
        id: &record.id,
        content_hash: &record.content_hash,
        filename: &record.filename,
        submitter_label: &record.submitter_label,
        organization_label: &record.organization_label,
        created_at: &record.created_at,
    };
    let attestation = match inner.builder.build(inputs, &inner.keystore) {
        Ok(attestation) => attestation,
        Err(e) => {
            // Assembly failure is not transient; park the record where an
            // operator can see it.
            let error = RecordError::new(ErrorCategory::Unknown, e.to_string());
            cas(
                inner,
                record.id,
                record.status,
                EvidenceStatus::ErroredCommitment,
                RecordPatch::none().with_error(error),
            )
            .await?;
            tracing::error!(id = %record.id, "attestation assembly failed: {e}");
            return Ok(SubmitStep::Terminal);
        }
    };

    let from = record.status;
    match inner.ledger.submit(&attestation).await {
        Ok(ack) => {
            tracing::info!(
                id = %record.id,
                tx_id = %ack.tx_id,
                synthetic = ack.synthetic,
                "submission acknowledged"
            );
            let patch = RecordPatch::none()
                .with_tx_id(ack.tx_id)
                .with_fingerprint(*attestation.fingerprint())
                .clearing_error();
            cas(inner, record.id, from, EvidenceStatus::Submitted, patch).await?;
            Ok(SubmitStep::Acked)
        }
        Err(SubmitError::Rejected(err)) => {
            tracing::warn!(id = %record.id, "ledger rejected attestation: {err}");
            let error = RecordError::new(err.category(), err.to_string());
            cas(
                inner,
                record.id,
                from,
                EvidenceStatus::ErroredCommitment,
                RecordPatch::none().with_error(error),
            )
            .await?;
            Ok(SubmitStep::Terminal)
        }
        Err(SubmitError::CircuitOpen(err)) => {
            tracing::debug!(id = %record.id, "submission short-circuited: {err}");
            let error = RecordError::new(ErrorCategory::CircuitOpen, err.to_string());
            cas(inner, record.id, from, from, RecordPatch::none().with_error(error)).await?;
            Ok(SubmitStep::RetryLater)
        }
        Err(SubmitError::RetriesExhausted(failure)) => {
            tracing::warn!(
                id = %record.id,
                attempts = failure.attempts.len(),
                "submission attempts exhausted: {failure}"
            );
            let error = RecordError::new(failure.final_category(), failure.to_string());
            cas(inner, record.id, from, from, RecordPatch::none().with_error(error)).await?;
            Ok(SubmitStep::RetryLater)
        }
    }
}

enum PollStep {
    /// The record reached a terminal status.
    Terminal,
    /// Poll again after the next delay.
    Continue,
}

async fn poll_record(
    inner: &Arc<Inner>,
    record: &EvidenceRecord,
) -> Result<PollStep, EngineError> {
    let Some(tx_id) = record.ledger_tx_id.clone() else {
        // The submission path owns tx-less records; reaching here means
        // the row is inconsistent.
        let error = RecordError::new(
            ErrorCategory::Unknown,
            "record has no ledger tx id to poll",
        );
        cas(
            inner,
            record.id,
            record.status,
            EvidenceStatus::ErroredCommitment,
            RecordPatch::none().with_error(error),
        )
        .await?;
        return Ok(PollStep::Terminal);
    };

    let now = Timestamp::now();
    let from = record.status;
    match inner.ledger.get_status(&tx_id).await {
        Ok(LedgerStatus::PendingCommitment) => {
            cas(
                inner,
                record.id,
                from,
                EvidenceStatus::PendingCommitment,
                RecordPatch::none().with_status_check(now),
            )
            .await?;
            Ok(PollStep::Continue)
        }
        Ok(LedgerStatus::FinalizedCommitment) => {
            cas(
                inner,
                record.id,
                from,
                EvidenceStatus::FinalizedCommitment,
                RecordPatch::none().with_status_check(now).clearing_error(),
            )
            .await?;
            tracing::info!(id = %record.id, tx_id = %tx_id, "commitment finalized");
            Ok(PollStep::Terminal)
        }
        Ok(LedgerStatus::ErroredCommitment) => {
            let error = RecordError::new(
                ErrorCategory::Unknown,
                "ledger reported ERRORED_COMMITMENT",
            );
            cas(
                inner,
                record.id,
                from,
                EvidenceStatus::ErroredCommitment,
                RecordPatch::none().with_status_check(now).with_error(error),
            )
            .await?;
            tracing::warn!(id = %record.id, tx_id = %tx_id, "ledger errored the commitment");
            Ok(PollStep::Terminal)
        }
        Ok(LedgerStatus::NotFound) => {
            // Not yet indexed; keep polling.
            cas(
                inner,
                record.id,
                from,
                from,
                RecordPatch::none().with_status_check(now),
            )
            .await?;
            Ok(PollStep::Continue)
        }
        Err(err) => {
            tracing::debug!(id = %record.id, "status poll failed: {err}");
            let error = RecordError::new(err.category(), err.to_string());
            cas(
                inner,
                record.id,
                from,
                from,
                RecordPatch::none().with_status_check(now).with_error(error),
            )
            .await?;
            Ok(PollStep::Continue)
        }
    }
}

/// CAS wrapper: a stale swap means another worker already advanced the
/// record, which is success for idempotency purposes.
async fn cas(
    inner: &Arc<Inner>,
    id: EvidenceId,
    from: EvidenceStatus,
    to: EvidenceStatus,
    patch: RecordPatch,
) -> Result<bool, EngineError> {
    match inner.repo.transition(id, from, to, patch).await {
        Ok(_) => Ok(true),
        Err(StoreError::StaleState { actual, .. }) => {
            tracing::debug!(
                %id,
                expected = %from,
                %actual,
                "stale transition; another worker advanced the record"
            );
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}
