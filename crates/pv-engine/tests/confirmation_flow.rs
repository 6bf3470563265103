//! End-to-end confirmation flows over the in-memory repository and the
//! scripted ledger double: registration through terminal status, failure
//! handling, operator retry, duplicate and validation behavior, and
//! independent re-verification.

use std::sync::Arc;
use std::time::Duration;

use pv_core::{ContentHash, ErrorCategory, EvidenceId, FingerprintHash, Timestamp};
use pv_crypto::KeyStore;
use pv_engine::{
    ConfirmationEngine, EngineConfig, RegistrationConfig, RegistrationService,
    RegistrationError, ValidationError,
};
use pv_ledger::{
    CircuitOpen, LedgerClient, LedgerClientError, LedgerStatus, ScriptedLedgerClient,
    SubmissionFailure, SubmitError,
};
use pv_store::{
    EvidenceRecord, EvidenceRepository, EvidenceStatus, InMemoryRepository, NewEvidence,
    RecordPatch,
};

struct Harness {
    repo: Arc<InMemoryRepository>,
    ledger: Arc<ScriptedLedgerClient>,
    engine: Arc<ConfirmationEngine>,
    service: RegistrationService,
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        worker_pool_size: 4,
        poll_initial: Duration::from_millis(10),
        poll_ceiling: Duration::from_millis(40),
        total_deadline: Duration::from_secs(5),
        sweep_interval: Duration::from_millis(50),
        sweep_batch: 16,
        shutdown_grace: Duration::from_secs(1),
    }
}

fn harness_with(engine_config: EngineConfig, registration_config: RegistrationConfig) -> Harness {
    let repo = Arc::new(InMemoryRepository::new());
    let ledger = Arc::new(ScriptedLedgerClient::new());
    let keystore = Arc::new(KeyStore::from_scalar(&[0x01u8; 32]).expect("test scalar"));

    let repo_dyn: Arc<dyn EvidenceRepository> = repo.clone();
    let ledger_dyn: Arc<dyn LedgerClient> = ledger.clone();

    let engine = Arc::new(ConfirmationEngine::start(
        repo_dyn.clone(),
        ledger_dyn.clone(),
        keystore.clone(),
        engine_config,
    ));
    let service = RegistrationService::new(
        repo_dyn,
        engine.clone(),
        ledger_dyn,
        keystore,
        registration_config,
    );

    Harness {
        repo,
        ledger,
        engine,
        service,
    }
}

fn harness() -> Harness {
    harness_with(fast_config(), RegistrationConfig::default())
}

/// 1,024 bytes starting with the PDF magic prefix.
fn pdf_bytes(tag: &str) -> Vec<u8> {
    let mut bytes = format!("%PDF-1.4\n% {tag}\n").into_bytes();
    bytes.resize(1024, b' ');
    bytes
}

fn evidence(tag: &str) -> NewEvidence {
    NewEvidence {
        document_bytes: pdf_bytes(tag),
        filename: "t.pdf".into(),
        submitter_label: "alice".into(),
        organization_label: "Acme".into(),
    }
}

async fn wait_for_status(
    repo: &Arc<InMemoryRepository>,
    id: EvidenceId,
    status: EvidenceStatus,
) -> EvidenceRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let record = repo.load(id).await.expect("load").expect("record exists");
        if record.status == status {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {status}; record is {record:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn happy_path_reaches_finalized_commitment() {
    let h = harness();
    h.ledger.push_status(Ok(LedgerStatus::PendingCommitment));

    let bytes = pdf_bytes("happy");
    let outcome = h
        .service
        .register(NewEvidence {
            document_bytes: bytes.clone(),
            filename: "t.pdf".into(),
            submitter_label: "alice".into(),
            organization_label: "Acme".into(),
        })
        .await
        .unwrap();

    assert!(outcome.is_created());
    let view = outcome.view();
    assert_eq!(view.content_hash, ContentHash::compute(&bytes));
    assert_eq!(view.status, EvidenceStatus::New);

    let record = wait_for_status(&h.repo, view.id, EvidenceStatus::FinalizedCommitment).await;
    assert_eq!(
        record.ledger_tx_id.as_ref().unwrap().as_str(),
        "tx-scripted-1"
    );
    assert!(record.fingerprint_hash.is_some());
    assert!(record.last_status_check_at.is_some());
    assert!(record.last_error.is_none());
    assert_eq!(h.ledger.submit_calls(), 1);
    // Both polls (pending, then finalized) asked about the same tx.
    assert!(h.ledger.polled().iter().all(|tx| tx.as_str() == "tx-scripted-1"));
    assert!(h.ledger.status_calls() >= 2);

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_registration_returns_existing_record() {
    let h = harness();
    let first = h.service.register(evidence("dup")).await.unwrap();
    let first_id = first.view().id;

    let second = h
        .service
        .register(NewEvidence {
            document_bytes: pdf_bytes("dup"),
            filename: "renamed.pdf".into(),
            submitter_label: "bob".into(),
            organization_label: "Globex".into(),
        })
        .await
        .unwrap();

    assert!(!second.is_created());
    assert_eq!(second.view().id, first_id);
    // Labels on the existing record are unchanged.
    assert_eq!(second.view().filename, "t.pdf");
    assert_eq!(second.view().submitter_label, "alice");
    assert_eq!(h.repo.len(), 1);

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn non_pdf_bytes_are_rejected_without_side_effects() {
    let h = harness();
    let err = h
        .service
        .register(NewEvidence {
            document_bytes: b"PK\x03\x04zipfile".to_vec(),
            filename: "t.zip".into(),
            submitter_label: "alice".into(),
            organization_label: "Acme".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::Validation(ValidationError::NotPdf)
    ));
    assert!(h.repo.is_empty());

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn oversize_and_missing_labels_are_rejected() {
    let h = harness_with(fast_config(), RegistrationConfig { max_bytes: 512 });

    let err = h.service.register(evidence("big")).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::Validation(ValidationError::TooLarge { size: 1024, max: 512 })
    ));

    let mut input = evidence("nolabel");
    input.document_bytes.truncate(512);
    input.submitter_label = String::new();
    let err = h.service.register(input).await.unwrap_err();
    assert!(matches!(
        err,
        RegistrationError::Validation(ValidationError::MissingLabel {
            field: "submitter_label"
        })
    ));

    assert!(h.repo.is_empty());
    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn retryable_submit_failure_is_retried_until_acknowledged() {
    let h = harness();
    h.ledger.push_submit(Err(SubmitError::RetriesExhausted(SubmissionFailure {
        attempts: vec![
            LedgerClientError::Server { status: 503, body: "overloaded".into() },
            LedgerClientError::Server { status: 503, body: "overloaded".into() },
            LedgerClientError::Timeout { elapsed_ms: 30_000 },
        ],
    })));

    let outcome = h.service.register(evidence("retry")).await.unwrap();
    let id = outcome.view().id;

    let record = wait_for_status(&h.repo, id, EvidenceStatus::FinalizedCommitment).await;
    // First submit exhausted, second acknowledged.
    assert_eq!(h.ledger.submit_calls(), 2);
    assert_eq!(
        record.ledger_tx_id.as_ref().unwrap().as_str(),
        "tx-scripted-2"
    );
    // The recorded failure was cleared by the successful acknowledgement.
    assert!(record.last_error.is_none());

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn client_error_goes_errored_and_operator_retry_resubmits() {
    let h = harness();
    h.ledger.push_submit(Err(SubmitError::Rejected(LedgerClientError::Client {
        status: 422,
        body: "bad signature".into(),
    })));

    let id = h.service.register(evidence("rejected")).await.unwrap().view().id;

    let record = wait_for_status(&h.repo, id, EvidenceStatus::ErroredCommitment).await;
    let error = record.last_error.as_ref().unwrap();
    assert_eq!(error.category, ErrorCategory::Client);
    assert!(record.ledger_tx_id.is_none());
    assert_eq!(h.ledger.submit_calls(), 1);

    // Operator retry: no tx id was ever issued, so the engine re-submits.
    let view = h.service.retry(id).await.unwrap();
    assert_eq!(view.status, EvidenceStatus::Submitted);
    assert!(view.last_error.is_none());

    let record = wait_for_status(&h.repo, id, EvidenceStatus::FinalizedCommitment).await;
    assert_eq!(h.ledger.submit_calls(), 2);
    assert!(record.ledger_tx_id.is_some());

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn circuit_open_leaves_record_new_until_the_breaker_relents() {
    let h = harness();
    for _ in 0..5 {
        h.ledger.push_submit(Err(SubmitError::CircuitOpen(CircuitOpen {
            endpoint: "submit",
        })));
    }

    let id = h.service.register(evidence("breaker")).await.unwrap().view().id;

    // While the breaker is open the record stays NEW with the short
    // circuit recorded.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let record = h.repo.load(id).await.unwrap().unwrap();
    assert_eq!(record.status, EvidenceStatus::New);
    let error = record.last_error.as_ref().unwrap();
    assert_eq!(error.category, ErrorCategory::CircuitOpen);

    // Once the script drains, the default acknowledgement lands.
    let record = wait_for_status(&h.repo, id, EvidenceStatus::FinalizedCommitment).await;
    assert!(record.ledger_tx_id.is_some());
    assert!(h.ledger.submit_calls() >= 6);

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn ledger_errored_commitment_is_terminal_and_retry_reuses_tx_id() {
    let h = harness();
    h.ledger.set_default_status(LedgerStatus::ErroredCommitment);

    let id = h.service.register(evidence("errored")).await.unwrap().view().id;

    let record = wait_for_status(&h.repo, id, EvidenceStatus::ErroredCommitment).await;
    let tx_id = record.ledger_tx_id.clone().unwrap();
    assert!(record
        .last_error
        .as_ref()
        .unwrap()
        .message
        .contains("ERRORED_COMMITMENT"));
    assert_eq!(h.ledger.submit_calls(), 1);

    // Operator retry with a known tx id polls; it must not re-submit.
    h.ledger.set_default_status(LedgerStatus::FinalizedCommitment);
    let view = h.service.retry(id).await.unwrap();
    assert_eq!(view.ledger_tx_id.as_ref().unwrap(), &tx_id);

    let record = wait_for_status(&h.repo, id, EvidenceStatus::FinalizedCommitment).await;
    assert_eq!(record.ledger_tx_id.unwrap(), tx_id);
    assert_eq!(h.ledger.submit_calls(), 1);

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn total_deadline_parks_the_record_as_errored() {
    let mut config = fast_config();
    config.total_deadline = Duration::from_millis(150);
    let h = harness_with(config, RegistrationConfig::default());
    h.ledger.set_default_status(LedgerStatus::PendingCommitment);

    let id = h.service.register(evidence("deadline")).await.unwrap().view().id;

    let record = wait_for_status(&h.repo, id, EvidenceStatus::ErroredCommitment).await;
    assert_eq!(
        record.last_error.as_ref().unwrap().category,
        ErrorCategory::DeadlineExceeded
    );

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_enqueues_submit_exactly_once() {
    let h = harness();
    h.ledger.push_status(Ok(LedgerStatus::PendingCommitment));

    let id = h.service.register(evidence("once")).await.unwrap().view().id;
    for _ in 0..5 {
        h.engine.enqueue(id);
    }

    let record = wait_for_status(&h.repo, id, EvidenceStatus::FinalizedCommitment).await;
    assert_eq!(h.ledger.submit_calls(), 1);
    assert_eq!(
        record.ledger_tx_id.as_ref().unwrap().as_str(),
        "tx-scripted-1"
    );

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_registrations_yield_one_created() {
    let h = harness();
    let service = Arc::new(h.service);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        handles.push(tokio::spawn(async move {
            service.register(evidence("race")).await.unwrap()
        }));
    }

    let mut created = 0;
    let mut ids = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap();
        if outcome.is_created() {
            created += 1;
        }
        ids.push(outcome.view().id);
    }
    assert_eq!(created, 1);
    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    let id = ids[0];
    wait_for_status(&h.repo, id, EvidenceStatus::FinalizedCommitment).await;
    assert_eq!(h.ledger.submit_calls(), 1);

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn sweeper_picks_up_orphaned_records() {
    let h = harness();

    // Insert behind the service's back: no enqueue happens.
    let record = h
        .repo
        .insert_new(evidence("orphan"))
        .await
        .unwrap()
        .record()
        .clone();

    let record = wait_for_status(&h.repo, record.id, EvidenceStatus::FinalizedCommitment).await;
    assert!(record.ledger_tx_id.is_some());

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn verify_confirms_an_untampered_record() {
    let h = harness();
    let id = h.service.register(evidence("verify")).await.unwrap().view().id;
    wait_for_status(&h.repo, id, EvidenceStatus::FinalizedCommitment).await;

    let report = h.service.verify(id).await.unwrap();
    assert!(report.verified);
    assert!(report.content_hash_matches);
    assert!(report.fingerprint.matches);
    assert!(report.signature_valid);
    assert_eq!(report.ledger_status, Some(LedgerStatus::FinalizedCommitment));
    assert!(report.mismatches.is_empty());

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn verify_flags_a_tampered_fingerprint() {
    let h = harness();

    // Build the record by hand so the engine never races the tamper: a
    // submitted row whose stored fingerprint disagrees with its fields.
    let record = h
        .repo
        .insert_new(NewEvidence {
            document_bytes: pdf_bytes("tamper"),
            filename: "original.pdf".into(),
            submitter_label: "alice".into(),
            organization_label: "Acme".into(),
        })
        .await
        .unwrap()
        .record()
        .clone();

    let bogus = FingerprintHash::from_hex(&"ab".repeat(32)).unwrap();
    h.repo
        .transition(
            record.id,
            EvidenceStatus::New,
            EvidenceStatus::Submitted,
            RecordPatch::none()
                .with_tx_id(pv_core::LedgerTxId::new("tx-tampered"))
                .with_fingerprint(bogus),
        )
        .await
        .unwrap();

    let report = h.service.verify(record.id).await.unwrap();
    assert!(!report.verified);
    assert!(report.content_hash_matches);
    assert!(!report.fingerprint.matches);
    assert_eq!(report.fingerprint.stored, Some(bogus));
    assert_ne!(report.fingerprint.recomputed, bogus);
    assert_eq!(report.mismatches, vec!["fingerprint_hash".to_string()]);

    // The record itself was not mutated by verification.
    let after = h.repo.load(record.id).await.unwrap().unwrap();
    assert_eq!(after.fingerprint_hash, Some(bogus));
    assert_eq!(after.status, EvidenceStatus::Submitted);

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn verify_before_submission_reports_missing_fingerprint() {
    let h = harness();
    // Keep the engine from ever acknowledging.
    for _ in 0..100 {
        h.ledger.push_submit(Err(SubmitError::CircuitOpen(CircuitOpen {
            endpoint: "submit",
        })));
    }

    let id = h.service.register(evidence("early")).await.unwrap().view().id;
    let report = h.service.verify(id).await.unwrap();

    assert!(!report.verified);
    assert!(report.fingerprint.stored.is_none());
    assert!(report.ledger_status.is_none());
    assert!(report.mismatches.contains(&"fingerprint_hash".to_string()));

    h.engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_stops_workers_within_grace() {
    let h = harness();
    h.ledger.set_default_status(LedgerStatus::PendingCommitment);
    let id = h.service.register(evidence("shutdown")).await.unwrap().view().id;

    // Give the driver a moment to get in flight, then stop everything.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let before = Timestamp::now();
    h.engine.shutdown().await;
    assert!(before.elapsed() < Duration::from_secs(2));

    // Intake after shutdown is a no-op, not a panic.
    h.engine.enqueue(id);
    assert_eq!(h.engine.in_flight_count(), 0);
}
