//! # Scripted Ledger Client
//!
//! A deterministic in-process implementation of [`LedgerClient`] for
//! engine tests and development. Outcomes are scripted per call; when a
//! script runs dry the client falls back to a configurable default, so a
//! test can express "fail twice, then acknowledge, then report FINALIZED
//! forever" in a few lines.
//!
//! Every call is recorded: received attestations, polled transaction
//! ids, and call counters are all observable from assertions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use pv_attest::Attestation;
use pv_core::LedgerTxId;

use crate::client::LedgerClient;
use crate::error::{StatusError, SubmitError};
use crate::types::{LedgerAck, LedgerStatus};

/// Scriptable, fully deterministic ledger double.
pub struct ScriptedLedgerClient {
    submit_script: Mutex<VecDeque<Result<LedgerAck, SubmitError>>>,
    status_script: Mutex<VecDeque<Result<LedgerStatus, StatusError>>>,
    default_status: Mutex<LedgerStatus>,
    submit_calls: AtomicU32,
    status_calls: AtomicU32,
    submitted: Mutex<Vec<Attestation>>,
    polled: Mutex<Vec<LedgerTxId>>,
}

impl Default for ScriptedLedgerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedLedgerClient {
    /// A client whose unscripted submits acknowledge with sequential tx
    /// ids and whose unscripted polls report FINALIZED_COMMITMENT.
    pub fn new() -> Self {
        Self {
            submit_script: Mutex::new(VecDeque::new()),
            status_script: Mutex::new(VecDeque::new()),
            default_status: Mutex::new(LedgerStatus::FinalizedCommitment),
            submit_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            submitted: Mutex::new(Vec::new()),
            polled: Mutex::new(Vec::new()),
        }
    }

    /// Queue one submit outcome.
    pub fn push_submit(&self, outcome: Result<LedgerAck, SubmitError>) {
        self.submit_script.lock().push_back(outcome);
    }

    /// Queue a submit acknowledgement with the given tx id.
    pub fn push_ack(&self, tx_id: &str) {
        self.push_submit(Ok(LedgerAck {
            tx_id: LedgerTxId::new(tx_id),
            synthetic: false,
        }));
    }

    /// Queue one status outcome.
    pub fn push_status(&self, outcome: Result<LedgerStatus, StatusError>) {
        self.status_script.lock().push_back(outcome);
    }

    /// The status reported once the status script runs dry.
    pub fn set_default_status(&self, status: LedgerStatus) {
        *self.default_status.lock() = status;
    }

    /// Number of submit calls observed.
    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of status calls observed.
    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Every attestation received by `submit`, in order.
    pub fn submitted(&self) -> Vec<Attestation> {
        self.submitted.lock().clone()
    }

    /// Every tx id received by `get_status`, in order.
    pub fn polled(&self) -> Vec<LedgerTxId> {
        self.polled.lock().clone()
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedgerClient {
    async fn submit(&self, attestation: &Attestation) -> Result<LedgerAck, SubmitError> {
        let call = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.submitted.lock().push(attestation.clone());
        if let Some(outcome) = self.submit_script.lock().pop_front() {
            return outcome;
        }
        Ok(LedgerAck {
            tx_id: LedgerTxId::new(format!("tx-scripted-{call}")),
            synthetic: false,
        })
    }

    async fn get_status(&self, tx_id: &LedgerTxId) -> Result<LedgerStatus, StatusError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.polled.lock().push(tx_id.clone());
        if let Some(outcome) = self.status_script.lock().pop_front() {
            return outcome;
        }
        Ok(*self.default_status.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CircuitOpen, LedgerClientError, SubmissionFailure};
    use pv_crypto::KeyStore;

    fn attestation() -> Attestation {
        let keystore = KeyStore::from_scalar(&[0x03u8; 32]).unwrap();
        let id = pv_core::EvidenceId::new();
        let hash = pv_core::ContentHash::compute(b"%PDF-mock");
        let ts = pv_core::Timestamp::now();
        pv_attest::FingerprintBuilder
            .build(
                pv_attest::AttestationInputs {
                    id: &id,
                    content_hash: &hash,
                    filename: "m.pdf",
                    submitter_label: "alice",
                    organization_label: "Acme",
                    created_at: &ts,
                },
                &keystore,
            )
            .unwrap()
    }

    #[tokio::test]
    async fn scripted_outcomes_pop_in_order() {
        let client = ScriptedLedgerClient::new();
        client.push_submit(Err(SubmitError::RetriesExhausted(SubmissionFailure {
            attempts: vec![LedgerClientError::Server {
                status: 503,
                body: String::new(),
            }],
        })));
        client.push_ack("tx-second");

        let att = attestation();
        assert!(client.submit(&att).await.is_err());
        let ack = client.submit(&att).await.unwrap();
        assert_eq!(ack.tx_id.as_str(), "tx-second");
        assert_eq!(client.submit_calls(), 2);
        assert_eq!(client.submitted().len(), 2);
    }

    #[tokio::test]
    async fn unscripted_submit_acks_sequentially() {
        let client = ScriptedLedgerClient::new();
        let att = attestation();
        let a = client.submit(&att).await.unwrap();
        let b = client.submit(&att).await.unwrap();
        assert_eq!(a.tx_id.as_str(), "tx-scripted-1");
        assert_eq!(b.tx_id.as_str(), "tx-scripted-2");
    }

    #[tokio::test]
    async fn status_script_then_default() {
        let client = ScriptedLedgerClient::new();
        client.push_status(Ok(LedgerStatus::PendingCommitment));
        client.push_status(Err(StatusError::CircuitOpen(CircuitOpen {
            endpoint: "status",
        })));

        let tx = LedgerTxId::new("tx-1");
        assert_eq!(
            client.get_status(&tx).await.unwrap(),
            LedgerStatus::PendingCommitment
        );
        assert!(client.get_status(&tx).await.is_err());
        // Script dry: default applies.
        assert_eq!(
            client.get_status(&tx).await.unwrap(),
            LedgerStatus::FinalizedCommitment
        );
        assert_eq!(client.status_calls(), 3);
        assert_eq!(client.polled().len(), 3);
    }

    #[tokio::test]
    async fn default_status_is_configurable() {
        let client = ScriptedLedgerClient::new();
        client.set_default_status(LedgerStatus::PendingCommitment);
        let status = client.get_status(&LedgerTxId::new("tx")).await.unwrap();
        assert_eq!(status, LedgerStatus::PendingCommitment);
    }
}
