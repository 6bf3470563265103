//! # Independent Re-Verification
//!
//! Re-derives everything a verifier can re-derive from a stored record —
//! the content hash from the raw bytes, the fingerprint from the record
//! fields, the signature under the process signer — and consults the
//! ledger for its opinion of the recorded transaction.
//!
//! Any discrepancy makes the result definitively NOT-VERIFIED, with the
//! disagreeing fields named. Verification never mutates the record.

use std::sync::Arc;

use serde::Serialize;

use pv_attest::{AttestationInputs, FingerprintBuilder};
use pv_core::{CanonicalBytes, ContentHash, EvidenceId, FingerprintHash};
use pv_crypto::{verify_signature, DerSignature, KeyStore, SigningDigest};
use pv_ledger::{LedgerClient, LedgerStatus};
use pv_store::EvidenceRepository;

use crate::error::VerifyError;

/// Stored-versus-recomputed fingerprint comparison.
#[derive(Debug, Clone, Serialize)]
pub struct FingerprintCheck {
    /// The fingerprint on the record, if one was ever written.
    pub stored: Option<FingerprintHash>,
    /// The fingerprint recomputed from the record fields.
    pub recomputed: FingerprintHash,
    /// Whether the stored value exists and matches.
    pub matches: bool,
}

/// The full verification result for one record.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// The record that was verified.
    pub record_id: EvidenceId,
    /// The overall local verdict. False on any mismatch.
    pub verified: bool,
    /// Whether the stored content hash matches the stored bytes.
    pub content_hash_matches: bool,
    /// Fingerprint comparison detail.
    pub fingerprint: FingerprintCheck,
    /// Whether a freshly-produced signature verifies against the signer
    /// public key and the recomputed digest.
    pub signature_valid: bool,
    /// The ledger's opinion of the recorded transaction, when one exists
    /// and the query succeeded.
    pub ledger_status: Option<LedgerStatus>,
    /// Why the ledger's opinion is missing, when it is.
    pub ledger_error: Option<String>,
    /// Names of every field that disagreed.
    pub mismatches: Vec<String>,
}

/// Re-verify a stored record.
pub async fn verify_record(
    repo: &Arc<dyn EvidenceRepository>,
    ledger: &Arc<dyn LedgerClient>,
    keystore: &Arc<KeyStore>,
    id: EvidenceId,
) -> Result<VerificationReport, VerifyError> {
    let record = repo.load(id).await?.ok_or(VerifyError::NotFound(id))?;

    let mut mismatches = Vec::new();

    let recomputed_content = ContentHash::compute(&record.document_bytes);
    let content_hash_matches = recomputed_content == record.content_hash;
    if !content_hash_matches {
        mismatches.push("content_hash".to_string());
    }

    let inputs = AttestationInputs {
        id: &record.id,
        content_hash: &record.content_hash,
        filename: &record.filename,
        submitter_label: &record.submitter_label,
        organization_label: &record.organization_label,
        created_at: &record.created_at,
    };
    let builder = FingerprintBuilder;
    let recomputed = builder.fingerprint_of(inputs, keystore.public_key_hex())?;
    let fingerprint_matches = record.fingerprint_hash == Some(recomputed);
    if !fingerprint_matches {
        mismatches.push("fingerprint_hash".to_string());
    }

    let signature_valid = signature_round_trip(&builder, inputs, keystore);
    if !signature_valid {
        mismatches.push("signature".to_string());
    }

    let (ledger_status, ledger_error) = match &record.ledger_tx_id {
        Some(tx_id) => match ledger.get_status(tx_id).await {
            Ok(status) => (Some(status), None),
            Err(e) => (None, Some(e.to_string())),
        },
        None => (None, None),
    };

    let verified = mismatches.is_empty();
    if !verified {
        tracing::warn!(
            %id,
            mismatches = ?mismatches,
            "integrity mismatch during verification"
        );
    }

    Ok(VerificationReport {
        record_id: id,
        verified,
        content_hash_matches,
        fingerprint: FingerprintCheck {
            stored: record.fingerprint_hash,
            recomputed,
            matches: fingerprint_matches,
        },
        signature_valid,
        ledger_status,
        ledger_error,
        mismatches,
    })
}

/// Produce a fresh signature over the recomputed content and verify it
/// against the signer's public key. RFC 6979 makes the signature a pure
/// function of key and digest, so this confirms the stored fields still
/// sign to something the recorded signer can stand behind.
fn signature_round_trip(
    builder: &FingerprintBuilder,
    inputs: AttestationInputs<'_>,
    keystore: &KeyStore,
) -> bool {
    let Ok(attestation) = builder.build(inputs, keystore) else {
        return false;
    };
    let Ok(canonical) = CanonicalBytes::new(&attestation.content) else {
        return false;
    };
    let digest = SigningDigest::derive(&canonical);
    let Ok(signature) = DerSignature::from_hex(&attestation.proofs[0].signature) else {
        return false;
    };
    verify_signature(keystore.verifying_key(), &digest, &signature).is_ok()
}
