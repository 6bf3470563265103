//! # Fingerprint Builder
//!
//! Turns record fields plus the signer identity into a fully-populated
//! [`Attestation`]. The builder is a pure function of its inputs: the
//! canonical content bytes, the fingerprint hash, and the RFC 6979
//! signature are all byte-identical across runs and machines for the
//! same inputs.

use std::collections::BTreeMap;

use thiserror::Error;

use pv_core::{
    CanonicalBytes, CanonicalizationError, ContentHash, EvidenceId, FingerprintHash, Timestamp,
};
use pv_crypto::{KeyStore, SigningDigest, SigningError, ALGORITHM_TAG};

use crate::attestation::{
    Attestation, AttestationContent, AttestationMetadata, AttestationProof,
};

/// Error assembling an attestation.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The content object could not be canonicalized.
    #[error("attestation canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Signature production failed.
    #[error("attestation signing failed: {0}")]
    Signing(#[from] SigningError),
}

/// The record fields the builder consumes.
///
/// Borrowed views onto an evidence record; the builder takes no ownership
/// and performs no I/O.
#[derive(Debug, Clone, Copy)]
pub struct AttestationInputs<'a> {
    /// The evidence record identifier.
    pub id: &'a EvidenceId,
    /// Content hash of the document bytes.
    pub content_hash: &'a ContentHash,
    /// Record filename.
    pub filename: &'a str,
    /// Submitter label.
    pub submitter_label: &'a str,
    /// Organization label.
    pub organization_label: &'a str,
    /// Ingest timestamp.
    pub created_at: &'a Timestamp,
}

/// Assembles signed attestations from record fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerprintBuilder;

impl FingerprintBuilder {
    /// Build the attestation for a record: canonicalize the content,
    /// compute the fingerprint, sign the derived digest, and attach
    /// metadata.
    pub fn build(
        &self,
        inputs: AttestationInputs<'_>,
        keystore: &KeyStore,
    ) -> Result<Attestation, BuildError> {
        let content = AttestationContent::new(
            inputs.organization_label,
            inputs.submitter_label,
            inputs.id,
            keystore.public_key_hex(),
            inputs.filename,
            inputs.content_hash,
            inputs.created_at,
        );

        let canonical = CanonicalBytes::new(&content)?;
        let fingerprint = FingerprintHash::compute(&canonical);
        let digest = SigningDigest::derive(&canonical);
        let signature = keystore.sign(&digest)?;

        let proof = AttestationProof {
            id: keystore.public_key_hex().to_string(),
            signature: signature.to_hex(),
            algorithm: ALGORITHM_TAG.to_string(),
        };

        let metadata = AttestationMetadata {
            hash: fingerprint,
            organization_name: inputs.organization_label.to_string(),
            tags: BTreeMap::from([
                ("company".to_string(), inputs.organization_label.to_string()),
                ("filename".to_string(), inputs.filename.to_string()),
            ]),
        };

        Ok(Attestation {
            content,
            proofs: vec![proof],
            metadata,
        })
    }

    /// Recompute only the fingerprint hash for the given inputs.
    ///
    /// Used during verification to compare against the stored value
    /// without producing a new signature.
    pub fn fingerprint_of(
        &self,
        inputs: AttestationInputs<'_>,
        signer_public_key_hex: &str,
    ) -> Result<FingerprintHash, BuildError> {
        let content = AttestationContent::new(
            inputs.organization_label,
            inputs.submitter_label,
            inputs.id,
            signer_public_key_hex,
            inputs.filename,
            inputs.content_hash,
            inputs.created_at,
        );
        let canonical = CanonicalBytes::new(&content)?;
        Ok(FingerprintHash::compute(&canonical))
    }
}
