//! # Attestation types
//!
//! The wire shape of an attestation. The structures are rigid — no
//! catch-all maps inside `content` or `proofs` — so an attestation cannot
//! carry unexpected fields into the signed byte stream.
//!
//! Field names serialize in camelCase to match the ledger's JSON surface;
//! canonicalization then orders them deterministically.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use pv_core::{ContentHash, EvidenceId, FingerprintHash, Timestamp};

/// Current attestation content layout version.
pub const ATTESTATION_VERSION: u32 = 1;

/// The signed portion of an attestation.
///
/// This object — and only this object — is canonicalized for fingerprint
/// and signature computation. Every field the fingerprint must be
/// sensitive to appears here: the organization and submitter labels, the
/// filename, the ingest timestamp, the content hash, and the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationContent {
    /// Organization label of the submitting record.
    pub org_id: String,
    /// Submitter label of the record.
    pub tenant_id: String,
    /// The evidence record identifier.
    pub event_id: String,
    /// Hex-encoded signer public key.
    pub signer_id: String,
    /// The record's filename.
    pub document_id: String,
    /// Hex content hash of the document bytes.
    pub document_ref: String,
    /// ISO-8601 UTC ingest timestamp.
    pub timestamp: String,
    /// Content layout version.
    pub version: u32,
}

impl AttestationContent {
    /// Assemble content from record fields and the signer identity.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        organization_label: &str,
        submitter_label: &str,
        event_id: &EvidenceId,
        signer_public_key_hex: &str,
        filename: &str,
        content_hash: &ContentHash,
        created_at: &Timestamp,
    ) -> Self {
        Self {
            org_id: organization_label.to_string(),
            tenant_id: submitter_label.to_string(),
            event_id: event_id.to_string(),
            signer_id: signer_public_key_hex.to_string(),
            document_id: filename.to_string(),
            document_ref: content_hash.to_hex(),
            timestamp: created_at.to_iso8601(),
            version: ATTESTATION_VERSION,
        }
    }
}

/// A cryptographic proof over the attestation content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationProof {
    /// Hex-encoded signer public key (doubles as the proof identifier).
    pub id: String,
    /// Hex-encoded DER signature.
    pub signature: String,
    /// The signing construction tag.
    pub algorithm: String,
}

/// Display metadata that accompanies the attestation to the ledger.
///
/// Not part of the signed content; the `hash` field carries the
/// fingerprint so the ledger can index the attestation without
/// re-deriving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationMetadata {
    /// The attestation fingerprint hash.
    pub hash: FingerprintHash,
    /// Organization display name.
    pub organization_name: String,
    /// Free-form string tags (company, filename).
    pub tags: BTreeMap<String, String>,
}

/// A fully-assembled attestation: signed content, proofs, metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// The signed content object.
    pub content: AttestationContent,
    /// Proofs over the content (one per signer; currently exactly one).
    pub proofs: Vec<AttestationProof>,
    /// Display metadata.
    pub metadata: AttestationMetadata,
}

impl Attestation {
    /// The fingerprint hash recorded in metadata.
    pub fn fingerprint(&self) -> &FingerprintHash {
        &self.metadata.hash
    }
}
