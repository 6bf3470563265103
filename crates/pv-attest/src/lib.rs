//! # pv-attest — Attestations and the Fingerprint Builder
//!
//! The attestation is the externally-verifiable record of an evidence
//! item: a canonically-serialized content object bound to a signer by an
//! ECDSA proof, plus display metadata. Only attestation fields ever leave
//! the server — never document bytes.
//!
//! ## Structure
//!
//! - [`AttestationContent`] — the fields that are canonicalized, hashed,
//!   and signed. Every input of fingerprint determinism lives here.
//! - [`AttestationProof`] — signer public key, DER signature hex, and the
//!   algorithm tag.
//! - [`AttestationMetadata`] — the fingerprint hash and display tags.
//! - [`FingerprintBuilder`] — the pure assembly function: same inputs,
//!   byte-identical attestation, on any machine.

pub mod attestation;
pub mod builder;

pub use attestation::{
    Attestation, AttestationContent, AttestationMetadata, AttestationProof,
};
pub use builder::{AttestationInputs, BuildError, FingerprintBuilder};
