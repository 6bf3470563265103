//! # pv-core — Foundational Types for ProofVault
//!
//! The bedrock of the ProofVault workspace. Defines the type-system
//! primitives every other crate builds on; depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** ALL fingerprint and signing digest
//!    computation flows through `CanonicalBytes::new()`. No raw
//!    `serde_json::to_vec()` for anything that gets hashed or signed.
//!    Two processes that disagree on serialization produce attestations
//!    that cannot be re-verified; the private inner field makes the wrong
//!    path unrepresentable.
//!
//! 2. **Digest newtypes with restricted constructors.** `ContentHash` is
//!    computed from raw document bytes; `FingerprintHash` accepts only
//!    `&CanonicalBytes`. You cannot fingerprint un-canonicalized data.
//!
//! 3. **UTC-only timestamps.** `Timestamp` enforces UTC with Z suffix and
//!    seconds precision, so the attestation `timestamp` field has exactly
//!    one textual form.
//!
//! 4. **Closed failure taxonomy.** `ErrorCategory` is the single
//!    enumeration of transport-failure classes; retry policy decisions
//!    match on it exhaustively.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `pv-*` crates (leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use canonical::CanonicalBytes;
pub use digest::{ContentHash, FingerprintHash};
pub use error::{CanonicalizationError, ErrorCategory};
pub use identity::{EvidenceId, LedgerTxId};
pub use temporal::Timestamp;
