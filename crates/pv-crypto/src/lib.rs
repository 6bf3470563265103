//! # pv-crypto — Signing Primitives for ProofVault
//!
//! Implements the cryptographic half of attestation production:
//!
//! - [`SigningDigest`] — the chained digest construction that turns
//!   canonical attestation bytes into the 32-byte ECDSA pre-image.
//! - [`DerSignature`] — DER-encoded, low-`s` canonical secp256k1
//!   signatures with deterministic (RFC 6979) nonces.
//! - [`KeyStore`] — the process-lifetime signer identity, loaded from or
//!   persisted to an on-disk key file.
//!
//! ## Security Invariant
//!
//! Signing input MUST originate from `&CanonicalBytes` — `SigningDigest`
//! has no constructor taking raw bytes. This enforces that everything
//! signed went through the canonicalization pipeline, so any verifier
//! applying the same pipeline reproduces the digest exactly.

pub mod ecdsa;
pub mod error;
pub mod keystore;

pub use ecdsa::{public_key_from_hex, verify_signature, DerSignature, SigningDigest, ALGORITHM_TAG};
pub use error::{KeyStoreError, SigningError};
pub use keystore::KeyStore;
