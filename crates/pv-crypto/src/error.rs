//! Error types for signing and key storage.
//!
//! Cryptographic preconditions fail loudly with context; nothing here
//! ever carries private key material in its message.

use thiserror::Error;

/// Error in ECDSA signing or verification.
#[derive(Error, Debug)]
pub enum SigningError {
    /// The private scalar is zero, out of range, or malformed.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// The public key bytes do not describe a curve point.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The DER signature bytes are structurally invalid.
    #[error("invalid DER signature: {0}")]
    InvalidDer(String),

    /// Signature production failed.
    #[error("signing failed: {0}")]
    SigningFailed(String),

    /// Signature did not verify against the given key and digest.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),
}

/// Error loading, validating, or persisting the signer key file.
#[derive(Error, Debug)]
pub enum KeyStoreError {
    /// Filesystem failure reading or writing the key file.
    #[error("key file io error: {0}")]
    Io(#[from] std::io::Error),

    /// The key file is not valid JSON or is missing fields.
    #[error("key file parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The stored private key is not a valid secp256k1 scalar.
    #[error("key file contains invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// A derived value does not match what the key file claims.
    ///
    /// This is a fail-fast condition: a key file whose public key or
    /// address disagrees with its private key has been corrupted or
    /// tampered with, and signing with it would produce attestations
    /// that can never be re-verified.
    #[error("key file {field} does not match value derived from private key")]
    IdentityMismatch {
        /// Which stored field disagreed (`publicKey` or `address`).
        field: &'static str,
    },
}
