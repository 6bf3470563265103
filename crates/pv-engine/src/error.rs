//! Error surface of the engine and registration service.

use thiserror::Error;

use pv_attest::BuildError;
use pv_store::StoreError;

/// Input rejected before any side effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The bytes do not start with the PDF magic prefix.
    #[error("document is not a PDF")]
    NotPdf,

    /// The document exceeds the configured size limit.
    #[error("document is {size} bytes; limit is {max}")]
    TooLarge {
        /// Submitted size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A required label was empty.
    #[error("{field} must not be empty")]
    MissingLabel {
        /// Which label.
        field: &'static str,
    },

    /// A label exceeded 255 bytes.
    #[error("{field} is {len} bytes; limit is 255")]
    LabelTooLong {
        /// Which label.
        field: &'static str,
        /// Submitted length in bytes.
        len: usize,
    },
}

/// Error from `register` and the other service operations.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Input rejected; no repository row was created.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error from the confirmation engine's own operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Attestation assembly failure.
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Error from `verify`.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// No record with the given id.
    #[error("evidence record not found: {0}")]
    NotFound(pv_core::EvidenceId),

    /// Persistence failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The stored record could not be re-fingerprinted.
    #[error(transparent)]
    Build(#[from] BuildError),
}
