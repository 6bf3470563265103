//! # ECDSA over secp256k1 — Chained Digest and DER Signatures
//!
//! The signing construction tagged `SECP256K1_RFC8785_V1`:
//!
//! 1. `canonical` — RFC 8785 bytes of the attestation content.
//! 2. `h1 = SHA-256(canonical)`; its lowercase hex is a 64-byte ASCII
//!    string (this hex is also the attestation fingerprint).
//! 3. `h2 = SHA-512(hex_ascii(h1))`.
//! 4. `digest = h2[0..32)` — the ECDSA pre-image.
//!
//! Signatures use RFC 6979 deterministic nonces, are low-`s` normalized,
//! and are encoded as DER `SEQUENCE { INTEGER r, INTEGER s }` rendered as
//! lowercase hex.
//!
//! ## Security Invariant
//!
//! `SigningDigest` can only be derived from `&CanonicalBytes`. There is no
//! constructor from raw bytes, so a digest that skipped canonicalization
//! cannot exist. Verifiers rebuild the digest with the same derivation and
//! check the DER signature against the signer's public key.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256, Sha512};

use pv_core::CanonicalBytes;

use crate::error::SigningError;

/// The proof algorithm tag carried in attestations.
pub const ALGORITHM_TAG: &str = "SECP256K1_RFC8785_V1";

/// The 32-byte ECDSA pre-image derived from canonical attestation bytes.
///
/// Only constructible via [`SigningDigest::derive`], which applies the
/// full chained construction.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SigningDigest([u8; 32]);

impl SigningDigest {
    /// Derive the signing digest from canonical bytes.
    ///
    /// Applies SHA-256, renders the result as lowercase hex ASCII, hashes
    /// that with SHA-512, and truncates to 32 bytes.
    pub fn derive(canonical: &CanonicalBytes) -> Self {
        let h1 = Sha256::digest(canonical.as_bytes());
        let h1_hex = hex_lower(&h1);
        let h2 = Sha512::digest(h1_hex.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&h2[..32]);
        Self(out)
    }

    /// The raw 32-byte pre-image.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SigningDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningDigest({}...)", hex_lower(&self.0[..4]))
    }
}

/// A DER-encoded, low-`s` canonical ECDSA signature.
///
/// Serializes as lowercase hex. The DER form is
/// `SEQUENCE { INTEGER r, INTEGER s }` with minimal integer encoding: no
/// superfluous leading zero bytes, and a single `0x00` prefix where the
/// high bit of the first content byte is set.
#[derive(Clone, PartialEq, Eq)]
pub struct DerSignature(Vec<u8>);

impl DerSignature {
    /// Wrap DER bytes, validating the structure.
    pub fn from_der(bytes: &[u8]) -> Result<Self, SigningError> {
        Signature::from_der(bytes)
            .map_err(|e| SigningError::InvalidDer(e.to_string()))?;
        Ok(Self(bytes.to_vec()))
    }

    /// Parse from lowercase hex.
    pub fn from_hex(hex: &str) -> Result<Self, SigningError> {
        let bytes =
            hex_to_bytes(hex.trim()).map_err(SigningError::InvalidDer)?;
        Self::from_der(&bytes)
    }

    /// The DER bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Render as lowercase hex.
    pub fn to_hex(&self) -> String {
        hex_lower(&self.0)
    }
}

impl std::fmt::Debug for DerSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DerSignature({}...)", hex_lower(&self.0[..4.min(self.0.len())]))
    }
}

impl std::fmt::Display for DerSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Sign a derived digest with a secp256k1 private key.
///
/// RFC 6979 deterministic: the same key and digest always produce the
/// same signature. The result is low-`s` normalized before DER encoding.
pub(crate) fn sign_digest(
    key: &SigningKey,
    digest: &SigningDigest,
) -> Result<DerSignature, SigningError> {
    let sig: Signature = key
        .sign_prehash(digest.as_bytes())
        .map_err(|e| SigningError::SigningFailed(e.to_string()))?;
    let sig = sig.normalize_s().unwrap_or(sig);
    Ok(DerSignature(sig.to_der().as_bytes().to_vec()))
}

/// Verify a DER signature over a derived digest.
///
/// High-`s` encodings are normalized before verification, so a signature
/// rejected here is genuinely invalid rather than merely non-canonical.
pub fn verify_signature(
    public_key: &VerifyingKey,
    digest: &SigningDigest,
    signature: &DerSignature,
) -> Result<(), SigningError> {
    let sig = Signature::from_der(signature.as_bytes())
        .map_err(|e| SigningError::InvalidDer(e.to_string()))?;
    let sig = sig.normalize_s().unwrap_or(sig);
    public_key
        .verify_prehash(digest.as_bytes(), &sig)
        .map_err(|e| SigningError::VerificationFailed(e.to_string()))
}

/// Parse a public key from its 128-hex-char uncompressed form (the
/// 64 bytes that follow the `0x04` SEC1 prefix).
pub fn public_key_from_hex(hex: &str) -> Result<VerifyingKey, SigningError> {
    let body = hex_to_bytes(hex.trim()).map_err(SigningError::InvalidPublicKey)?;
    if body.len() != 64 {
        return Err(SigningError::InvalidPublicKey(format!(
            "expected 64 bytes of uncompressed point, got {}",
            body.len()
        )));
    }
    let mut sec1 = Vec::with_capacity(65);
    sec1.push(0x04);
    sec1.extend_from_slice(&body);
    VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|e| SigningError::InvalidPublicKey(e.to_string()))
}

// ---------------------------------------------------------------------------
// Hex utilities (no external hex crate dependency)
// ---------------------------------------------------------------------------

pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub(crate) fn hex_to_bytes(hex: &str) -> Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err("hex string must have even length".to_string());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| format!("invalid hex at position {i}: {e}"))
        })
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Every produced signature parses as DER and verifies.
        #[test]
        fn all_signatures_verify(seed in 1u8..255, payload in "[a-z0-9]{1,40}") {
            let key = SigningKey::from_slice(&[seed; 32]).unwrap();
            let cb = CanonicalBytes::new(&serde_json::json!({"payload": payload})).unwrap();
            let digest = SigningDigest::derive(&cb);
            let sig = sign_digest(&key, &digest).unwrap();
            prop_assert!(Signature::from_der(sig.as_bytes()).is_ok());
            prop_assert!(verify_signature(key.verifying_key(), &digest, &sig).is_ok());
        }

        /// Signatures are always low-s.
        #[test]
        fn always_low_s(seed in 1u8..255, n in 0u64..1000) {
            let key = SigningKey::from_slice(&[seed; 32]).unwrap();
            let cb = CanonicalBytes::new(&serde_json::json!({"n": n})).unwrap();
            let digest = SigningDigest::derive(&cb);
            let sig = sign_digest(&key, &digest).unwrap();
            let parsed = Signature::from_der(sig.as_bytes()).unwrap();
            prop_assert!(parsed.normalize_s().is_none());
        }
    }
}
