//! # Digests — Content and Fingerprint Hashes
//!
//! Two SHA-256 digest newtypes with deliberately different constructors:
//!
//! - [`ContentHash`] is computed over the raw uploaded document bytes and
//!   is the unique key for evidence records.
//! - [`FingerprintHash`] is computed **only** from [`CanonicalBytes`],
//!   ensuring every fingerprint in the system went through the
//!   canonicalization pipeline. Passing raw bytes is a compile error.
//!
//! Both render and serialize as 64 lowercase hex characters, which is the
//! form that travels in attestation metadata and database columns.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

/// SHA-256 over raw document bytes. The unique key for evidence records.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

/// SHA-256 over the canonicalized attestation content.
///
/// Distinct from [`ContentHash`]: the fingerprint binds the attestation
/// fields (labels, timestamp, signer), not the document bytes themselves.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FingerprintHash([u8; 32]);

impl ContentHash {
    /// Compute the content hash of a raw byte string.
    pub fn compute(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hash);
        Self(out)
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex_lower(&self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, crate::error::DigestParseError> {
        Ok(Self(parse_hex_32(hex)?))
    }
}

impl FingerprintHash {
    /// Compute the fingerprint hash from canonical bytes.
    ///
    /// The `&CanonicalBytes` parameter makes it impossible to fingerprint
    /// data that skipped canonicalization.
    pub fn compute(canonical: &CanonicalBytes) -> Self {
        let hash = Sha256::digest(canonical.as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&hash);
        Self(out)
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as 64 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        hex_lower(&self.0)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(hex: &str) -> Result<Self, crate::error::DigestParseError> {
        Ok(Self(parse_hex_32(hex)?))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Display for FingerprintHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl std::fmt::Debug for FingerprintHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FingerprintHash({})", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

impl Serialize for FingerprintHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FingerprintHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Lowercase hex rendering shared by the digest newtypes.
pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn parse_hex_32(hex: &str) -> Result<[u8; 32], crate::error::DigestParseError> {
    let hex = hex.trim();
    if hex.len() != 64 {
        return Err(crate::error::DigestParseError::Length(hex.len()));
    }
    let mut out = [0u8; 32];
    for (i, slot) in out.iter_mut().enumerate() {
        let pair = &hex[i * 2..i * 2 + 2];
        *slot = u8::from_str_radix(pair, 16)
            .map_err(|_| crate::error::DigestParseError::NonHex(i * 2))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_known_vector_empty() {
        // SHA-256 of the empty string.
        assert_eq!(
            ContentHash::compute(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn content_hash_known_vector_abc() {
        assert_eq!(
            ContentHash::compute(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn content_hash_is_64_lowercase_hex() {
        let hex = ContentHash::compute(b"%PDF-1.7 sample").to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn content_hash_deterministic() {
        let a = ContentHash::compute(b"same bytes");
        let b = ContentHash::compute(b"same bytes");
        assert_eq!(a, b);
        assert_ne!(a, ContentHash::compute(b"other bytes"));
    }

    #[test]
    fn content_hash_hex_round_trip() {
        let h = ContentHash::compute(b"round trip");
        let parsed = ContentHash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn content_hash_from_hex_rejects_bad_input() {
        assert!(ContentHash::from_hex("abcd").is_err());
        assert!(ContentHash::from_hex(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn fingerprint_hash_from_canonical() {
        let cb = CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap();
        let fp = FingerprintHash::compute(&cb);
        // Must equal SHA-256 of the canonical bytes themselves.
        assert_eq!(fp.to_hex(), ContentHash::compute(cb.as_bytes()).to_hex());
    }

    #[test]
    fn fingerprint_differs_when_content_differs() {
        let a = FingerprintHash::compute(&CanonicalBytes::new(&serde_json::json!({"a": 1})).unwrap());
        let b = FingerprintHash::compute(&CanonicalBytes::new(&serde_json::json!({"a": 2})).unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn serde_as_hex_string() {
        let h = ContentHash::compute(b"x");
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json.len(), 66); // 64 hex chars + quotes
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }

    #[test]
    fn debug_shows_hex() {
        let h = ContentHash::compute(b"x");
        assert!(format!("{h:?}").starts_with("ContentHash("));
    }
}
