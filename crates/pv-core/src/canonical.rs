//! # Canonical Serialization — RFC 8785 Byte Production
//!
//! Defines `CanonicalBytes`, the sole construction path for bytes used in
//! fingerprint and signing-digest computation across ProofVault.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()`, which validates the
//! value domain and serializes with `serde_jcs`. Any function that hashes
//! or signs structured data must accept `&CanonicalBytes`, so the "wrong
//! serialization path" defect class is structurally impossible.
//!
//! ## Serialization Rules (RFC 8785, JSON Canonicalization Scheme)
//!
//! - Object keys sorted by their UTF-16 code-unit sequence, ascending.
//! - Strings with JSON minimal escaping; no insignificant whitespace.
//! - Numbers in ECMAScript `Number.prototype.toString` form.
//! - Arrays preserve insertion order.
//!
//! Any independent verifier applying the same rules to the same value
//! reproduces the bytes exactly, which is what makes fingerprints and
//! signatures re-checkable outside this process.
//!
//! ## Floats Are Rejected
//!
//! Attestation content carries only strings and integers, and float
//! serialization is where cross-language canonicalization agreements go
//! to die. Any non-integer number fails with
//! `CanonicalizationError::FloatRejected`. Note that serde collapses
//! NaN and infinities to `null` before any value reaches this module;
//! keeping floats out of canonical content entirely is what makes that
//! collapse harmless.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by RFC 8785 canonicalization.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - The accepted value domain is null, bool, string, integer, array,
///   and object-with-string-keys. Floats are rejected.
/// - Serialization uses sorted keys with compact separators; the output
///   is valid UTF-8 JSON.
///
/// The inner `Vec<u8>` is private, so downstream code cannot smuggle in
/// bytes produced any other way.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// This is the ONLY way to construct `CanonicalBytes`. All fingerprint
    /// and signing-digest computation must flow through this constructor.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::FloatRejected` if the value
    /// contains a non-integer number, and
    /// `CanonicalizationError::SerializationFailed` if the value cannot be
    /// represented as JSON at all (non-string map keys included).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        check_value_domain(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Recursively validate that a JSON value stays inside the accepted
/// canonicalization domain: any number that is not representable as
/// i64/u64 is a float and is rejected. Map keys are already strings by
/// the time a `Value::Object` exists; non-string keys fail earlier, in
/// `to_value`.
fn check_value_domain(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() && !n.is_i64() && !n.is_u64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                check_value_domain(item)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            for v in map.values() {
                check_value_domain(v)?;
            }
            Ok(())
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for values inside the accepted canonicalization domain.
    fn json_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| serde_json::json!(n)),
            "[a-zA-Z0-9_ ]{0,50}".prop_map(Value::String),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,10}", inner, 0..8).prop_map(|m| {
                    let map: serde_json::Map<String, Value> = m.into_iter().collect();
                    Value::Object(map)
                }),
            ]
        })
    }

    proptest! {
        /// Canonicalization never panics inside the accepted domain.
        #[test]
        fn never_panics(value in json_value()) {
            let result = CanonicalBytes::new(&value);
            prop_assert!(result.is_ok(), "canonicalization failed: {:?}", result.err());
        }

        /// Same input always produces the same bytes.
        #[test]
        fn deterministic(value in json_value()) {
            let a = CanonicalBytes::new(&value).unwrap();
            let b = CanonicalBytes::new(&value).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        /// Canonical bytes parse back to the structurally identical value.
        #[test]
        fn round_trips(value in json_value()) {
            let cb = CanonicalBytes::new(&value).unwrap();
            let parsed: Value = serde_json::from_slice(cb.as_bytes()).unwrap();
            prop_assert_eq!(parsed, value);
        }

        /// Output is valid UTF-8.
        #[test]
        fn valid_utf8(value in json_value()) {
            let cb = CanonicalBytes::new(&value).unwrap();
            prop_assert!(std::str::from_utf8(cb.as_bytes()).is_ok());
        }

        /// Object keys come out sorted.
        #[test]
        fn keys_sorted(keys in prop::collection::btree_set("[a-z]{1,8}", 2..6)) {
            let map: serde_json::Map<String, Value> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| (k.clone(), serde_json::json!(i)))
                .collect();
            let cb = CanonicalBytes::new(&Value::Object(map)).unwrap();
            let parsed: serde_json::Map<String, Value> =
                serde_json::from_slice(cb.as_bytes()).unwrap();
            let output_keys: Vec<&String> = parsed.keys().collect();
            let mut sorted = output_keys.clone();
            sorted.sort();
            prop_assert_eq!(output_keys, sorted);
        }
    }
}
