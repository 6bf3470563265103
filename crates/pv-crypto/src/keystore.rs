//! # Key Store — Process-Lifetime Signer Identity
//!
//! Owns the secp256k1 signer identity for the process. On startup the
//! store consults a configured key file path:
//!
//! - If the file exists, it is parsed as JSON
//!   `{privateKey, publicKey, address}`; the public key and address are
//!   re-derived from the private scalar and the load fails fast on any
//!   mismatch.
//! - If absent, a fresh key is generated from the OS CSPRNG, derived
//!   values are computed, and the file is persisted atomically
//!   (write-temp-then-rename, mode 0600 on unix).
//!
//! The identity is never rotated within a process lifetime; rotation
//! requires a restart with a different key file. The store is
//! constructor-injected wherever signing is needed — there is no
//! module-level singleton to initialize by side effect.
//!
//! ## Key File Format
//!
//! - `privateKey`: 64 hex chars — the 32-byte scalar.
//! - `publicKey`: 128 hex chars — the uncompressed SEC1 point without its
//!   `0x04` prefix.
//! - `address`: `pv1` followed by the lowercase hex of the last 20 bytes
//!   of SHA-256 over the 64-byte public key body. Stable across runs and
//!   machines for the same key.

use std::fs;
use std::path::{Path, PathBuf};

use k256::ecdsa::{SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::ecdsa::{hex_lower, hex_to_bytes, sign_digest, DerSignature, SigningDigest};
use crate::error::{KeyStoreError, SigningError};

/// On-disk key file layout.
#[derive(Debug, Serialize, Deserialize)]
struct KeyFile {
    #[serde(rename = "privateKey")]
    private_key: String,
    #[serde(rename = "publicKey")]
    public_key: String,
    address: String,
}

/// The process-wide signer identity.
///
/// Holds the private scalar for the process lifetime and exposes the
/// derived public key, address, and a signing operation. Shared read-only
/// after initialization (typically behind an `Arc`).
pub struct KeyStore {
    signing_key: SigningKey,
    public_key_hex: String,
    address: String,
}

impl KeyStore {
    /// Load the signer identity from `path`, or generate and persist one.
    ///
    /// # Errors
    ///
    /// Fails on unreadable/unparseable key files, invalid key material,
    /// or when the stored `publicKey`/`address` disagree with values
    /// derived from the stored private key.
    pub fn load_or_generate(path: impl AsRef<Path>) -> Result<Self, KeyStoreError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            let store = Self::generate();
            store.persist(path)?;
            tracing::info!(
                path = %path.display(),
                address = %store.address,
                "generated new signer identity"
            );
            Ok(store)
        }
    }

    /// Load and validate an existing key file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, KeyStoreError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        let file: KeyFile = serde_json::from_str(&raw)?;

        let scalar = hex_to_bytes(file.private_key.trim())
            .map_err(KeyStoreError::InvalidKeyMaterial)?;
        let signing_key = SigningKey::from_slice(&scalar)
            .map_err(|e| KeyStoreError::InvalidKeyMaterial(e.to_string()))?;

        let store = Self::from_signing_key(signing_key);
        if !store.public_key_hex.eq_ignore_ascii_case(file.public_key.trim()) {
            return Err(KeyStoreError::IdentityMismatch { field: "publicKey" });
        }
        if store.address != file.address.trim() {
            return Err(KeyStoreError::IdentityMismatch { field: "address" });
        }
        tracing::debug!(
            path = %path.display(),
            address = %store.address,
            "loaded signer identity"
        );
        Ok(store)
    }

    /// Generate a fresh identity without touching the filesystem.
    ///
    /// Used directly by tests; production callers go through
    /// [`KeyStore::load_or_generate`] so the identity survives restarts.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand_core::OsRng))
    }

    /// Build an identity from a known 32-byte scalar.
    pub fn from_scalar(scalar: &[u8; 32]) -> Result<Self, KeyStoreError> {
        let signing_key = SigningKey::from_slice(scalar)
            .map_err(|e| KeyStoreError::InvalidKeyMaterial(e.to_string()))?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let point = signing_key.verifying_key().to_encoded_point(false);
        // Skip the 0x04 SEC1 prefix; the remaining 64 bytes are the point.
        let body = &point.as_bytes()[1..];
        let public_key_hex = hex_lower(body);
        let address = derive_address(body);
        Self {
            signing_key,
            public_key_hex,
            address,
        }
    }

    /// Persist the identity atomically: write a temp file alongside the
    /// target, restrict permissions, then rename into place.
    fn persist(&self, path: &Path) -> Result<(), KeyStoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = KeyFile {
            private_key: hex_lower(self.signing_key.to_bytes().as_slice()),
            public_key: self.public_key_hex.clone(),
            address: self.address.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let tmp = tmp_path(path);
        fs::write(&tmp, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// The 128-hex-char uncompressed public key (without SEC1 prefix).
    pub fn public_key_hex(&self) -> &str {
        &self.public_key_hex
    }

    /// The derived signer address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The verifying key for signature checks.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign a derived digest, producing a DER-encoded low-`s` signature.
    pub fn sign(&self, digest: &SigningDigest) -> Result<DerSignature, SigningError> {
        sign_digest(&self.signing_key, digest)
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the private scalar.
        write!(f, "KeyStore(address: {})", self.address)
    }
}

/// Stable address derivation: `pv1` + hex of the last 20 bytes of
/// SHA-256 over the 64-byte uncompressed public key body.
fn derive_address(public_key_body: &[u8]) -> String {
    let hash = Sha256::digest(public_key_body);
    format!("pv1{}", hex_lower(&hash[12..]))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "keystore".into());
    name.push(".tmp");
    path.with_file_name(name)
}
