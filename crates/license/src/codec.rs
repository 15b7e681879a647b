//! Cryptographic codec for license keys.
//!
//! A key is `hex(iv).hex(ciphertext).hex(tag).hex(signature)`:
//! AES-256-GCM over the serialized payload, then an HMAC-SHA256 signature
//! over the ciphertext blob (first three segments). Signing the ciphertext
//! rather than the plaintext lets verification reject forged or corrupted
//! keys before any decryption is attempted, and the HMAC comparison is
//! constant-time.
//!
//! Both working keys are derived by hashing independent master secrets, so
//! the raw secrets never live in this struct.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::payload::LicensePayload;

type HmacSha256 = Hmac<Sha256>;

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;
const SEGMENTS: usize = 4;

/// Codec failure taxonomy. A malformed key is permanently invalid; none of
/// these are retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The key does not have the expected delimited structure, or the
    /// payload could not be sealed in the first place.
    #[error("invalid license key format")]
    InvalidFormat,

    /// The keyed signature over the ciphertext blob does not match.
    #[error("license signature mismatch")]
    SignatureMismatch,

    /// Authenticated decryption failed (corruption or wrong key material).
    #[error("license decryption failed")]
    DecryptionFailed,
}

/// Seals license payloads into opaque keys and opens them again.
#[derive(Clone)]
pub struct LicenseCodec {
    encryption_key: [u8; 32],
    signing_key: [u8; 32],
}

impl LicenseCodec {
    /// Derive working keys from the two master secrets (one-way SHA-256).
    pub fn new(encryption_secret: &str, signing_secret: &str) -> Self {
        Self {
            encryption_key: derive_key(encryption_secret.as_bytes()),
            signing_key: derive_key(signing_secret.as_bytes()),
        }
    }

    /// Seal a payload into an opaque license key.
    pub fn encode(&self, payload: &LicensePayload) -> Result<String, CodecError> {
        let plaintext = serde_json::to_vec(payload).map_err(|_| CodecError::InvalidFormat)?;

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.encryption_key));
        let mut ciphertext = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_slice())
            .map_err(|_| CodecError::InvalidFormat)?;

        // aes-gcm appends the 16-byte tag; carry it as its own segment.
        let tag = ciphertext.split_off(ciphertext.len() - TAG_LEN);

        let blob = format!("{}.{}.{}", hex::encode(iv), hex::encode(&ciphertext), hex::encode(&tag));
        let signature = self.sign(blob.as_bytes());

        Ok(format!("{blob}.{}", hex::encode(signature)))
    }

    /// Open a license key, verifying the signature before decryption.
    pub fn decode(&self, key: &str) -> Result<LicensePayload, CodecError> {
        let segments: Vec<&str> = key.split('.').collect();
        if segments.len() != SEGMENTS {
            return Err(CodecError::InvalidFormat);
        }

        let blob = format!("{}.{}.{}", segments[0], segments[1], segments[2]);

        let signature = hex::decode(segments[3]).map_err(|_| CodecError::InvalidFormat)?;
        self.verify(blob.as_bytes(), &signature)?;

        let iv = hex::decode(segments[0]).map_err(|_| CodecError::InvalidFormat)?;
        let ciphertext = hex::decode(segments[1]).map_err(|_| CodecError::InvalidFormat)?;
        let tag = hex::decode(segments[2]).map_err(|_| CodecError::InvalidFormat)?;
        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return Err(CodecError::InvalidFormat);
        }

        let mut sealed = ciphertext;
        sealed.extend_from_slice(&tag);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.encryption_key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&iv), sealed.as_slice())
            .map_err(|_| CodecError::DecryptionFailed)?;

        serde_json::from_slice(&plaintext).map_err(|_| CodecError::DecryptionFailed)
    }

    /// Extract the signature segment of an already-encoded key (stored
    /// alongside the license row for audit).
    pub fn signature_of(key: &str) -> Option<&str> {
        let segments: Vec<&str> = key.split('.').collect();
        (segments.len() == SEGMENTS).then(|| segments[3])
    }

    fn sign(&self, blob: &[u8]) -> Vec<u8> {
        // Qualified: `aes_gcm::aead::KeyInit` also provides `new_from_slice`.
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.signing_key)
            .expect("HMAC accepts any key length");
        mac.update(blob);
        mac.finalize().into_bytes().to_vec()
    }

    fn verify(&self, blob: &[u8], signature: &[u8]) -> Result<(), CodecError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.signing_key)
            .expect("HMAC accepts any key length");
        mac.update(blob);
        // Constant-time comparison; no timing side-channel on the check.
        mac.verify_slice(signature)
            .map_err(|_| CodecError::SignatureMismatch)
    }
}

fn derive_key(secret: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.finalize().into()
}
