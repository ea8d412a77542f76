//! Security-module capability
//!
//! The engine never touches cryptographic primitives directly; it talks to a
//! pluggable [`SecModule`]. Hardware-backed implementations (secure element,
//! TPM) implement the same trait as the bundled software module.

use iotrust_protocol::{CurveType, HashType};
use thiserror::Error;

pub mod software;

pub use software::SoftwareSecModule;

/// Errors from security-module operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Signature did not verify against the digest
    #[error("Signature verification failed")]
    BadSignature,
    /// Key bytes could not be parsed for the declared curve
    #[error("Malformed key: {0}")]
    MalformedKey(String),
    /// AEAD encryption/decryption failed
    #[error("AEAD operation failed")]
    Aead,
    /// Algorithm not available in this module
    #[error("Unsupported algorithm: {0}")]
    Unsupported(String),
    /// Random source failure
    #[error("Entropy source failed")]
    Entropy,
}

/// Streaming hash operation
///
/// `verify` hashes header, key records and footer tag in sequence without
/// assembling the whole list in memory, so the module exposes a streaming
/// interface rather than a one-shot digest only.
pub trait HashOp {
    fn update(&mut self, data: &[u8]);
    fn finish(self: Box<Self>) -> Vec<u8>;
}

/// Pluggable cryptographic primitive provider
pub trait SecModule: Send + Sync {
    /// Begin a streaming hash
    fn hash_begin(&self, alg: HashType) -> Result<Box<dyn HashOp>, CryptoError>;

    /// One-shot digest
    fn hash(&self, alg: HashType, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut op = self.hash_begin(alg)?;
        op.update(data);
        Ok(op.finish())
    }

    /// Keyed MAC over `data`
    fn hmac(&self, alg: HashType, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Fill `buf` with cryptographically secure random bytes
    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), CryptoError>;

    /// Verify a raw `r || s` signature over a precomputed digest.
    ///
    /// `pubkey` is a SEC1-encoded point for `curve`.
    fn ecdsa_verify(
        &self,
        curve: CurveType,
        pubkey: &[u8],
        hash_alg: HashType,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError>;

    /// AES-256-GCM seal; returns ciphertext with the tag appended
    fn aes_gcm_encrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; 12],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// AES-256-GCM open
    fn aes_gcm_decrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; 12],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    /// HKDF-style key derivation into `out`
    fn kdf(&self, alg: HashType, secret: &[u8], info: &[u8], out: &mut [u8])
        -> Result<(), CryptoError>;
}
