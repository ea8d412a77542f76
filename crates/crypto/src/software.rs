//! Software security module
//!
//! Pure-software implementation of the [`SecModule`] capability. Suitable for
//! gateways and for constrained targets without a secure element. ECDSA
//! verification is provided for P-256; the larger NIST curves report
//! `Unsupported` until a hardware module covers them.

use crate::{CryptoError, HashOp, SecModule};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use iotrust_protocol::{CurveType, HashType};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Software implementation of the security-module capability
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareSecModule;

impl SoftwareSecModule {
    pub fn new() -> Self {
        Self
    }
}

struct DigestOp<D: Digest>(D);

impl<D: Digest> HashOp for DigestOp<D> {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finish(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

macro_rules! hmac_compute {
    ($digest:ty, $key:expr, $data:expr) => {{
        let mut mac = <Hmac<$digest> as Mac>::new_from_slice($key)
            .map_err(|_| CryptoError::MalformedKey("Invalid HMAC key".into()))?;
        mac.update($data);
        Ok(mac.finalize().into_bytes().to_vec())
    }};
}

/// HKDF expand: out blocks T(i) = HMAC(prk, T(i-1) || info || i)
macro_rules! hkdf_expand {
    ($digest:ty, $secret:expr, $info:expr, $out:expr) => {{
        let mut previous: Vec<u8> = Vec::new();
        let mut written = 0usize;
        let mut counter = 1u8;
        while written < $out.len() {
            let mut mac = <Hmac<$digest> as Mac>::new_from_slice($secret)
                .map_err(|_| CryptoError::MalformedKey("Invalid KDF secret".into()))?;
            mac.update(&previous);
            mac.update($info);
            mac.update(&[counter]);
            previous = mac.finalize().into_bytes().to_vec();
            let n = previous.len().min($out.len() - written);
            $out[written..written + n].copy_from_slice(&previous[..n]);
            written += n;
            counter = counter.wrapping_add(1);
        }
        Ok(())
    }};
}

impl SecModule for SoftwareSecModule {
    fn hash_begin(&self, alg: HashType) -> Result<Box<dyn HashOp>, CryptoError> {
        Ok(match alg {
            HashType::Sha256 => Box::new(DigestOp(Sha256::new())),
            HashType::Sha384 => Box::new(DigestOp(Sha384::new())),
            HashType::Sha512 => Box::new(DigestOp(Sha512::new())),
        })
    }

    fn hmac(&self, alg: HashType, key: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match alg {
            HashType::Sha256 => hmac_compute!(Sha256, key, data),
            HashType::Sha384 => hmac_compute!(Sha384, key, data),
            HashType::Sha512 => hmac_compute!(Sha512, key, data),
        }
    }

    fn random_bytes(&self, buf: &mut [u8]) -> Result<(), CryptoError> {
        OsRng.try_fill_bytes(buf).map_err(|_| CryptoError::Entropy)
    }

    fn ecdsa_verify(
        &self,
        curve: CurveType,
        pubkey: &[u8],
        _hash_alg: HashType,
        digest: &[u8],
        signature: &[u8],
    ) -> Result<(), CryptoError> {
        match curve {
            CurveType::Secp256r1 => {
                let key = VerifyingKey::from_sec1_bytes(pubkey)
                    .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
                let signature = Signature::from_slice(signature)
                    .map_err(|_| CryptoError::BadSignature)?;
                key.verify_prehash(digest, &signature)
                    .map_err(|_| CryptoError::BadSignature)
            }
            other => Err(CryptoError::Unsupported(format!(
                "ECDSA verify for {:?}",
                other
            ))),
        }
    }

    fn aes_gcm_encrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; 12],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|_| CryptoError::Aead)
    }

    fn aes_gcm_decrypt(
        &self,
        key: &[u8; 32],
        nonce: &[u8; 12],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Aead)
    }

    fn kdf(
        &self,
        alg: HashType,
        secret: &[u8],
        info: &[u8],
        out: &mut [u8],
    ) -> Result<(), CryptoError> {
        match alg {
            HashType::Sha256 => hkdf_expand!(Sha256, secret, info, out),
            HashType::Sha384 => hkdf_expand!(Sha384, secret, info, out),
            HashType::Sha512 => hkdf_expand!(Sha512, secret, info, out),
        }
    }
}
