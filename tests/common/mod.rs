//! Shared helpers for integration tests: a signer set that can produce
//! complete signed trust lists and the registry that trusts it.

#![allow(dead_code)]

use iotrust::prelude::*;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};

/// A complete trust list in wire form
pub struct SignedList {
    pub header: TrustListHeader,
    pub keys: Vec<Vec<u8>>,
    pub footer: Vec<u8>,
}

/// The signing keys behind a deployment's required roles
pub struct SignerSet {
    signers: Vec<(SignerRole, SigningKey)>,
}

impl SignerSet {
    /// One signer per default required role
    pub fn new() -> Self {
        Self {
            signers: vec![
                (SignerRole::Auth, SigningKey::random(&mut rand::rngs::OsRng)),
                (
                    SignerRole::TrustList,
                    SigningKey::random(&mut rand::rngs::OsRng),
                ),
            ],
        }
    }

    /// Registry that authorizes exactly this signer set
    pub fn registry(&self) -> StaticSignerRegistry {
        let mut registry = StaticSignerRegistry::default();
        for (role, key) in &self.signers {
            registry.add(*role, CurveType::Secp256r1, Self::pubkey(key));
        }
        registry
    }

    /// Build and sign a list of `key_count` member keys
    pub fn build_list(&self, version: FileVersion, key_count: u8) -> SignedList {
        let keys: Vec<Vec<u8>> = (0..key_count)
            .map(|i| {
                KeyRecord {
                    start_date: 1000,
                    expire_date: 2000,
                    key_role: SignerRole::Firmware,
                    curve_type: CurveType::Secp256r1,
                    meta: vec![i],
                    pubkey: vec![0x04; 65],
                }
                .to_bytes()
            })
            .collect();

        let tl_type = 1u8;
        let signature_size = 3 + 64 + 65;
        let tl_size = TrustListHeader::WIRE_SIZE
            + keys.iter().map(Vec::len).sum::<usize>()
            + 1
            + self.signers.len() * signature_size;
        let header = TrustListHeader {
            tl_size: tl_size as u32,
            version,
            pub_keys_count: key_count as u16,
            signatures_count: self.signers.len() as u8,
        };

        let mut hasher = Sha256::new();
        hasher.update(header.to_bytes());
        for key in &keys {
            hasher.update(key);
        }
        hasher.update([tl_type]);
        let digest = hasher.finalize();

        let footer = TrustListFooter {
            tl_type,
            signatures: self
                .signers
                .iter()
                .map(|(role, key)| {
                    let signature: Signature = key.sign_prehash(&digest).unwrap();
                    SignatureEntry {
                        signer_role: *role,
                        curve_type: CurveType::Secp256r1,
                        hash_type: HashType::Sha256,
                        signature: signature.to_bytes().to_vec(),
                        signer_pubkey: Self::pubkey(key),
                    }
                })
                .collect(),
        };

        SignedList {
            header,
            keys,
            footer: footer.to_bytes(),
        }
    }

    fn pubkey(key: &SigningKey) -> Vec<u8> {
        key.verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }
}

/// Write a complete list into a tier through the staging discipline
pub fn stage(
    store: &TrustListStore,
    tier: Tier,
    list: &SignedList,
) -> Result<(), TrustListError> {
    store.header_save(tier, &list.header)?;
    for (index, key) in list.keys.iter().enumerate() {
        store.key_save(tier, index as u16, key)?;
    }
    store.footer_save(tier, &list.footer)
}
