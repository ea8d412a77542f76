//! Trust-list store
//!
//! Owns the three tiers and enforces the write discipline: a header opens a
//! staging pass, keys must arrive in index order until the declared count is
//! met, and the footer closes the pass by verifying the whole list. Promotion
//! between tiers only ever copies a list that just verified.

use crate::error::TrustListError;
use crate::provision::{SignerRegistry, TrustListConfig};
use crate::storage::{read_blob, write_blob, StorageBackend};
use crate::trust_list::{element_id, RecordKind, Tier};
use iotrust_crypto::{HashOp, SecModule};
use iotrust_protocol::{
    HashType, KeyRecord, TrustListFooter, TrustListHeader, WireWrite,
};
use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Cached per-tier metadata; the records themselves live in storage
#[derive(Debug, Clone, Default)]
struct TierState {
    /// The tier holds a complete, verified list
    ready: bool,
    header: Option<TrustListHeader>,
    /// Keys written so far in the current staging pass
    keys_written: u16,
}

/// Tiered trust-list store
pub struct TrustListStore {
    backend: Arc<dyn StorageBackend>,
    secmodule: Arc<dyn SecModule>,
    signers: Arc<dyn SignerRegistry>,
    config: TrustListConfig,
    // Indexed by Tier::index(); lock order is Static, Dynamic, Tmp
    tiers: [RwLock<TierState>; 3],
}

impl TrustListStore {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        secmodule: Arc<dyn SecModule>,
        signers: Arc<dyn SignerRegistry>,
        config: TrustListConfig,
    ) -> Self {
        Self {
            backend,
            secmodule,
            signers,
            config,
            tiers: [
                RwLock::new(TierState::default()),
                RwLock::new(TierState::default()),
                RwLock::new(TierState::default()),
            ],
        }
    }

    pub fn config(&self) -> &TrustListConfig {
        &self.config
    }

    fn lock_write(&self, tier: Tier) -> Result<RwLockWriteGuard<'_, TierState>, TrustListError> {
        self.tiers[tier.index()]
            .write()
            .map_err(|_| TrustListError::Lock)
    }

    /// Bring the store to a serving state.
    ///
    /// The dynamic tier is verified first; if it fails, the static tier is
    /// verified and, when good, copied over the dynamic tier. Leftover
    /// staging from an interrupted download is discarded. Fails only when
    /// neither tier holds a verifiable list.
    pub fn init(&self) -> Result<(), TrustListError> {
        let mut static_state = self.lock_write(Tier::Static)?;
        let mut dynamic_state = self.lock_write(Tier::Dynamic)?;
        let mut tmp_state = self.lock_write(Tier::Tmp)?;

        self.invalidate_locked(Tier::Tmp, &mut tmp_state);

        match self.verify_locked(Tier::Dynamic, &mut dynamic_state) {
            Ok(()) => {
                info!(version = %dynamic_state.header.as_ref().map(|h| h.version.to_string()).unwrap_or_default(),
                      "Dynamic trust list verified");
                return Ok(());
            }
            Err(err) => {
                warn!(error = %err, "Dynamic trust list unusable, falling back to static");
            }
        }

        self.verify_locked(Tier::Static, &mut static_state)
            .map_err(|err| {
                warn!(error = %err, "Static trust list unusable, store not initialized");
                TrustListError::NotInitialized
            })?;

        self.invalidate_locked(Tier::Dynamic, &mut dynamic_state);
        self.copy_locked(Tier::Static, &static_state, Tier::Dynamic, &mut dynamic_state)?;
        self.verify_locked(Tier::Dynamic, &mut dynamic_state)?;
        info!("Static trust list restored into the dynamic tier");
        Ok(())
    }

    /// Release the store and its backend
    pub fn deinit(&self) -> Result<(), TrustListError> {
        self.backend.deinit()?;
        Ok(())
    }

    pub fn is_ready(&self, tier: Tier) -> bool {
        self.tiers[tier.index()]
            .read()
            .map(|state| state.ready)
            .unwrap_or(false)
    }

    /// Open a staging pass on `tier` with a fresh header.
    ///
    /// Any previous content of the tier is discarded.
    pub fn header_save(&self, tier: Tier, header: &TrustListHeader) -> Result<(), TrustListError> {
        if header.tl_size > self.config.storage_max_size {
            return Err(TrustListError::TooLarge {
                limit: self.config.storage_max_size,
            });
        }
        let mut state = self.lock_write(tier)?;
        self.invalidate_locked(tier, &mut state);
        write_blob(
            self.backend.as_ref(),
            &element_id(tier, RecordKind::Header, 0),
            &header.to_bytes(),
        )?;
        state.header = Some(*header);
        state.keys_written = 0;
        state.ready = false;
        debug!(tier = ?tier, version = %header.version, keys = header.pub_keys_count,
               "Trust list staging opened");
        Ok(())
    }

    pub fn header_load(&self, tier: Tier) -> Result<TrustListHeader, TrustListError> {
        let state = self.tiers[tier.index()]
            .read()
            .map_err(|_| TrustListError::Lock)?;
        if !state.ready {
            return Err(TrustListError::NotInitialized);
        }
        let bytes = read_blob(self.backend.as_ref(), &element_id(tier, RecordKind::Header, 0))?;
        TrustListHeader::decode(&bytes).map_err(|e| TrustListError::Malformed(e.to_string()))
    }

    /// Stage the key record at `index`.
    ///
    /// Keys must arrive in index order, and no key is accepted once the
    /// header's declared count has been met.
    pub fn key_save(&self, tier: Tier, index: u16, record: &[u8]) -> Result<(), TrustListError> {
        let mut state = self.lock_write(tier)?;
        let header = state.header.ok_or_else(|| {
            TrustListError::Malformed("Key received with no header staged".into())
        })?;
        if state.keys_written >= header.pub_keys_count {
            return Err(TrustListError::KeyCountExceeded);
        }
        if index != state.keys_written {
            return Err(TrustListError::Malformed(format!(
                "Key index {} out of order (expected {})",
                index, state.keys_written
            )));
        }
        KeyRecord::decode(record).map_err(|e| TrustListError::Malformed(e.to_string()))?;
        write_blob(
            self.backend.as_ref(),
            &element_id(tier, RecordKind::Key, index as u32),
            record,
        )?;
        state.keys_written += 1;
        Ok(())
    }

    /// Raw bytes of the key record at `index`
    pub fn key_load(&self, tier: Tier, index: u16) -> Result<Vec<u8>, TrustListError> {
        let state = self.tiers[tier.index()]
            .read()
            .map_err(|_| TrustListError::Lock)?;
        if !state.ready {
            return Err(TrustListError::NotInitialized);
        }
        if index >= state.keys_written {
            return Err(TrustListError::NotFound);
        }
        let bytes = read_blob(
            self.backend.as_ref(),
            &element_id(tier, RecordKind::Key, index as u32),
        )?;
        Ok(bytes)
    }

    /// Close the staging pass: store the footer and verify the whole tier.
    ///
    /// Requires every declared key to have been staged. On success the tier
    /// becomes ready.
    pub fn footer_save(&self, tier: Tier, footer: &[u8]) -> Result<(), TrustListError> {
        let mut state = self.lock_write(tier)?;
        let header = state.header.ok_or_else(|| {
            TrustListError::Malformed("Footer received with no header staged".into())
        })?;
        if state.keys_written != header.pub_keys_count {
            return Err(TrustListError::KeysIncomplete {
                written: state.keys_written,
                declared: header.pub_keys_count,
            });
        }
        TrustListFooter::decode(footer, header.signatures_count)
            .map_err(|e| TrustListError::Malformed(e.to_string()))?;
        write_blob(
            self.backend.as_ref(),
            &element_id(tier, RecordKind::Footer, 0),
            footer,
        )?;
        self.verify_locked(tier, &mut state)
    }

    pub fn footer_load(&self, tier: Tier) -> Result<Vec<u8>, TrustListError> {
        let state = self.tiers[tier.index()]
            .read()
            .map_err(|_| TrustListError::Lock)?;
        if !state.ready {
            return Err(TrustListError::NotInitialized);
        }
        let bytes = read_blob(self.backend.as_ref(), &element_id(tier, RecordKind::Footer, 0))?;
        Ok(bytes)
    }

    /// Re-verify a tier against storage
    pub fn verify(&self, tier: Tier) -> Result<(), TrustListError> {
        let mut state = self.lock_write(tier)?;
        self.verify_locked(tier, &mut state)
    }

    /// Verify the staging tier and promote it over `target`.
    ///
    /// `target` is untouched unless the staging tier verifies.
    pub fn apply_tmp_to(&self, target: Tier) -> Result<(), TrustListError> {
        debug_assert!(target != Tier::Tmp);
        // Lock order Static < Dynamic < Tmp; target always precedes Tmp
        let mut target_state = self.lock_write(target)?;
        let mut tmp_state = self.lock_write(Tier::Tmp)?;

        self.verify_locked(Tier::Tmp, &mut tmp_state)?;
        self.invalidate_locked(target, &mut target_state);
        self.copy_locked(Tier::Tmp, &tmp_state, target, &mut target_state)?;
        if let Some(header) = target_state.header.as_ref() {
            info!(tier = ?target, version = %header.version, "Trust list promoted");
        }
        Ok(())
    }

    /// Discard the tier's content
    pub fn invalidate(&self, tier: Tier) -> Result<(), TrustListError> {
        let mut state = self.lock_write(tier)?;
        self.invalidate_locked(tier, &mut state);
        Ok(())
    }

    fn invalidate_locked(&self, tier: Tier, state: &mut TierState) {
        // After a restart the cached header is gone; recover the key count
        // from storage so stale key blobs do not linger.
        let key_count = state
            .header
            .map(|h| h.pub_keys_count)
            .or_else(|| {
                read_blob(self.backend.as_ref(), &element_id(tier, RecordKind::Header, 0))
                    .ok()
                    .and_then(|bytes| TrustListHeader::decode(&bytes).ok())
                    .map(|h| h.pub_keys_count)
            })
            .unwrap_or(0);
        for index in 0..key_count {
            let _ = self
                .backend
                .delete(&element_id(tier, RecordKind::Key, index as u32));
        }
        let _ = self.backend.delete(&element_id(tier, RecordKind::Header, 0));
        let _ = self.backend.delete(&element_id(tier, RecordKind::Footer, 0));
        *state = TierState::default();
    }

    fn copy_locked(
        &self,
        from: Tier,
        from_state: &TierState,
        to: Tier,
        to_state: &mut TierState,
    ) -> Result<(), TrustListError> {
        let header = from_state.header.ok_or(TrustListError::NotInitialized)?;
        let header_bytes = read_blob(self.backend.as_ref(), &element_id(from, RecordKind::Header, 0))?;
        write_blob(
            self.backend.as_ref(),
            &element_id(to, RecordKind::Header, 0),
            &header_bytes,
        )?;
        for index in 0..header.pub_keys_count {
            let key = read_blob(
                self.backend.as_ref(),
                &element_id(from, RecordKind::Key, index as u32),
            )?;
            write_blob(
                self.backend.as_ref(),
                &element_id(to, RecordKind::Key, index as u32),
                &key,
            )?;
        }
        let footer = read_blob(self.backend.as_ref(), &element_id(from, RecordKind::Footer, 0))?;
        write_blob(
            self.backend.as_ref(),
            &element_id(to, RecordKind::Footer, 0),
            &footer,
        )?;
        *to_state = from_state.clone();
        Ok(())
    }

    /// Full verification of one tier against storage.
    ///
    /// Every record must decode, the declared total size must match, every
    /// signature must come from an authorized signer and verify over the
    /// list digest, and every required role must be among the signers. On
    /// success the tier state is refreshed and marked ready.
    fn verify_locked(&self, tier: Tier, state: &mut TierState) -> Result<(), TrustListError> {
        // The flag tracks the outcome of the last full verification; a tier
        // stays unready through every failure path below.
        state.ready = false;
        let header_bytes = read_blob(self.backend.as_ref(), &element_id(tier, RecordKind::Header, 0))?;
        let header = TrustListHeader::decode(&header_bytes)
            .map_err(|e| TrustListError::Malformed(e.to_string()))?;
        if header.tl_size > self.config.storage_max_size {
            return Err(TrustListError::TooLarge {
                limit: self.config.storage_max_size,
            });
        }

        let footer_bytes = read_blob(self.backend.as_ref(), &element_id(tier, RecordKind::Footer, 0))?;
        let footer = TrustListFooter::decode(&footer_bytes, header.signatures_count)
            .map_err(|e| TrustListError::Malformed(e.to_string()))?;

        if (footer.signatures.len()) < self.config.required_count() {
            warn!(tier = ?tier, have = footer.signatures.len(),
                  need = self.config.required_count(),
                  "Trust list carries too few signatures");
            return Err(TrustListError::Verify);
        }

        // The digest covers the header, every key record in index order and
        // the footer's type byte. One streaming hash per hash algorithm the
        // signature chain uses.
        let mut hashes: Vec<(HashType, Box<dyn HashOp>)> = Vec::new();
        for signature in &footer.signatures {
            if !hashes.iter().any(|(alg, _)| *alg == signature.hash_type) {
                hashes.push((signature.hash_type, self.secmodule.hash_begin(signature.hash_type)?));
            }
        }
        for (_, op) in &mut hashes {
            op.update(&header_bytes);
        }

        let mut total_size = header_bytes.len() + footer_bytes.len();
        for index in 0..header.pub_keys_count {
            let key_bytes = read_blob(
                self.backend.as_ref(),
                &element_id(tier, RecordKind::Key, index as u32),
            )?;
            KeyRecord::decode(&key_bytes).map_err(|e| TrustListError::Malformed(e.to_string()))?;
            total_size += key_bytes.len();
            for (_, op) in &mut hashes {
                op.update(&key_bytes);
            }
        }
        for (_, op) in &mut hashes {
            op.update(&footer_bytes[..1]);
        }
        if total_size != header.tl_size as usize {
            return Err(TrustListError::Malformed(format!(
                "Declared size {} does not match stored records ({} bytes)",
                header.tl_size, total_size
            )));
        }

        let digests: Vec<(HashType, Vec<u8>)> = hashes
            .into_iter()
            .map(|(alg, op)| (alg, op.finish()))
            .collect();

        let mut matched_roles = HashSet::new();
        for signature in &footer.signatures {
            if !self.signers.is_authorized(
                signature.signer_role,
                signature.curve_type,
                &signature.signer_pubkey,
            ) {
                warn!(tier = ?tier, role = ?signature.signer_role,
                      "Trust list signed by an unauthorized key");
                return Err(TrustListError::Verify);
            }
            let digest = digests
                .iter()
                .find(|(alg, _)| *alg == signature.hash_type)
                .map(|(_, digest)| digest.as_slice())
                .unwrap_or_default();
            self.secmodule
                .ecdsa_verify(
                    signature.curve_type,
                    &signature.signer_pubkey,
                    signature.hash_type,
                    digest,
                    &signature.signature,
                )
                .map_err(|err| {
                    warn!(tier = ?tier, role = ?signature.signer_role, error = %err,
                          "Trust list signature rejected");
                    TrustListError::Verify
                })?;
            if self.config.is_required_role(signature.signer_role) {
                matched_roles.insert(signature.signer_role);
            }
        }
        if matched_roles.len() < self.config.required_count() {
            warn!(tier = ?tier, matched = matched_roles.len(),
                  need = self.config.required_count(),
                  "Trust list is missing required signer roles");
            return Err(TrustListError::Verify);
        }

        state.header = Some(header);
        state.keys_written = header.pub_keys_count;
        state.ready = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::StaticSignerRegistry;
    use crate::storage::MemoryStorage;
    use iotrust_crypto::SoftwareSecModule;
    use iotrust_protocol::{CurveType, FileVersion, SignatureEntry, SignerRole};
    use p256::ecdsa::signature::hazmat::PrehashSigner;
    use p256::ecdsa::{Signature, SigningKey};
    use sha2::{Digest, Sha256};

    struct Signer {
        role: SignerRole,
        key: SigningKey,
    }

    impl Signer {
        fn new(role: SignerRole) -> Self {
            Self {
                role,
                key: SigningKey::random(&mut rand::rngs::OsRng),
            }
        }

        fn pubkey(&self) -> Vec<u8> {
            self.key
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec()
        }

        fn sign(&self, digest: &[u8]) -> SignatureEntry {
            let signature: Signature = self.key.sign_prehash(digest).unwrap();
            SignatureEntry {
                signer_role: self.role,
                curve_type: CurveType::Secp256r1,
                hash_type: HashType::Sha256,
                signature: signature.to_bytes().to_vec(),
                signer_pubkey: self.pubkey(),
            }
        }
    }

    fn member_key(tag: u8) -> KeyRecord {
        KeyRecord {
            start_date: 1000,
            expire_date: 2000,
            key_role: SignerRole::Firmware,
            curve_type: CurveType::Secp256r1,
            meta: vec![tag],
            pubkey: vec![0x04; 65],
        }
    }

    /// A complete signed list in wire form
    struct SignedList {
        header: TrustListHeader,
        keys: Vec<Vec<u8>>,
        footer: Vec<u8>,
    }

    /// Builds a signed list plus the registry that trusts its signers
    fn build_list(version: FileVersion, key_count: u8) -> (SignedList, StaticSignerRegistry) {
        let signers = vec![Signer::new(SignerRole::Auth), Signer::new(SignerRole::TrustList)];
        let keys: Vec<Vec<u8>> = (0..key_count).map(|i| member_key(i).to_bytes()).collect();

        let footer_type = 1u8;
        let signature_size = SignatureEntry {
            signer_role: SignerRole::Auth,
            curve_type: CurveType::Secp256r1,
            hash_type: HashType::Sha256,
            signature: vec![0; 64],
            signer_pubkey: vec![0; 65],
        }
        .serialized_size();
        let footer_size = 1 + signers.len() * signature_size;
        let tl_size = TrustListHeader::WIRE_SIZE
            + keys.iter().map(Vec::len).sum::<usize>()
            + footer_size;

        let header = TrustListHeader {
            tl_size: tl_size as u32,
            version,
            pub_keys_count: key_count as u16,
            signatures_count: signers.len() as u8,
        };

        let mut hasher = Sha256::new();
        hasher.update(header.to_bytes());
        for key in &keys {
            hasher.update(key);
        }
        hasher.update([footer_type]);
        let digest = hasher.finalize();

        let footer = TrustListFooter {
            tl_type: footer_type,
            signatures: signers.iter().map(|s| s.sign(&digest)).collect(),
        };

        let mut registry = StaticSignerRegistry::default();
        for signer in &signers {
            registry.add(signer.role, CurveType::Secp256r1, signer.pubkey());
        }

        (
            SignedList {
                header,
                keys,
                footer: footer.to_bytes(),
            },
            registry,
        )
    }

    fn store_with(registry: StaticSignerRegistry) -> TrustListStore {
        TrustListStore::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(SoftwareSecModule::new()),
            Arc::new(registry),
            TrustListConfig::default(),
        )
    }

    fn stage(store: &TrustListStore, tier: Tier, list: &SignedList) -> Result<(), TrustListError> {
        store.header_save(tier, &list.header)?;
        for (index, key) in list.keys.iter().enumerate() {
            store.key_save(tier, index as u16, key)?;
        }
        store.footer_save(tier, &list.footer)
    }

    #[test]
    fn test_stage_verify_and_promote() {
        let (list, registry) = build_list(FileVersion::new(1, 0, 0, 1), 3);
        let store = store_with(registry);

        stage(&store, Tier::Tmp, &list).unwrap();
        assert!(store.is_ready(Tier::Tmp));
        assert!(!store.is_ready(Tier::Dynamic));

        store.apply_tmp_to(Tier::Dynamic).unwrap();
        assert!(store.is_ready(Tier::Dynamic));

        let header = store.header_load(Tier::Dynamic).unwrap();
        assert_eq!(header.pub_keys_count, 3);
        assert_eq!(store.key_load(Tier::Dynamic, 2).unwrap(), list.keys[2]);
        assert_eq!(store.footer_load(Tier::Dynamic).unwrap(), list.footer);
    }

    #[test]
    fn test_write_discipline() {
        let (list, registry) = build_list(FileVersion::new(1, 0, 0, 1), 2);
        let store = store_with(registry);

        // Footer before any key
        store.header_save(Tier::Tmp, &list.header).unwrap();
        assert!(matches!(
            store.footer_save(Tier::Tmp, &list.footer),
            Err(TrustListError::KeysIncomplete { written: 0, declared: 2 })
        ));

        // Out-of-order key
        assert!(store.key_save(Tier::Tmp, 1, &list.keys[1]).is_err());

        store.key_save(Tier::Tmp, 0, &list.keys[0]).unwrap();
        store.key_save(Tier::Tmp, 1, &list.keys[1]).unwrap();

        // One key past the declared count
        assert!(matches!(
            store.key_save(Tier::Tmp, 2, &list.keys[0]),
            Err(TrustListError::KeyCountExceeded)
        ));

        store.footer_save(Tier::Tmp, &list.footer).unwrap();
    }

    #[test]
    fn test_tampered_key_fails_verify_and_target_survives() {
        let (good, registry) = build_list(FileVersion::new(1, 0, 0, 1), 2);
        let store = store_with(registry);

        stage(&store, Tier::Tmp, &good).unwrap();
        store.apply_tmp_to(Tier::Dynamic).unwrap();

        // Stage again with one key bit-flipped; the footer no longer matches
        store.header_save(Tier::Tmp, &good.header).unwrap();
        let mut bad_key = good.keys[0].clone();
        let last = bad_key.len() - 1;
        bad_key[last] ^= 0x01;
        store.key_save(Tier::Tmp, 0, &bad_key).unwrap();
        store.key_save(Tier::Tmp, 1, &good.keys[1]).unwrap();
        assert!(matches!(
            store.footer_save(Tier::Tmp, &good.footer),
            Err(TrustListError::Verify)
        ));

        assert!(matches!(
            store.apply_tmp_to(Tier::Dynamic),
            Err(TrustListError::Verify)
        ));
        // The dynamic tier still serves the earlier good list
        assert!(store.is_ready(Tier::Dynamic));
        assert_eq!(store.key_load(Tier::Dynamic, 0).unwrap(), good.keys[0]);
    }

    #[test]
    fn test_unauthorized_signer_rejected() {
        let (list, _their_registry) = build_list(FileVersion::new(1, 0, 0, 1), 1);
        // Empty registry: the signatures are valid but nobody trusts the keys
        let store = store_with(StaticSignerRegistry::default());
        assert!(matches!(
            stage(&store, Tier::Tmp, &list),
            Err(TrustListError::Verify)
        ));
    }

    #[test]
    fn test_duplicate_role_cannot_stand_in_for_missing_one() {
        // Two signatures, both from the same Auth signer
        let auth = Signer::new(SignerRole::Auth);
        let key_bytes = member_key(0).to_bytes();
        let footer_type = 1u8;

        let one_signature = auth.sign(&[0u8; 32]).serialized_size();
        let tl_size = TrustListHeader::WIRE_SIZE + key_bytes.len() + 1 + 2 * one_signature;
        let header = TrustListHeader {
            tl_size: tl_size as u32,
            version: FileVersion::new(1, 0, 0, 1),
            pub_keys_count: 1,
            signatures_count: 2,
        };

        let mut hasher = Sha256::new();
        hasher.update(header.to_bytes());
        hasher.update(&key_bytes);
        hasher.update([footer_type]);
        let digest = hasher.finalize();

        let footer = TrustListFooter {
            tl_type: footer_type,
            signatures: vec![auth.sign(&digest), auth.sign(&digest)],
        };

        let mut registry = StaticSignerRegistry::default();
        registry.add(SignerRole::Auth, CurveType::Secp256r1, auth.pubkey());
        let store = store_with(registry);

        store.header_save(Tier::Tmp, &header).unwrap();
        store.key_save(Tier::Tmp, 0, &key_bytes).unwrap();
        assert!(matches!(
            store.footer_save(Tier::Tmp, &footer.to_bytes()),
            Err(TrustListError::Verify)
        ));
    }

    #[test]
    fn test_failed_reverify_clears_ready() {
        let (list, registry) = build_list(FileVersion::new(1, 0, 0, 1), 2);
        let backend = Arc::new(MemoryStorage::new());
        let store = TrustListStore::new(
            Arc::clone(&backend) as Arc<dyn StorageBackend>,
            Arc::new(SoftwareSecModule::new()),
            Arc::new(registry),
            TrustListConfig::default(),
        );
        stage(&store, Tier::Dynamic, &list).unwrap();
        assert!(store.is_ready(Tier::Dynamic));

        // Corrupt one stored key behind the store's back
        let mut bad = list.keys[0].clone();
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        write_blob(
            backend.as_ref(),
            &element_id(Tier::Dynamic, RecordKind::Key, 0),
            &bad,
        )
        .unwrap();

        assert!(store.verify(Tier::Dynamic).is_err());
        assert!(!store.is_ready(Tier::Dynamic));
        // Readers stop serving the corrupted records
        assert!(matches!(
            store.header_load(Tier::Dynamic),
            Err(TrustListError::NotInitialized)
        ));
        assert!(matches!(
            store.key_load(Tier::Dynamic, 0),
            Err(TrustListError::NotInitialized)
        ));
    }

    #[test]
    fn test_init_falls_back_to_static() {
        let (list, registry) = build_list(FileVersion::new(1, 0, 0, 1), 2);
        let store = store_with(registry);

        // Factory provisioning writes the static tier only
        stage(&store, Tier::Static, &list).unwrap();

        store.init().unwrap();
        assert!(store.is_ready(Tier::Dynamic));
        assert_eq!(store.header_load(Tier::Dynamic).unwrap(), list.header);
    }

    #[test]
    fn test_init_with_nothing_provisioned_fails() {
        let store = store_with(StaticSignerRegistry::default());
        assert!(matches!(store.init(), Err(TrustListError::NotInitialized)));
    }

    #[test]
    fn test_oversized_header_rejected() {
        let store = store_with(StaticSignerRegistry::default());
        let header = TrustListHeader {
            tl_size: store.config().storage_max_size + 1,
            version: FileVersion::new(1, 0, 0, 1),
            pub_keys_count: 1,
            signatures_count: 1,
        };
        assert!(matches!(
            store.header_save(Tier::Tmp, &header),
            Err(TrustListError::TooLarge { .. })
        ));
    }
}
