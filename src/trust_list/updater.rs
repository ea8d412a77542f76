//! Trust-list update interface
//!
//! Bridges the tiered store onto the generic update capability the transfer
//! engine drives. Offsets are key indices, not bytes: each data chunk carries
//! exactly one key record, and the reported file size is the key count.

use crate::error::{IotError, TrustListError};
use crate::trust_list::{Tier, TrustListStore};
use crate::update::UpdateInterface;
use iotrust_protocol::{FileType, FileVersion, TrustListHeader, WireWrite};
use std::sync::Arc;
use tracing::{info, warn};

/// [`UpdateInterface`] implementation for trust lists
pub struct TrustListUpdater {
    store: Arc<TrustListStore>,
}

impl TrustListUpdater {
    pub fn new(store: Arc<TrustListStore>) -> Self {
        Self { store }
    }

    /// Offsets travel as u32 on the wire but index u16 key slots; anything
    /// past the u16 range must never alias onto a small index.
    fn key_index(offset: usize) -> Result<u16, TrustListError> {
        u16::try_from(offset)
            .map_err(|_| TrustListError::Malformed(format!("Key offset {} out of range", offset)))
    }

    /// Stage the footer and promote the staged list.
    ///
    /// The dynamic tier takes the new list first; if the static tier no
    /// longer verifies, the new list also replaces it, restoring the
    /// fallback path.
    fn commit(&self, footer: &[u8]) -> Result<(), TrustListError> {
        self.store.footer_save(Tier::Tmp, footer)?;
        self.store.apply_tmp_to(Tier::Dynamic)?;
        if self.store.verify(Tier::Static).is_err() {
            warn!("Static trust list no longer verifies, replacing it");
            self.store.apply_tmp_to(Tier::Static)?;
        }
        Ok(())
    }
}

impl UpdateInterface for TrustListUpdater {
    fn get_header_size(&self, _file_type: &FileType) -> Result<usize, IotError> {
        Ok(TrustListHeader::WIRE_SIZE)
    }

    fn get_header(&self, _file_type: &FileType) -> Result<Vec<u8>, IotError> {
        let header = self.store.header_load(Tier::Dynamic)?;
        Ok(header.to_bytes())
    }

    fn get_version(&self, _file_type: &FileType) -> Result<FileVersion, IotError> {
        Ok(self.store.header_load(Tier::Dynamic)?.version)
    }

    fn get_file_size(&self, _file_type: &FileType, header: &[u8]) -> Result<usize, IotError> {
        let header = TrustListHeader::decode(header)
            .map_err(|e| TrustListError::Malformed(e.to_string()))?;
        Ok(header.pub_keys_count as usize)
    }

    fn has_footer(&self, _file_type: &FileType) -> Result<bool, IotError> {
        Ok(true)
    }

    fn get_data(
        &self,
        _file_type: &FileType,
        _header: &[u8],
        offset: usize,
        max_len: usize,
    ) -> Result<Vec<u8>, IotError> {
        let record = self.store.key_load(Tier::Dynamic, Self::key_index(offset)?)?;
        if record.len() > max_len {
            return Err(TrustListError::Malformed(format!(
                "Key record of {} bytes does not fit a {} byte chunk",
                record.len(),
                max_len
            ))
            .into());
        }
        Ok(record)
    }

    fn inc_data_offset(
        &self,
        _file_type: &FileType,
        offset: usize,
        _loaded_size: usize,
    ) -> Result<usize, IotError> {
        // One key record per chunk
        Ok(offset + 1)
    }

    fn get_footer(&self, _file_type: &FileType, _header: &[u8]) -> Result<Vec<u8>, IotError> {
        Ok(self.store.footer_load(Tier::Dynamic)?)
    }

    fn set_header(&self, _file_type: &FileType, header: &[u8]) -> Result<usize, IotError> {
        let header = TrustListHeader::decode(header)
            .map_err(|e| TrustListError::Malformed(e.to_string()))?;
        self.store.header_save(Tier::Tmp, &header)?;
        Ok(header.pub_keys_count as usize)
    }

    fn set_data(
        &self,
        _file_type: &FileType,
        _header: &[u8],
        data: &[u8],
        offset: usize,
    ) -> Result<(), IotError> {
        self.store.key_save(Tier::Tmp, Self::key_index(offset)?, data)?;
        Ok(())
    }

    fn set_footer(
        &self,
        _file_type: &FileType,
        _header: &[u8],
        footer: &[u8],
    ) -> Result<(), IotError> {
        let result = self.commit(footer);
        // The staging tier never outlives the attempt, good or bad
        if let Err(err) = self.store.invalidate(Tier::Tmp) {
            warn!(error = %err, "Failed to clear the staging tier");
        }
        if result.is_ok() {
            info!("Trust list update committed");
        }
        result.map_err(IotError::from)
    }

    fn delete_object(&self, _file_type: &FileType) -> Result<(), IotError> {
        self.store.invalidate(Tier::Tmp)?;
        Ok(())
    }

    fn describe_type(&self, _file_type: &FileType) -> String {
        "trust list".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provision::{StaticSignerRegistry, TrustListConfig};
    use crate::storage::MemoryStorage;
    use iotrust_crypto::SoftwareSecModule;
    use iotrust_protocol::{
        CurveType, HashType, KeyRecord, SignatureEntry, SignerRole, TrustListFooter,
    };
    use p256::ecdsa::signature::hazmat::PrehashSigner;
    use p256::ecdsa::{Signature, SigningKey};
    use sha2::{Digest, Sha256};

    fn signed_list(
        version: FileVersion,
        key_count: u8,
    ) -> (TrustListHeader, Vec<Vec<u8>>, Vec<u8>, StaticSignerRegistry) {
        let auth = SigningKey::random(&mut rand::rngs::OsRng);
        let tl = SigningKey::random(&mut rand::rngs::OsRng);
        let pubkey = |key: &SigningKey| {
            key.verifying_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec()
        };

        let keys: Vec<Vec<u8>> = (0..key_count)
            .map(|i| {
                KeyRecord {
                    start_date: 1,
                    expire_date: 2,
                    key_role: SignerRole::Firmware,
                    curve_type: CurveType::Secp256r1,
                    meta: vec![i],
                    pubkey: vec![0x04; 65],
                }
                .to_bytes()
            })
            .collect();

        let signature_size = 3 + 64 + 65;
        let tl_size = TrustListHeader::WIRE_SIZE
            + keys.iter().map(Vec::len).sum::<usize>()
            + 1
            + 2 * signature_size;
        let header = TrustListHeader {
            tl_size: tl_size as u32,
            version,
            pub_keys_count: key_count as u16,
            signatures_count: 2,
        };

        let mut hasher = Sha256::new();
        hasher.update(header.to_bytes());
        for key in &keys {
            hasher.update(key);
        }
        hasher.update([1u8]);
        let digest = hasher.finalize();

        let sign = |key: &SigningKey, role: SignerRole| {
            let signature: Signature = key.sign_prehash(&digest).unwrap();
            SignatureEntry {
                signer_role: role,
                curve_type: CurveType::Secp256r1,
                hash_type: HashType::Sha256,
                signature: signature.to_bytes().to_vec(),
                signer_pubkey: pubkey(key),
            }
        };
        let footer = TrustListFooter {
            tl_type: 1,
            signatures: vec![sign(&auth, SignerRole::Auth), sign(&tl, SignerRole::TrustList)],
        };

        let mut registry = StaticSignerRegistry::default();
        registry.add(SignerRole::Auth, CurveType::Secp256r1, pubkey(&auth));
        registry.add(SignerRole::TrustList, CurveType::Secp256r1, pubkey(&tl));

        (header, keys, footer.to_bytes(), registry)
    }

    fn updater_with(registry: StaticSignerRegistry) -> (TrustListUpdater, Arc<TrustListStore>) {
        let store = Arc::new(TrustListStore::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(SoftwareSecModule::new()),
            Arc::new(registry),
            TrustListConfig::default(),
        ));
        (TrustListUpdater::new(Arc::clone(&store)), store)
    }

    fn apply_update(
        updater: &TrustListUpdater,
        header: &TrustListHeader,
        keys: &[Vec<u8>],
        footer: &[u8],
    ) -> Result<(), IotError> {
        let file_type = FileType::trust_list();
        let header_bytes = header.to_bytes();
        let size = updater.set_header(&file_type, &header_bytes)?;
        assert_eq!(size, keys.len());
        for (index, key) in keys.iter().enumerate() {
            updater.set_data(&file_type, &header_bytes, key, index)?;
        }
        updater.set_footer(&file_type, &header_bytes, footer)
    }

    #[test]
    fn test_update_lands_in_dynamic_and_serves_reads() {
        let (header, keys, footer, registry) = signed_list(FileVersion::new(1, 0, 0, 5), 3);
        let (updater, store) = updater_with(registry);

        apply_update(&updater, &header, &keys, &footer).unwrap();

        let file_type = FileType::trust_list();
        assert_eq!(updater.get_version(&file_type).unwrap(), header.version);
        let header_bytes = updater.get_header(&file_type).unwrap();
        assert_eq!(updater.get_file_size(&file_type, &header_bytes).unwrap(), 3);
        assert_eq!(
            updater.get_data(&file_type, &header_bytes, 1, 4096).unwrap(),
            keys[1]
        );
        assert_eq!(
            updater.inc_data_offset(&file_type, 1, keys[1].len()).unwrap(),
            2
        );
        assert_eq!(updater.get_footer(&file_type, &header_bytes).unwrap(), footer);

        // Staging tier is always cleared after a commit
        assert!(!store.is_ready(Tier::Tmp));
    }

    #[test]
    fn test_update_heals_broken_static_tier() {
        let (header, keys, footer, registry) = signed_list(FileVersion::new(2, 0, 0, 9), 2);
        let (updater, store) = updater_with(registry);

        // Static tier is empty and cannot verify, so the commit replaces it
        apply_update(&updater, &header, &keys, &footer).unwrap();
        assert!(store.is_ready(Tier::Static));
        assert_eq!(store.header_load(Tier::Static).unwrap(), header);
    }

    #[test]
    fn test_failed_commit_clears_staging() {
        let (header, keys, footer, registry) = signed_list(FileVersion::new(1, 0, 0, 1), 2);
        let (updater, store) = updater_with(registry);

        let file_type = FileType::trust_list();
        let header_bytes = header.to_bytes();
        updater.set_header(&file_type, &header_bytes).unwrap();
        let mut bad = keys[0].clone();
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        updater.set_data(&file_type, &header_bytes, &bad, 0).unwrap();
        updater.set_data(&file_type, &header_bytes, &keys[1], 1).unwrap();
        assert!(updater.set_footer(&file_type, &header_bytes, &footer).is_err());

        assert!(!store.is_ready(Tier::Tmp));
        assert!(!store.is_ready(Tier::Dynamic));
    }

    #[test]
    fn test_out_of_range_offset_never_aliases_a_key_index() {
        let (header, keys, footer, registry) = signed_list(FileVersion::new(1, 0, 0, 1), 1);
        let (updater, _store) = updater_with(registry);
        apply_update(&updater, &header, &keys, &footer).unwrap();

        let file_type = FileType::trust_list();
        let header_bytes = header.to_bytes();
        // 1 << 16 would wrap to index 0 under a bare cast
        assert!(updater
            .get_data(&file_type, &header_bytes, 1 << 16, 4096)
            .is_err());

        updater.set_header(&file_type, &header_bytes).unwrap();
        assert!(updater
            .set_data(&file_type, &header_bytes, &keys[0], 1 << 16)
            .is_err());
        // The slot the bad offset would have aliased is still writable
        updater.set_data(&file_type, &header_bytes, &keys[0], 0).unwrap();
    }

    #[test]
    fn test_delete_object_discards_staging() {
        let (header, keys, _, registry) = signed_list(FileVersion::new(1, 0, 0, 1), 2);
        let (updater, _store) = updater_with(registry);

        let file_type = FileType::trust_list();
        let header_bytes = header.to_bytes();
        updater.set_header(&file_type, &header_bytes).unwrap();
        updater.set_data(&file_type, &header_bytes, &keys[0], 0).unwrap();

        updater.delete_object(&file_type).unwrap();
        // A fresh pass starts from key zero again
        updater.set_header(&file_type, &header_bytes).unwrap();
        updater.set_data(&file_type, &header_bytes, &keys[0], 0).unwrap();
    }
}
