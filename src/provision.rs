//! Signer registry and verification policy
//!
//! Whether a public key is a legitimate signer for an artifact class is
//! provisioning's call, not the storage engine's. The engine asks through
//! [`SignerRegistry`]; devices typically back it with the keys burned in at
//! factory provisioning.

use iotrust_protocol::{CurveType, SignerRole};
use serde::{Deserialize, Serialize};

/// Resolves (role, curve, raw public key) to "is this signer legitimate"
pub trait SignerRegistry: Send + Sync {
    fn is_authorized(&self, role: SignerRole, curve: CurveType, pubkey: &[u8]) -> bool;
}

/// One provisioned signer identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedSigner {
    pub role: SignerRole,
    pub curve: CurveType,
    pub pubkey: Vec<u8>,
}

/// Registry backed by a fixed provisioned key set
#[derive(Debug, Default)]
pub struct StaticSignerRegistry {
    signers: Vec<TrustedSigner>,
}

impl StaticSignerRegistry {
    pub fn new(signers: Vec<TrustedSigner>) -> Self {
        Self { signers }
    }

    pub fn add(&mut self, role: SignerRole, curve: CurveType, pubkey: Vec<u8>) {
        self.signers.push(TrustedSigner { role, curve, pubkey });
    }
}

impl SignerRegistry for StaticSignerRegistry {
    fn is_authorized(&self, role: SignerRole, curve: CurveType, pubkey: &[u8]) -> bool {
        self.signers
            .iter()
            .any(|s| s.role == role && s.curve == curve && s.pubkey == pubkey)
    }
}

/// Trust-list verification policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustListConfig {
    /// Largest accepted trust list (header + keys + footer)
    pub storage_max_size: u32,
    /// Roles whose signatures must all be present and valid.
    ///
    /// `required_count` is the length of this list; duplicate signatures by
    /// one role cannot substitute for a missing role.
    pub required_roles: Vec<SignerRole>,
}

impl Default for TrustListConfig {
    fn default() -> Self {
        Self {
            storage_max_size: 10 * 1024,
            required_roles: vec![SignerRole::Auth, SignerRole::TrustList],
        }
    }
}

impl TrustListConfig {
    pub fn required_count(&self) -> usize {
        self.required_roles.len()
    }

    pub fn is_required_role(&self, role: SignerRole) -> bool {
        self.required_roles.contains(&role)
    }
}
