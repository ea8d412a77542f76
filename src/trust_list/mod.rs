//! Tiered trust-list storage
//!
//! Three tiers hold complete trust lists: [`Tier::Static`] is the factory
//! fallback, [`Tier::Dynamic`] is the operational source of truth, and
//! [`Tier::Tmp`] stages incoming downloads. A list only ever moves between
//! tiers after its signature chain verifies, so a half-written or tampered
//! download can never shadow a good list.

mod store;
mod updater;

pub use store::TrustListStore;
pub use updater::TrustListUpdater;

use crate::storage::{ElementId, ELEMENT_ID_LEN};

/// Trust-list storage tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tier {
    /// Factory-provisioned fallback, normally read-only
    Static = 1,
    /// Operational list all reads are served from
    Dynamic = 2,
    /// Staging area for a download in flight
    Tmp = 3,
}

impl Tier {
    pub(crate) fn index(self) -> usize {
        self as usize - 1
    }
}

/// Record class within a tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum RecordKind {
    Header = 1,
    Key = 2,
    Footer = 3,
}

/// Blob identifier for one record of one tier.
///
/// Layout: tier tag, record kind, four index bytes (big-endian, zero for
/// header and footer), zero padding to the fixed id size.
pub(crate) fn element_id(tier: Tier, kind: RecordKind, index: u32) -> ElementId {
    let mut bytes = [0u8; ELEMENT_ID_LEN];
    bytes[0] = tier as u8;
    bytes[1] = kind as u8;
    bytes[2..6].copy_from_slice(&index.to_be_bytes());
    ElementId(bytes)
}
