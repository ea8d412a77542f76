//! Embedded secure-update toolkit: file delivery over FLDT and tiered,
//! signature-verified trust-list storage.
//!
//! The [`fldt`] module carries versioned artifacts between a gateway and its
//! clients; the [`trust_list`] module stores the lists of trusted public keys
//! those artifacts are verified against. Both sit on pluggable seams:
//! [`transport::Transport`] for the network, [`storage::StorageBackend`] for
//! persistence, and the `iotrust-crypto` security module for primitives.

pub mod error;
pub mod fldt;
pub mod prelude;
pub mod provision;
pub mod storage;
pub mod transport;
pub mod trust_list;
pub mod update;

pub use error::{FldtError, IotError, TrustListError};
pub use fldt::{FldtClient, FldtServer};
pub use provision::{SignerRegistry, StaticSignerRegistry, TrustListConfig, TrustedSigner};
pub use storage::{ElementId, FileStorage, MemoryStorage, StorageBackend, StorageError};
pub use transport::{QueueTransport, SentMessage, Transport, TransportError};
pub use trust_list::{Tier, TrustListStore, TrustListUpdater};
pub use update::{GotFileCallback, GotFileEvent, UpdateInterface};
