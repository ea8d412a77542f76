//! Convenience imports for toolkit integrators
//!
//! # Example
//!
//! ```rust,no_run
//! use iotrust::prelude::*;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), IotError> {
//! let storage = Arc::new(MemoryStorage::new());
//! let store = Arc::new(TrustListStore::new(
//!     storage,
//!     Arc::new(SoftwareSecModule::new()),
//!     Arc::new(StaticSignerRegistry::default()),
//!     TrustListConfig::default(),
//! ));
//! store.init()?;
//! # Ok(())
//! # }
//! ```

pub use crate::error::{FldtError, IotError, TrustListError};
pub use crate::fldt::{FldtClient, FldtServer, MAX_FILE_TYPES, RETRY_MAX, WAIT_MAX_TICKS};
pub use crate::provision::{SignerRegistry, StaticSignerRegistry, TrustListConfig, TrustedSigner};
pub use crate::storage::{
    ElementId, FileStorage, MemoryStorage, StorageBackend, StorageError, StorageFile,
};
pub use crate::transport::{QueueTransport, SentMessage, Transport, TransportError};
pub use crate::trust_list::{Tier, TrustListStore, TrustListUpdater};
pub use crate::update::{GotFileCallback, GotFileEvent, UpdateInterface};

// Wire-format types
pub use iotrust_protocol::{
    CurveType, DataRequest, DataResponse, FileInfo, FileType, FileTypeId, FileVersion,
    FldtCommand, FooterRequest, FooterResponse, HashType, HeaderRequest, HeaderResponse,
    KeyRecord, PeerAddr, SignatureEntry, SignerRole, TrustListFooter, TrustListHeader, WireRead,
    WireWrite,
};

// Security-module capability
pub use iotrust_crypto::{CryptoError, SecModule, SoftwareSecModule};
