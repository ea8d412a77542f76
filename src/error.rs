//! Error types
//!
//! Each subsystem carries its own error enum; [`IotError`] is the unified
//! type crossing the public API, with `#[from]` conversions from every
//! subsystem so `?` composes across layers.

use crate::storage::StorageError;
use crate::transport::TransportError;
use iotrust_crypto::CryptoError;
use thiserror::Error;

/// Trust-list storage and verification failures
#[derive(Debug, Error)]
pub enum TrustListError {
    /// No tier currently holds a verified list
    #[error("Trust list storage is not initialized")]
    NotInitialized,

    /// The requested record does not exist in the tier
    #[error("Trust list element not found")]
    NotFound,

    /// Signature walk or required-role tally failed
    #[error("Trust list verification failed")]
    Verify,

    /// Incoming list would exceed the configured storage budget
    #[error("Trust list exceeds the configured size limit ({limit} bytes)")]
    TooLarge { limit: u32 },

    /// A key arrived after the declared count was already met
    #[error("Trust list already holds the declared number of keys")]
    KeyCountExceeded,

    /// Footer arrived before every declared key
    #[error("Trust list footer received before all keys ({written} of {declared})")]
    KeysIncomplete { written: u16, declared: u16 },

    /// Stored or incoming bytes do not decode as a valid record
    #[error("Malformed trust list record: {0}")]
    Malformed(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("Trust list lock poisoned")]
    Lock,
}

/// FLDT state-machine failures
#[derive(Debug, Error)]
pub enum FldtError {
    /// Message referenced a file type with no registered mapping
    #[error("File type is not registered")]
    UnregisteredFileType,

    /// The fixed mapping table is full
    #[error("File type mapping table is full")]
    NoSpaceForMapping,

    /// Announced version is not newer than what we hold
    #[error("Announced version is not newer than the local one")]
    OldVersion,

    /// Payload failed to decode or carried inconsistent fields
    #[error("Malformed FLDT message: {0}")]
    Malformed(String),

    /// Response does not match the transfer in progress
    #[error("Response does not match the current transfer")]
    UnexpectedResponse,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Unified error for the toolkit
#[derive(Debug, Error)]
pub enum IotError {
    #[error(transparent)]
    TrustList(#[from] TrustListError),

    #[error(transparent)]
    Fldt(#[from] FldtError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl IotError {
    /// True when the failure is a verification rejection rather than an
    /// environmental fault
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            IotError::TrustList(TrustListError::Verify) | IotError::Crypto(CryptoError::BadSignature)
        )
    }

    /// True when retrying the same operation could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, IotError::Transport(_) | IotError::Io(_))
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, IotError>;
