//! iotrust protocol types
//!
//! This crate contains the wire-level types of the iotrust file-delivery
//! protocol (FLDT) and the trust-list record layout:
//! - FLDT request/response messages (INFV, GNFH, GNFD, GNFF)
//! - File identity and version types
//! - Trust-list header, key-record, signature and footer layouts
//!
//! This crate contains NO cryptographic operations and NO I/O.
//! It is purely focused on data structures and serialization.
//! All multi-byte integers are big-endian on the wire and host order
//! once decoded.

pub mod binary;
pub mod messages;
pub mod trust_list;
pub mod types;
pub mod version;

pub use binary::{WireRead, WireWrite};
pub use messages::{
    DataRequest, DataResponse, FileInfo, FldtCommand, FooterRequest, FooterResponse,
    HeaderRequest, HeaderResponse, MAX_CHUNK_LEN, MAX_FOOTER_LEN, MAX_HEADER_LEN,
};
pub use trust_list::{
    CurveType, HashType, KeyRecord, SignatureEntry, SignerRole, TrustListFooter, TrustListHeader,
};
pub use types::{FileType, FileTypeId, PeerAddr, FILE_TYPE_ADD_INFO_LEN};
pub use version::FileVersion;
