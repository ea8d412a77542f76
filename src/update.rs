//! Update-interface boundary
//!
//! One implementation of [`UpdateInterface`] exists per artifact class
//! (firmware, trust list, application-defined). The FLDT engine is generic
//! over this trait and never knows what it is transporting: the `get_*` half
//! serves a gateway handing the artifact out, the `set_*` half stages and
//! commits it on a client.
//!
//! Offsets and the total file size are in consumer-defined units: bytes for
//! firmware images, key indices for trust lists. The engine only compares
//! them; it never does arithmetic on them beyond passing `next_offset` back.

use crate::error::IotError;
use iotrust_protocol::{FileType, FileVersion, PeerAddr};

/// Capability set implemented once per artifact class
pub trait UpdateInterface: Send + Sync {
    /// Size of this class's header blob
    fn get_header_size(&self, file_type: &FileType) -> Result<usize, IotError>;

    /// Header of the locally stored artifact
    fn get_header(&self, file_type: &FileType) -> Result<Vec<u8>, IotError>;

    /// Version of the locally stored artifact, when one exists
    fn get_version(&self, file_type: &FileType) -> Result<FileVersion, IotError>;

    /// Total size of the locally stored artifact, in this class's offset units
    fn get_file_size(&self, file_type: &FileType, header: &[u8]) -> Result<usize, IotError>;

    /// Whether artifacts of this class carry a footer
    fn has_footer(&self, file_type: &FileType) -> Result<bool, IotError>;

    /// Read one chunk starting at `offset`, at most `max_len` bytes
    fn get_data(
        &self,
        file_type: &FileType,
        header: &[u8],
        offset: usize,
        max_len: usize,
    ) -> Result<Vec<u8>, IotError>;

    /// Offset following a chunk of `loaded_size` bytes read at `offset`
    fn inc_data_offset(
        &self,
        file_type: &FileType,
        offset: usize,
        loaded_size: usize,
    ) -> Result<usize, IotError>;

    /// Footer of the locally stored artifact
    fn get_footer(&self, file_type: &FileType, header: &[u8]) -> Result<Vec<u8>, IotError>;

    /// Stage an incoming header; returns the total file size to download
    fn set_header(&self, file_type: &FileType, header: &[u8]) -> Result<usize, IotError>;

    /// Stage one incoming chunk
    fn set_data(
        &self,
        file_type: &FileType,
        header: &[u8],
        data: &[u8],
        offset: usize,
    ) -> Result<(), IotError>;

    /// Verify and commit the staged artifact. An error here means the update
    /// is rejected; previously committed state must remain intact.
    fn set_footer(
        &self,
        file_type: &FileType,
        header: &[u8],
        footer: &[u8],
    ) -> Result<(), IotError>;

    /// Admission rule: should `candidate` replace `available`?
    fn file_is_newer(
        &self,
        _file_type: &FileType,
        available: &FileVersion,
        candidate: &FileVersion,
    ) -> bool {
        candidate.is_newer_than(available)
    }

    /// Release per-file-type cached resources
    fn free_item(&self, _file_type: &FileType) {}

    /// Discard any partially staged artifact
    fn delete_object(&self, file_type: &FileType) -> Result<(), IotError>;

    /// Human-readable artifact class name (diagnostics only)
    fn describe_type(&self, file_type: &FileType) -> String {
        file_type.id.to_string()
    }

    /// Human-readable version (diagnostics only)
    fn describe_version(&self, file_type: &FileType, version: &FileVersion) -> String {
        format!("{}, version {}", self.describe_type(file_type), version)
    }
}

/// Outcome of one completed download attempt, successful or not
#[derive(Debug, Clone, Copy)]
pub struct GotFileEvent<'a> {
    pub file_type: &'a FileType,
    pub prev_version: &'a FileVersion,
    pub new_version: &'a FileVersion,
    pub gateway: &'a PeerAddr,
    pub success: bool,
}

/// Callback invoked by the FLDT client when a download attempt finishes
pub type GotFileCallback = Box<dyn Fn(GotFileEvent<'_>) + Send + Sync>;
