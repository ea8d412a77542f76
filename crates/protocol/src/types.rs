//! File identity and peer addressing
//!
//! A [`FileType`] is the identity key that matches protocol requests and
//! responses to a registered consumer: the artifact class plus class-specific
//! additional info (manufacturer and device model for firmware, zeroed for
//! trust lists).

use crate::binary::{read_bytes, read_u16_be, write_bytes, write_u16_be, WireRead, WireWrite};
use std::fmt;
use std::io::{self, Read, Write};

/// Size of the class-specific additional-info field
pub const FILE_TYPE_ADD_INFO_LEN: usize = 32;

/// Artifact class identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileTypeId {
    /// Firmware image
    Firmware,
    /// Trusted-key list
    TrustList,
    /// Application-defined class (>= 256)
    User(u16),
}

impl FileTypeId {
    pub fn to_u16(self) -> u16 {
        match self {
            FileTypeId::Firmware => 0,
            FileTypeId::TrustList => 1,
            FileTypeId::User(id) => id,
        }
    }

    pub fn from_u16(raw: u16) -> io::Result<Self> {
        match raw {
            0 => Ok(FileTypeId::Firmware),
            1 => Ok(FileTypeId::TrustList),
            id if id >= 256 => Ok(FileTypeId::User(id)),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Reserved file type id: {}", other),
            )),
        }
    }
}

impl fmt::Display for FileTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileTypeId::Firmware => write!(f, "firmware"),
            FileTypeId::TrustList => write!(f, "trust-list"),
            FileTypeId::User(id) => write!(f, "user({})", id),
        }
    }
}

/// Identity key for a distributed artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileType {
    pub id: FileTypeId,
    pub add_info: [u8; FILE_TYPE_ADD_INFO_LEN],
}

impl FileType {
    /// Serialized size on the wire
    pub const WIRE_SIZE: usize = 2 + FILE_TYPE_ADD_INFO_LEN;

    pub fn new(id: FileTypeId) -> Self {
        Self {
            id,
            add_info: [0u8; FILE_TYPE_ADD_INFO_LEN],
        }
    }

    /// Identity with class-specific info; `info` longer than the field is an
    /// argument error on the caller's side and is truncated here.
    pub fn with_add_info(id: FileTypeId, info: &[u8]) -> Self {
        let mut add_info = [0u8; FILE_TYPE_ADD_INFO_LEN];
        let n = info.len().min(FILE_TYPE_ADD_INFO_LEN);
        add_info[..n].copy_from_slice(&info[..n]);
        Self { id, add_info }
    }

    pub fn firmware(manufacturer_and_model: &[u8]) -> Self {
        Self::with_add_info(FileTypeId::Firmware, manufacturer_and_model)
    }

    pub fn trust_list() -> Self {
        Self::new(FileTypeId::TrustList)
    }
}

impl WireRead for FileType {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let id = FileTypeId::from_u16(read_u16_be(reader)?)?;
        let raw = read_bytes(reader, FILE_TYPE_ADD_INFO_LEN)?;
        let mut add_info = [0u8; FILE_TYPE_ADD_INFO_LEN];
        add_info.copy_from_slice(&raw);
        Ok(Self { id, add_info })
    }
}

impl WireWrite for FileType {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u16_be(writer, self.id.to_u16())?;
        write_bytes(writer, &self.add_info)
    }

    fn serialized_size(&self) -> usize {
        Self::WIRE_SIZE
    }
}

/// MAC-style transport address of a peer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PeerAddr(pub [u8; 6]);

impl PeerAddr {
    pub const WIRE_SIZE: usize = 6;

    /// All-ones broadcast address
    pub const BROADCAST: PeerAddr = PeerAddr([0xFF; 6]);

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl WireRead for PeerAddr {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut bytes = [0u8; 6];
        reader.read_exact(&mut bytes)?;
        Ok(Self(bytes))
    }
}

impl WireWrite for PeerAddr {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0)
    }

    fn serialized_size(&self) -> usize {
        Self::WIRE_SIZE
    }
}
