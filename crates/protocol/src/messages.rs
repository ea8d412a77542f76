//! FLDT wire messages
//!
//! The file-delivery protocol is four command/response pairs:
//!
//! | Command | Meaning                                      |
//! |---------|----------------------------------------------|
//! | INFV    | unsolicited "new file version" notification  |
//! | GNFH    | get new file header                          |
//! | GNFD    | get new file data (one chunk)                |
//! | GNFF    | get new file footer                          |
//!
//! Every decoder consumes the payload exactly: a short payload or trailing
//! bytes is a malformed message, rejected before the engine looks at it.

use crate::binary::{
    expect_end, read_bytes_bounded, read_u16_be, read_u32_be, read_u8, write_bytes, write_u16_be,
    write_u32_be, write_u8, WireRead, WireWrite,
};
use crate::types::{FileType, PeerAddr};
use crate::version::FileVersion;
use std::io::{self, Cursor, Read, Write};

/// Upper bound for a header blob carried in a GNFH response
pub const MAX_HEADER_LEN: usize = 4096;
/// Upper bound for one data chunk carried in a GNFD response
pub const MAX_CHUNK_LEN: usize = 4096;
/// Upper bound for a footer blob carried in a GNFF response
pub const MAX_FOOTER_LEN: usize = 4096;

/// FLDT command identifiers, four-CC encoded as in the original service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FldtCommand {
    /// "Inform New File Version"
    Infv = 0x494E_4656,
    /// "Get New File Header"
    Gnfh = 0x474E_4648,
    /// "Get New File Data"
    Gnfd = 0x474E_4644,
    /// "Get New File Footer"
    Gnff = 0x474E_4646,
}

impl FldtCommand {
    pub fn to_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(raw: u32) -> io::Result<Self> {
        match raw {
            0x494E_4656 => Ok(FldtCommand::Infv),
            0x474E_4648 => Ok(FldtCommand::Gnfh),
            0x474E_4644 => Ok(FldtCommand::Gnfd),
            0x474E_4646 => Ok(FldtCommand::Gnff),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown FLDT command: {:#010x}", other),
            )),
        }
    }
}

/// Decode a complete payload, requiring exact consumption
fn decode_exact<T: WireRead>(payload: &[u8]) -> io::Result<T> {
    let mut cursor = Cursor::new(payload);
    let value = T::read_from(&mut cursor)?;
    expect_end(&mut cursor)?;
    Ok(value)
}

/// New-file announcement, the INFV payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileInfo {
    pub file_type: FileType,
    pub version: FileVersion,
    /// Address the client should request the file from
    pub gateway: PeerAddr,
}

impl FileInfo {
    pub fn decode(payload: &[u8]) -> io::Result<Self> {
        decode_exact(payload)
    }
}

impl WireRead for FileInfo {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            file_type: FileType::read_from(reader)?,
            version: FileVersion::read_from(reader)?,
            gateway: PeerAddr::read_from(reader)?,
        })
    }
}

impl WireWrite for FileInfo {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.file_type.write_to(writer)?;
        self.version.write_to(writer)?;
        self.gateway.write_to(writer)
    }

    fn serialized_size(&self) -> usize {
        FileType::WIRE_SIZE + FileVersion::WIRE_SIZE + PeerAddr::WIRE_SIZE
    }
}

/// GNFH request: announce the version the requester holds and ask for the
/// header of anything newer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRequest {
    pub file_type: FileType,
    pub version: FileVersion,
}

impl HeaderRequest {
    pub fn decode(payload: &[u8]) -> io::Result<Self> {
        decode_exact(payload)
    }
}

impl WireRead for HeaderRequest {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            file_type: FileType::read_from(reader)?,
            version: FileVersion::read_from(reader)?,
        })
    }
}

impl WireWrite for HeaderRequest {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.file_type.write_to(writer)?;
        self.version.write_to(writer)
    }

    fn serialized_size(&self) -> usize {
        FileType::WIRE_SIZE + FileVersion::WIRE_SIZE
    }
}

/// GNFH response: file metadata plus the header blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderResponse {
    pub file_type: FileType,
    pub version: FileVersion,
    pub gateway: PeerAddr,
    /// Total artifact size; data chunks are requested until this offset
    pub file_size: u32,
    pub has_footer: bool,
    pub header: Vec<u8>,
}

impl HeaderResponse {
    pub fn decode(payload: &[u8]) -> io::Result<Self> {
        decode_exact(payload)
    }
}

impl WireRead for HeaderResponse {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let file_type = FileType::read_from(reader)?;
        let version = FileVersion::read_from(reader)?;
        let gateway = PeerAddr::read_from(reader)?;
        let file_size = read_u32_be(reader)?;
        let has_footer = read_u8(reader)? != 0;
        let header_size = read_u16_be(reader)? as usize;
        let header = read_bytes_bounded(reader, header_size, MAX_HEADER_LEN)?;
        Ok(Self {
            file_type,
            version,
            gateway,
            file_size,
            has_footer,
            header,
        })
    }
}

impl WireWrite for HeaderResponse {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.file_type.write_to(writer)?;
        self.version.write_to(writer)?;
        self.gateway.write_to(writer)?;
        write_u32_be(writer, self.file_size)?;
        write_u8(writer, self.has_footer as u8)?;
        write_u16_be(writer, self.header.len() as u16)?;
        write_bytes(writer, &self.header)
    }

    fn serialized_size(&self) -> usize {
        FileType::WIRE_SIZE + FileVersion::WIRE_SIZE + PeerAddr::WIRE_SIZE + 4 + 1 + 2
            + self.header.len()
    }
}

/// GNFD request: ask for the chunk starting at `offset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRequest {
    pub file_type: FileType,
    pub version: FileVersion,
    pub offset: u32,
}

impl DataRequest {
    pub fn decode(payload: &[u8]) -> io::Result<Self> {
        decode_exact(payload)
    }
}

impl WireRead for DataRequest {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            file_type: FileType::read_from(reader)?,
            version: FileVersion::read_from(reader)?,
            offset: read_u32_be(reader)?,
        })
    }
}

impl WireWrite for DataRequest {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.file_type.write_to(writer)?;
        self.version.write_to(writer)?;
        write_u32_be(writer, self.offset)
    }

    fn serialized_size(&self) -> usize {
        FileType::WIRE_SIZE + FileVersion::WIRE_SIZE + 4
    }
}

/// GNFD response: one data chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataResponse {
    pub file_type: FileType,
    pub version: FileVersion,
    pub offset: u32,
    /// Offset the client should request next; equals `file_size` on the
    /// final chunk
    pub next_offset: u32,
    pub data: Vec<u8>,
}

impl DataResponse {
    pub fn decode(payload: &[u8]) -> io::Result<Self> {
        decode_exact(payload)
    }
}

impl WireRead for DataResponse {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let file_type = FileType::read_from(reader)?;
        let version = FileVersion::read_from(reader)?;
        let offset = read_u32_be(reader)?;
        let next_offset = read_u32_be(reader)?;
        let data_size = read_u16_be(reader)? as usize;
        if data_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Empty data chunk",
            ));
        }
        let data = read_bytes_bounded(reader, data_size, MAX_CHUNK_LEN)?;
        Ok(Self {
            file_type,
            version,
            offset,
            next_offset,
            data,
        })
    }
}

impl WireWrite for DataResponse {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.file_type.write_to(writer)?;
        self.version.write_to(writer)?;
        write_u32_be(writer, self.offset)?;
        write_u32_be(writer, self.next_offset)?;
        write_u16_be(writer, self.data.len() as u16)?;
        write_bytes(writer, &self.data)
    }

    fn serialized_size(&self) -> usize {
        FileType::WIRE_SIZE + FileVersion::WIRE_SIZE + 4 + 4 + 2 + self.data.len()
    }
}

/// GNFF request: ask for the footer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FooterRequest {
    pub file_type: FileType,
    pub version: FileVersion,
}

impl FooterRequest {
    pub fn decode(payload: &[u8]) -> io::Result<Self> {
        decode_exact(payload)
    }
}

impl WireRead for FooterRequest {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            file_type: FileType::read_from(reader)?,
            version: FileVersion::read_from(reader)?,
        })
    }
}

impl WireWrite for FooterRequest {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.file_type.write_to(writer)?;
        self.version.write_to(writer)
    }

    fn serialized_size(&self) -> usize {
        FileType::WIRE_SIZE + FileVersion::WIRE_SIZE
    }
}

/// GNFF response: the footer blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FooterResponse {
    pub file_type: FileType,
    pub version: FileVersion,
    pub footer: Vec<u8>,
}

impl FooterResponse {
    pub fn decode(payload: &[u8]) -> io::Result<Self> {
        decode_exact(payload)
    }
}

impl WireRead for FooterResponse {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let file_type = FileType::read_from(reader)?;
        let version = FileVersion::read_from(reader)?;
        let footer_size = read_u16_be(reader)? as usize;
        let footer = read_bytes_bounded(reader, footer_size, MAX_FOOTER_LEN)?;
        Ok(Self {
            file_type,
            version,
            footer,
        })
    }
}

impl WireWrite for FooterResponse {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.file_type.write_to(writer)?;
        self.version.write_to(writer)?;
        write_u16_be(writer, self.footer.len() as u16)?;
        write_bytes(writer, &self.footer)
    }

    fn serialized_size(&self) -> usize {
        FileType::WIRE_SIZE + FileVersion::WIRE_SIZE + 2 + self.footer.len()
    }
}
