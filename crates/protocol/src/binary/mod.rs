//! Binary serialization infrastructure for the FLDT wire format
//!
//! Helper functions for reading and writing protocol fields. All multi-byte
//! integers use big-endian byte order on the wire; decoded values are host
//! order. Decoders that own a complete payload finish with [`expect_end`] so
//! that a short or overlong message is rejected before any engine state is
//! touched.

use std::io::{self, Read, Write};

pub mod traits;

pub use traits::{WireRead, WireWrite};

/// Read a u8 from a reader
pub fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Read a u16 (big-endian) from a reader
pub fn read_u16_be<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

/// Read a u32 (big-endian) from a reader
pub fn read_u32_be<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

/// Read exactly n bytes from a reader
pub fn read_bytes<R: Read>(reader: &mut R, n: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read exactly n bytes, refusing declared lengths above `limit`.
///
/// Length fields arrive from the network; the cap stops a hostile message
/// from forcing an oversized allocation before `read_exact` fails.
pub fn read_bytes_bounded<R: Read>(reader: &mut R, n: usize, limit: usize) -> io::Result<Vec<u8>> {
    if n > limit {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Declared length {} exceeds limit {}", n, limit),
        ));
    }
    read_bytes(reader, n)
}

/// Require that the reader is fully consumed.
///
/// Message payloads must match their declared size exactly; trailing bytes
/// are treated as a malformed message.
pub fn expect_end<R: Read>(reader: &mut R) -> io::Result<()> {
    let mut probe = [0u8; 1];
    match reader.read(&mut probe)? {
        0 => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Trailing bytes after message payload",
        )),
    }
}

/// Write a u8 to a writer
pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> io::Result<()> {
    writer.write_all(&[value])
}

/// Write a u16 (big-endian) to a writer
pub fn write_u16_be<W: Write>(writer: &mut W, value: u16) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

/// Write a u32 (big-endian) to a writer
pub fn write_u32_be<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_be_bytes())
}

/// Write bytes to a writer
pub fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> io::Result<()> {
    writer.write_all(bytes)
}
