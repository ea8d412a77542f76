//! File version tuple
//!
//! Versions are the sole admission rule for update distribution: a peer's
//! artifact is downloaded iff its version is strictly newer than the local
//! one. Comparison is lexicographic over (major, minor, patch, build,
//! timestamp) and never considers content.

use crate::binary::{read_u32_be, read_u8, write_u32_be, write_u8, WireRead, WireWrite};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};

/// Ordered version of a distributed artifact.
///
/// `timestamp` is a monotonic counter (seconds since the device epoch)
/// stamped by the build pipeline; it breaks ties between otherwise equal
/// numeric versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub build: u32,
    pub timestamp: u32,
}

impl FileVersion {
    /// Serialized size on the wire
    pub const WIRE_SIZE: usize = 11;

    pub fn new(major: u8, minor: u8, patch: u8, build: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            build,
            timestamp: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Strictly-newer check used by update admission
    pub fn is_newer_than(&self, other: &FileVersion) -> bool {
        self > other
    }
}

impl fmt::Display for FileVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{} ({})",
            self.major, self.minor, self.patch, self.build, self.timestamp
        )
    }
}

impl WireRead for FileVersion {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let major = read_u8(reader)?;
        let minor = read_u8(reader)?;
        let patch = read_u8(reader)?;
        let build = read_u32_be(reader)?;
        let timestamp = read_u32_be(reader)?;
        Ok(Self {
            major,
            minor,
            patch,
            build,
            timestamp,
        })
    }
}

impl WireWrite for FileVersion {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u8(writer, self.major)?;
        write_u8(writer, self.minor)?;
        write_u8(writer, self.patch)?;
        write_u32_be(writer, self.build)?;
        write_u32_be(writer, self.timestamp)
    }

    fn serialized_size(&self) -> usize {
        Self::WIRE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_ordering_is_lexicographic() {
        let base = FileVersion::new(1, 2, 3, 100).with_timestamp(5000);

        assert!(FileVersion::new(2, 0, 0, 0).is_newer_than(&base));
        assert!(FileVersion::new(1, 3, 0, 0).is_newer_than(&base));
        assert!(FileVersion::new(1, 2, 4, 0).is_newer_than(&base));
        assert!(FileVersion::new(1, 2, 3, 101).is_newer_than(&base));
        assert!(base
            .with_timestamp(5001)
            .is_newer_than(&base));

        assert!(!base.is_newer_than(&base));
        assert!(!FileVersion::new(1, 2, 2, 999).is_newer_than(&base));
    }

    #[test]
    fn test_wire_roundtrip() {
        let version = FileVersion::new(1, 0, 0, 1000).with_timestamp(0x0102_0304);
        let bytes = version.to_bytes();
        assert_eq!(bytes.len(), FileVersion::WIRE_SIZE);

        let mut cursor = Cursor::new(bytes);
        assert_eq!(FileVersion::read_from(&mut cursor).unwrap(), version);
    }

    #[test]
    fn test_display() {
        let version = FileVersion::new(0, 9, 0, 900);
        assert_eq!(version.to_string(), "0.9.0.900 (0)");
    }
}
