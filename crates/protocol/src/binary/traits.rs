//! Traits for wire serialization and deserialization

use std::io::{self, Read, Write};

/// Trait for types that can be read from the wire format
pub trait WireRead: Sized {
    /// Read this type from a binary reader
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self>;
}

/// Trait for types that can be written to the wire format
pub trait WireWrite {
    /// Write this type to a binary writer
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    /// Get the size in bytes when serialized
    fn serialized_size(&self) -> usize;

    /// Serialize into a fresh byte vector
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        // Writing into a Vec cannot fail
        self.write_to(&mut buf).expect("write to Vec");
        buf
    }
}
