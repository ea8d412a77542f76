//! Trust-list record layout
//!
//! A trust list is stored and distributed as three kinds of records:
//! a fixed-size header, `pub_keys_count` dated key records, and a footer
//! carrying the signature chain. Signature and public-key lengths are never
//! stored; they are derived from the curve type, so a record that lies about
//! its curve simply fails to parse.

use crate::binary::{
    expect_end, read_bytes, read_bytes_bounded, read_u16_be, read_u32_be, read_u8, write_bytes,
    write_u16_be, write_u32_be, write_u8, WireRead, WireWrite,
};
use crate::version::FileVersion;
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor, Read, Write};

/// Upper bound for key-record metadata
pub const MAX_KEY_META_LEN: usize = 1024;

/// Hash algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HashType {
    Sha256 = 0,
    Sha384 = 1,
    Sha512 = 2,
}

impl HashType {
    pub fn digest_len(self) -> usize {
        match self {
            HashType::Sha256 => 32,
            HashType::Sha384 => 48,
            HashType::Sha512 => 64,
        }
    }

    pub fn from_u8(raw: u8) -> io::Result<Self> {
        match raw {
            0 => Ok(HashType::Sha256),
            1 => Ok(HashType::Sha384),
            2 => Ok(HashType::Sha512),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown hash type: {}", other),
            )),
        }
    }
}

/// Elliptic curve selector
///
/// Key and signature sizes follow from the curve: uncompressed SEC1 points
/// and raw `r || s` signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CurveType {
    /// secp256r1 (P-256)
    Secp256r1 = 1,
    /// secp384r1 (P-384)
    Secp384r1 = 2,
    /// secp521r1 (P-521)
    Secp521r1 = 3,
}

impl CurveType {
    /// Uncompressed SEC1 public key size
    pub fn pubkey_len(self) -> usize {
        match self {
            CurveType::Secp256r1 => 65,  // 1 byte prefix + 2 * 32
            CurveType::Secp384r1 => 97,  // 1 byte prefix + 2 * 48
            CurveType::Secp521r1 => 133, // 1 byte prefix + 2 * 66
        }
    }

    /// Raw signature size (r || s)
    pub fn signature_len(self) -> usize {
        match self {
            CurveType::Secp256r1 => 64,
            CurveType::Secp384r1 => 96,
            CurveType::Secp521r1 => 132,
        }
    }

    pub fn from_u8(raw: u8) -> io::Result<Self> {
        match raw {
            1 => Ok(CurveType::Secp256r1),
            2 => Ok(CurveType::Secp384r1),
            3 => Ok(CurveType::Secp521r1),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown curve type: {}", other),
            )),
        }
    }
}

/// Signer identity class
///
/// The required-role list of the verification config is expressed in these
/// roles; an artifact is accepted only when enough distinct required roles
/// have signed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SignerRole {
    Recovery = 1,
    Auth = 2,
    TrustList = 3,
    Firmware = 4,
    Factory = 5,
    Cloud = 6,
}

impl SignerRole {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> io::Result<Self> {
        match raw {
            1 => Ok(SignerRole::Recovery),
            2 => Ok(SignerRole::Auth),
            3 => Ok(SignerRole::TrustList),
            4 => Ok(SignerRole::Firmware),
            5 => Ok(SignerRole::Factory),
            6 => Ok(SignerRole::Cloud),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Unknown signer role: {}", other),
            )),
        }
    }
}

/// Trust-list header record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrustListHeader {
    /// Total list size: header + key records + footer
    pub tl_size: u32,
    pub version: FileVersion,
    pub pub_keys_count: u16,
    pub signatures_count: u8,
}

impl TrustListHeader {
    pub const WIRE_SIZE: usize = 4 + FileVersion::WIRE_SIZE + 2 + 1;

    pub fn decode(payload: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(payload);
        let header = Self::read_from(&mut cursor)?;
        expect_end(&mut cursor)?;
        Ok(header)
    }
}

impl WireRead for TrustListHeader {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        Ok(Self {
            tl_size: read_u32_be(reader)?,
            version: FileVersion::read_from(reader)?,
            pub_keys_count: read_u16_be(reader)?,
            signatures_count: read_u8(reader)?,
        })
    }
}

impl WireWrite for TrustListHeader {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u32_be(writer, self.tl_size)?;
        self.version.write_to(writer)?;
        write_u16_be(writer, self.pub_keys_count)?;
        write_u8(writer, self.signatures_count)
    }

    fn serialized_size(&self) -> usize {
        Self::WIRE_SIZE
    }
}

/// Dated public-key record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// Validity start, seconds since the device epoch
    pub start_date: u32,
    /// Validity end, seconds since the device epoch
    pub expire_date: u32,
    pub key_role: SignerRole,
    pub curve_type: CurveType,
    pub meta: Vec<u8>,
    /// Raw public key; length is derived from `curve_type`
    pub pubkey: Vec<u8>,
}

impl KeyRecord {
    pub fn decode(payload: &[u8]) -> io::Result<Self> {
        let mut cursor = Cursor::new(payload);
        let record = Self::read_from(&mut cursor)?;
        expect_end(&mut cursor)?;
        Ok(record)
    }

    /// Validate that the key length matches the declared curve
    pub fn validate(&self) -> io::Result<()> {
        if self.pubkey.len() != self.curve_type.pubkey_len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Key length {} does not match curve (expected {})",
                    self.pubkey.len(),
                    self.curve_type.pubkey_len()
                ),
            ));
        }
        Ok(())
    }
}

impl WireRead for KeyRecord {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let start_date = read_u32_be(reader)?;
        let expire_date = read_u32_be(reader)?;
        let key_role = SignerRole::from_u8(read_u8(reader)?)?;
        let curve_type = CurveType::from_u8(read_u8(reader)?)?;
        let meta_len = read_u16_be(reader)? as usize;
        let meta = read_bytes_bounded(reader, meta_len, MAX_KEY_META_LEN)?;
        let pubkey = read_bytes(reader, curve_type.pubkey_len())?;
        Ok(Self {
            start_date,
            expire_date,
            key_role,
            curve_type,
            meta,
            pubkey,
        })
    }
}

impl WireWrite for KeyRecord {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        write_u32_be(writer, self.start_date)?;
        write_u32_be(writer, self.expire_date)?;
        write_u8(writer, self.key_role.to_u8())?;
        write_u8(writer, self.curve_type as u8)?;
        write_u16_be(writer, self.meta.len() as u16)?;
        write_bytes(writer, &self.meta)?;
        write_bytes(writer, &self.pubkey)
    }

    fn serialized_size(&self) -> usize {
        4 + 4 + 1 + 1 + 2 + self.meta.len() + self.pubkey.len()
    }
}

/// One signature of the trust-list digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    pub signer_role: SignerRole,
    pub curve_type: CurveType,
    pub hash_type: HashType,
    /// Raw signature; length derived from `curve_type`
    pub signature: Vec<u8>,
    /// Raw public key of the claimed signer; length derived from `curve_type`
    pub signer_pubkey: Vec<u8>,
}

impl WireRead for SignatureEntry {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let signer_role = SignerRole::from_u8(read_u8(reader)?)?;
        let curve_type = CurveType::from_u8(read_u8(reader)?)?;
        let hash_type = HashType::from_u8(read_u8(reader)?)?;
        let signature = read_bytes(reader, curve_type.signature_len())?;
        let signer_pubkey = read_bytes(reader, curve_type.pubkey_len())?;
        Ok(Self {
            signer_role,
            curve_type,
            hash_type,
            signature,
            signer_pubkey,
        })
    }
}

impl WireWrite for SignatureEntry {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u8(writer, self.signer_role.to_u8())?;
        write_u8(writer, self.curve_type as u8)?;
        write_u8(writer, self.hash_type as u8)?;
        write_bytes(writer, &self.signature)?;
        write_bytes(writer, &self.signer_pubkey)
    }

    fn serialized_size(&self) -> usize {
        1 + 1 + 1 + self.signature.len() + self.signer_pubkey.len()
    }
}

/// Trust-list footer: the artifact-type tag plus the signature chain
///
/// The number of signatures is declared by the header, so parsing a footer
/// requires the header's `signatures_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustListFooter {
    pub tl_type: u8,
    pub signatures: Vec<SignatureEntry>,
}

impl TrustListFooter {
    pub fn decode(payload: &[u8], signatures_count: u8) -> io::Result<Self> {
        let mut cursor = Cursor::new(payload);
        let footer = Self::read_counted(&mut cursor, signatures_count)?;
        expect_end(&mut cursor)?;
        Ok(footer)
    }

    pub fn read_counted<R: Read>(reader: &mut R, signatures_count: u8) -> io::Result<Self> {
        let tl_type = read_u8(reader)?;
        let mut signatures = Vec::with_capacity(signatures_count as usize);
        for _ in 0..signatures_count {
            signatures.push(SignatureEntry::read_from(reader)?);
        }
        Ok(Self { tl_type, signatures })
    }
}

impl WireWrite for TrustListFooter {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        write_u8(writer, self.tl_type)?;
        for signature in &self.signatures {
            signature.write_to(writer)?;
        }
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        1 + self
            .signatures
            .iter()
            .map(WireWrite::serialized_size)
            .sum::<usize>()
    }
}
