//! Volume footer, the 16-byte trailer at the very end of the container.

use heartlight_common::BinaryReader;

use crate::cipher;
use crate::{Error, Result};

/// Decoded volume footer.
///
/// Layout after decoding (little-endian):
///
/// | offset | size | field             |
/// |--------|------|-------------------|
/// | 0      | 6    | magic `volume`    |
/// | 6      | 4    | reserved          |
/// | 10     | 2    | entry count       |
/// | 12     | 4    | data base delta   |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeFooter {
    /// Opaque value, not interpreted.
    pub reserved: u32,
    /// Number of records in the file table.
    pub entry_count: u16,
    /// Distance from the end of the container back to the data region base.
    pub data_base_delta: u32,
}

impl VolumeFooter {
    /// Footer size in bytes.
    pub const SIZE: usize = 0x10;

    /// Magic bytes expected at the start of the decoded footer.
    pub const MAGIC: [u8; 6] = *b"volume";

    /// Parse a footer from its 16 obfuscated bytes.
    pub fn parse(raw: &[u8; Self::SIZE]) -> Result<Self> {
        let decoded = cipher::decode(raw);
        let mut reader = BinaryReader::new(&decoded);

        let magic = reader.read_array::<6>()?;
        if magic != Self::MAGIC {
            return Err(Error::InvalidMagic { actual: magic });
        }

        Ok(Self {
            reserved: reader.read_u32()?,
            entry_count: reader.read_u16()?,
            data_base_delta: reader.read_u32()?,
        })
    }

    /// Locate and parse the footer at the end of `data`.
    pub fn read(data: &[u8]) -> Result<Self> {
        let start = data.len().checked_sub(Self::SIZE).ok_or(Error::Truncated {
            needed: Self::SIZE as u64,
            available: data.len() as u64,
        })?;

        let mut raw = [0u8; Self::SIZE];
        raw.copy_from_slice(&data[start..]);
        Self::parse(&raw)
    }

    /// Size of the file table in bytes.
    #[inline]
    pub fn table_size(&self) -> u64 {
        u64::from(self.entry_count) * crate::VolumeEntry::SIZE as u64
    }

    /// Absolute offset of the data region base in a container of `length` bytes.
    pub fn data_base(&self, length: u64) -> Result<u64> {
        length
            .checked_sub(u64::from(self.data_base_delta))
            .ok_or(Error::DataBaseOutOfRange {
                delta: self.data_base_delta,
                length,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;

    fn raw_footer(magic: &[u8; 6], entry_count: u16, delta: u32) -> [u8; 16] {
        let mut plain = [0u8; 16];
        plain[..6].copy_from_slice(magic);
        plain[6..10].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
        plain[10..12].copy_from_slice(&entry_count.to_le_bytes());
        plain[12..16].copy_from_slice(&delta.to_le_bytes());
        let mut raw = [0u8; 16];
        raw.copy_from_slice(&cipher::encode(&plain));
        raw
    }

    #[test]
    fn test_parse_fields() {
        let footer = VolumeFooter::parse(&raw_footer(b"volume", 3, 0x1234)).unwrap();
        assert_eq!(footer.reserved, 0xDEADBEEF);
        assert_eq!(footer.entry_count, 3);
        assert_eq!(footer.data_base_delta, 0x1234);
        assert_eq!(footer.table_size(), 96);
    }

    #[test]
    fn test_rejects_other_magic() {
        for magic in [b"Volume", b"volumf", b"\0\0\0\0\0\0", b"emulov"] {
            let err = VolumeFooter::parse(&raw_footer(magic, 1, 0)).unwrap_err();
            assert!(matches!(err, Error::InvalidMagic { actual } if &actual == magic));
            assert_eq!(err.kind(), crate::ErrorKind::Format);
        }
    }

    #[test]
    fn test_rejects_unobfuscated_footer() {
        let mut plain = [0u8; 16];
        plain[..6].copy_from_slice(b"volume");
        assert!(matches!(
            VolumeFooter::parse(&plain),
            Err(Error::InvalidMagic { .. })
        ));
    }

    #[test]
    fn test_read_from_container_tail() {
        let container = fixture::VolumeBuilder::new()
            .file("A.TXT", b"HELLO")
            .build();
        let footer = VolumeFooter::read(&container).unwrap();
        assert_eq!(footer.entry_count, 1);
    }

    #[test]
    fn test_read_too_short() {
        let err = VolumeFooter::read(&[0u8; 15]).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                needed: 16,
                available: 15
            }
        ));
    }

    #[test]
    fn test_data_base() {
        let footer = VolumeFooter {
            reserved: 0,
            entry_count: 0,
            data_base_delta: 0x40,
        };
        assert_eq!(footer.data_base(0x100).unwrap(), 0xC0);
        assert!(matches!(
            footer.data_base(0x20),
            Err(Error::DataBaseOutOfRange { delta: 0x40, length: 0x20 })
        ));
    }
}
