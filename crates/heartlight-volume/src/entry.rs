//! File table records.

use heartlight_common::BinaryReader;

use crate::cipher;
use crate::footer::VolumeFooter;
use crate::{Error, Result};

/// Width of the null-padded name field.
const NAME_LEN: usize = 13;

/// One record of the file table.
///
/// Layout after decoding (little-endian):
///
/// | offset | size | field          |
/// |--------|------|----------------|
/// | 0      | 13   | name           |
/// | 13     | 1    | compressed     |
/// | 14     | 4    | offset         |
/// | 18     | 4    | stored size    |
/// | 22     | 4    | decoded size   |
/// | 26     | 5    | reserved       |
/// | 31     | 1    | escape byte    |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeEntry {
    /// Artifact name, used verbatim as the output file name.
    pub name: String,
    /// Whether the stored bytes are compressed.
    pub is_compressed: bool,
    /// Offset of the stored bytes relative to the data region base.
    pub offset: u32,
    /// Bytes occupied in the container.
    pub stored_size: u32,
    /// Length of the asset once decompressed.
    pub decoded_size: u32,
    /// Opaque bytes, not interpreted.
    pub reserved: [u8; 5],
    /// Sentinel introducing escapes and back-references for this entry.
    pub escape_byte: u8,
}

impl VolumeEntry {
    /// Record size in bytes.
    pub const SIZE: usize = 0x20;

    /// Parse a record from its 32 decoded bytes.
    pub fn parse(record: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(record);

        Ok(Self {
            name: reader.read_padded_str(NAME_LEN)?,
            is_compressed: reader.read_bool()?,
            offset: reader.read_u32()?,
            stored_size: reader.read_u32()?,
            decoded_size: reader.read_u32()?,
            reserved: reader.read_array::<5>()?,
            escape_byte: reader.read_u8()?,
        })
    }

    /// Check that the name is a plain file name that stays inside an output directory.
    fn has_usable_name(&self) -> bool {
        !self.name.is_empty()
            && self.name != "."
            && self.name != ".."
            && !self
                .name
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_ascii_control())
    }
}

/// Read the file table that sits directly in front of the footer.
///
/// The table is decoded as one region with a fresh key and split into
/// `entry_count` records in on-disk order.
pub fn read_table(data: &[u8], footer: &VolumeFooter) -> Result<Vec<VolumeEntry>> {
    let length = data.len() as u64;
    let needed = footer.table_size() + VolumeFooter::SIZE as u64;
    if length < needed {
        return Err(Error::Truncated {
            needed,
            available: length,
        });
    }

    let start = (length - needed) as usize;
    let end = start + footer.table_size() as usize;
    let table = cipher::decode(&data[start..end]);

    let mut entries = Vec::with_capacity(footer.entry_count as usize);
    for (index, record) in table.chunks_exact(VolumeEntry::SIZE).enumerate() {
        let entry = VolumeEntry::parse(record)?;
        if !entry.has_usable_name() {
            return Err(Error::InvalidEntryName {
                index,
                name: entry.name,
            });
        }
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{self, VolumeBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_record() {
        let mut record = [0u8; 32];
        record[..5].copy_from_slice(b"A.GGS");
        record[13] = 1;
        record[14..18].copy_from_slice(&0x10u32.to_le_bytes());
        record[18..22].copy_from_slice(&0x20u32.to_le_bytes());
        record[22..26].copy_from_slice(&0x30u32.to_le_bytes());
        record[26..31].copy_from_slice(&[1, 2, 3, 4, 5]);
        record[31] = 0xAB;

        let entry = VolumeEntry::parse(&record).unwrap();
        assert_eq!(
            entry,
            VolumeEntry {
                name: "A.GGS".to_string(),
                is_compressed: true,
                offset: 0x10,
                stored_size: 0x20,
                decoded_size: 0x30,
                reserved: [1, 2, 3, 4, 5],
                escape_byte: 0xAB,
            }
        );
    }

    #[test]
    fn test_parse_full_width_name() {
        let mut record = [0u8; 32];
        record[..13].copy_from_slice(b"ABCDEFGHI.SND");
        record[13] = 0;
        let entry = VolumeEntry::parse(&record).unwrap();
        assert_eq!(entry.name, "ABCDEFGHI.SND");
        assert!(!entry.is_compressed);
    }

    #[test]
    fn test_read_table_order_and_count() {
        let container = VolumeBuilder::new()
            .file("FIRST.SND", b"one")
            .compressed("SECOND.GGS", b"twotwotwo", 0x7E)
            .file("THIRD.TXT", b"three")
            .build();
        let footer = VolumeFooter::read(&container).unwrap();
        let entries = read_table(&container, &footer).unwrap();

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["FIRST.SND", "SECOND.GGS", "THIRD.TXT"]);
        assert!(entries[1].is_compressed);
        assert_eq!(entries[1].escape_byte, 0x7E);
        assert_eq!(entries[1].decoded_size, 9);
    }

    #[test]
    fn test_records_match_decoded_slices() {
        let container = VolumeBuilder::new()
            .file("A", b"x")
            .file("B", b"yy")
            .build();
        let footer = VolumeFooter::read(&container).unwrap();
        let entries = read_table(&container, &footer).unwrap();

        let table_end = container.len() - VolumeFooter::SIZE;
        let table_start = table_end - footer.table_size() as usize;
        let decoded = cipher::decode(&container[table_start..table_end]);
        for (entry, slice) in entries.iter().zip(decoded.chunks_exact(VolumeEntry::SIZE)) {
            assert_eq!(entry, &VolumeEntry::parse(slice).unwrap());
        }
    }

    #[test]
    fn test_table_longer_than_container() {
        let footer = fixture::encoded_footer(100, 0);
        let err = read_table(&footer, &VolumeFooter::read(&footer).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                needed: 3216,
                available: 16
            }
        ));
        assert_eq!(err.kind(), crate::ErrorKind::Format);
    }

    #[test]
    fn test_rejects_path_like_names() {
        for name in ["..", "A/B", "C:\\X", ""] {
            let container = VolumeBuilder::new().file(name, b"data").build();
            let footer = VolumeFooter::read(&container).unwrap();
            assert!(matches!(
                read_table(&container, &footer),
                Err(Error::InvalidEntryName { index: 0, .. })
            ));
        }
    }
}
