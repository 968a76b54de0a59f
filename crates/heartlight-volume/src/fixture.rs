//! Synthetic containers for tests.

use crate::cipher;
use crate::decompress::{MAX_COUNT, MAX_DISTANCE};
use crate::entry::VolumeEntry;
use crate::footer::VolumeFooter;

/// One file to place in a synthetic container.
#[derive(Debug, Clone)]
pub struct FixtureEntry {
    pub name: String,
    pub is_compressed: bool,
    /// Stored bytes before obfuscation.
    pub payload: Vec<u8>,
    pub decoded_size: u32,
    pub escape_byte: u8,
    /// Overrides the offset the builder would assign.
    pub offset: Option<u32>,
}

impl FixtureEntry {
    pub fn stored(name: &str, payload: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            is_compressed: false,
            decoded_size: payload.len() as u32,
            payload,
            escape_byte: 0,
            offset: None,
        }
    }

    pub fn compressed_raw(name: &str, payload: Vec<u8>, escape_byte: u8) -> Self {
        Self {
            is_compressed: true,
            escape_byte,
            ..Self::stored(name, payload)
        }
    }

    fn record(&self, offset: u32) -> [u8; VolumeEntry::SIZE] {
        assert!(self.name.len() <= 13, "fixture name too long");
        let mut record = [0u8; VolumeEntry::SIZE];
        record[..self.name.len()].copy_from_slice(self.name.as_bytes());
        record[13] = u8::from(self.is_compressed);
        record[14..18].copy_from_slice(&offset.to_le_bytes());
        record[18..22].copy_from_slice(&(self.payload.len() as u32).to_le_bytes());
        record[22..26].copy_from_slice(&self.decoded_size.to_le_bytes());
        record[26..31].copy_from_slice(&[0x11, 0x22, 0x33, 0x44, 0x55]);
        record[31] = self.escape_byte;
        record
    }
}

/// Assembles `prefix | data region | file table | footer`.
#[derive(Debug, Default)]
pub struct VolumeBuilder {
    prefix: Vec<u8>,
    entries: Vec<FixtureEntry>,
}

impl VolumeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes standing in for the executable image in front of the data region.
    pub fn prefix(mut self, bytes: &[u8]) -> Self {
        self.prefix = bytes.to_vec();
        self
    }

    pub fn file(self, name: &str, contents: &[u8]) -> Self {
        self.entry(FixtureEntry::stored(name, contents.to_vec()))
    }

    pub fn compressed(self, name: &str, contents: &[u8], escape_byte: u8) -> Self {
        let packed = compress(contents, escape_byte);
        self.entry(FixtureEntry {
            decoded_size: contents.len() as u32,
            ..FixtureEntry::compressed_raw(name, packed, escape_byte)
        })
    }

    pub fn entry(mut self, entry: FixtureEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = self.prefix.clone();
        let mut table = Vec::with_capacity(self.entries.len() * VolumeEntry::SIZE);

        let mut next = 0u32;
        for entry in &self.entries {
            out.extend_from_slice(&cipher::encode(&entry.payload));
            table.extend_from_slice(&entry.record(entry.offset.unwrap_or(next)));
            next += entry.payload.len() as u32;
        }

        out.extend_from_slice(&cipher::encode(&table));
        let delta = (out.len() + VolumeFooter::SIZE - self.prefix.len()) as u32;
        out.extend_from_slice(&encoded_footer(self.entries.len() as u16, delta));
        out
    }
}

/// An obfuscated footer on its own.
pub fn encoded_footer(entry_count: u16, data_base_delta: u32) -> Vec<u8> {
    let mut plain = Vec::with_capacity(VolumeFooter::SIZE);
    plain.extend_from_slice(&VolumeFooter::MAGIC);
    plain.extend_from_slice(&0u32.to_le_bytes());
    plain.extend_from_slice(&entry_count.to_le_bytes());
    plain.extend_from_slice(&data_base_delta.to_le_bytes());
    cipher::encode(&plain)
}

/// Greedy packer producing streams the decompressor accepts.
pub fn compress(data: &[u8], escape: u8) -> Vec<u8> {
    const MIN_MATCH: usize = 4;

    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let mut best = (0, 0);
        if pos > 0 {
            for distance in 0..=MAX_DISTANCE.min(pos - 1) {
                let src = pos - distance - 1;
                let mut len = 0;
                while len < MAX_COUNT
                    && pos + len < data.len()
                    && data[src + len] == data[pos + len]
                {
                    len += 1;
                }
                if len > best.0 {
                    best = (len, distance);
                }
            }
        }

        let (len, distance) = best;
        if len >= MIN_MATCH {
            let word = ((len as u16) << 10) | distance as u16;
            out.extend_from_slice(&[escape, word as u8, (word >> 8) as u8]);
            pos += len;
        } else if data[pos] == escape {
            out.extend_from_slice(&[escape, 0, 0]);
            pos += 1;
        } else {
            out.push(data[pos]);
            pos += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_roundtrips_through_expand() {
        let data = b"abababababab\xE5\xE5\xE5 tail abababab".repeat(30);
        let packed = compress(&data, 0xE5);
        assert!(packed.len() < data.len());
        assert_eq!(
            crate::decompress::expand(&packed, 0xE5, data.len()).unwrap(),
            data
        );
    }
}
