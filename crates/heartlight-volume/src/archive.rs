//! Volume archive reader.
//!
//! The container is mapped into memory once; the footer and file table are
//! decoded when the archive is opened and entry payloads are decoded on
//! demand. All reads go through shared slices of the mapping, so entries can
//! be decoded from several threads at once.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info, warn};

use crate::cipher;
use crate::decompress;
use crate::entry::{self, VolumeEntry};
use crate::footer::VolumeFooter;
use crate::{Error, Result};

/// How to treat uncompressed entries whose stored and decoded sizes differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizePolicy {
    /// Reject the entry.
    #[default]
    Strict,
    /// Keep at most the declared number of bytes and log a warning.
    ///
    /// Surplus stored bytes are dropped; a short entry keeps what is stored.
    Lenient,
}

/// An entry decoded but not yet logged.
#[derive(Debug)]
pub(crate) struct Decoded {
    pub data: Vec<u8>,
    /// Uncompressed entry whose stored and declared sizes differ.
    pub size_mismatch: bool,
}

/// A volume container opened for reading.
///
/// `D` is the backing storage; [`VolumeArchive::open`] maps a file, while
/// [`VolumeArchive::from_bytes`] accepts any in-memory buffer.
pub struct VolumeArchive<D = Mmap> {
    /// Container bytes
    data: D,
    /// Container file name
    name: String,
    /// Decoded footer
    footer: VolumeFooter,
    /// Absolute offset of the data region base
    data_base: u64,
    /// File table in on-disk order
    entries: Vec<VolumeEntry>,
}

impl VolumeArchive<Mmap> {
    /// Open and map a container file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let open_err = |source| Error::Open {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(open_err)?;
        // SAFETY: the mapping is read-only and the container is not expected
        // to change while it is open.
        let mmap = unsafe { Mmap::map(&file) }.map_err(open_err)?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Self::with_name(mmap, name)
    }
}

impl<D: AsRef<[u8]>> VolumeArchive<D> {
    /// Parse a container held in memory.
    pub fn from_bytes(data: D) -> Result<Self> {
        Self::with_name(data, "memory".to_string())
    }

    fn with_name(data: D, name: String) -> Result<Self> {
        let bytes = data.as_ref();
        let length = bytes.len() as u64;

        let footer = VolumeFooter::read(bytes)?;
        let entries = entry::read_table(bytes, &footer)?;
        let data_base = footer.data_base(length)?;

        info!(
            "Found {} file entries in {} (data base {:#x})",
            entries.len(),
            name,
            data_base
        );

        Ok(Self {
            data,
            name,
            footer,
            data_base,
            entries,
        })
    }

    /// Get the container name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the decoded footer.
    #[inline]
    pub fn footer(&self) -> &VolumeFooter {
        &self.footer
    }

    /// Get the absolute offset of the data region base.
    #[inline]
    pub fn data_base(&self) -> u64 {
        self.data_base
    }

    /// Get the container length in bytes.
    #[inline]
    pub fn container_len(&self) -> u64 {
        self.data.as_ref().len() as u64
    }

    /// Check whether the container holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the number of entries.
    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Get the file table in on-disk order.
    #[inline]
    pub fn entries(&self) -> &[VolumeEntry] {
        &self.entries
    }

    /// Iterate over entries in on-disk order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &VolumeEntry> + '_ {
        self.entries.iter()
    }

    /// Get entry by index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&VolumeEntry> {
        self.entries.get(index)
    }

    /// Find an entry by name (case-insensitive).
    pub fn find(&self, name: &str) -> Option<&VolumeEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Absolute offset of an entry's stored bytes.
    #[inline]
    pub fn absolute_offset(&self, entry: &VolumeEntry) -> u64 {
        self.data_base + u64::from(entry.offset)
    }

    /// Get an entry's stored bytes, still obfuscated.
    pub fn raw(&self, entry: &VolumeEntry) -> Result<&[u8]> {
        let data = self.data.as_ref();
        let offset = self.absolute_offset(entry);
        let end = offset + u64::from(entry.stored_size);

        if end > data.len() as u64 {
            return Err(Error::EntryOutOfBounds {
                name: entry.name.clone(),
                offset,
                size: entry.stored_size,
                length: data.len() as u64,
            });
        }

        Ok(&data[offset as usize..end as usize])
    }

    /// Read entry contents, rejecting size mismatches on uncompressed entries.
    pub fn read(&self, entry: &VolumeEntry) -> Result<Vec<u8>> {
        self.read_with(entry, SizePolicy::Strict)
    }

    /// Read entry contents - handles decoding and decompression.
    pub fn read_with(&self, entry: &VolumeEntry, policy: SizePolicy) -> Result<Vec<u8>> {
        let decoded = self.decode(entry, policy)?;
        self.trace_decoded(entry, &decoded);
        Ok(decoded.data)
    }

    /// Decode an entry without logging, so it can run on any thread.
    pub(crate) fn decode(&self, entry: &VolumeEntry, policy: SizePolicy) -> Result<Decoded> {
        let mut data = cipher::decode(self.raw(entry)?);

        if entry.is_compressed {
            let data = decompress::expand(&data, entry.escape_byte, entry.decoded_size as usize)
                .map_err(|source| Error::Decompression {
                    name: entry.name.clone(),
                    offset: self.absolute_offset(entry),
                    source,
                })?;
            return Ok(Decoded {
                data,
                size_mismatch: false,
            });
        }

        let size_mismatch = entry.stored_size != entry.decoded_size;
        if size_mismatch {
            if policy == SizePolicy::Strict {
                return Err(Error::SizeMismatch {
                    name: entry.name.clone(),
                    stored: entry.stored_size,
                    decoded: entry.decoded_size,
                });
            }
            data.truncate(entry.decoded_size as usize);
        }

        Ok(Decoded {
            data,
            size_mismatch,
        })
    }

    /// Log a decoded entry. Callers invoke this in table order.
    pub(crate) fn trace_decoded(&self, entry: &VolumeEntry, decoded: &Decoded) {
        debug!(
            "Decoded {} at {:#x} ({} bytes stored, {} decoded, compressed: {})",
            entry.name,
            self.absolute_offset(entry),
            entry.stored_size,
            decoded.data.len(),
            entry.is_compressed
        );
        if decoded.size_mismatch {
            warn!(
                "{}: stored size {} differs from declared size {}, keeping {} bytes",
                entry.name,
                entry.stored_size,
                entry.decoded_size,
                decoded.data.len()
            );
        }
    }

    /// Read entry by index.
    pub fn read_index(&self, index: usize) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(index)
            .ok_or_else(|| Error::EntryNotFound(format!("#{index}")))?;
        self.read(entry)
    }

    /// Read entry by name (case-insensitive).
    pub fn read_named(&self, name: &str) -> Result<Vec<u8>> {
        let entry = self
            .find(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        self.read(entry)
    }

    /// Parallel decoding of every entry, results in table order.
    ///
    /// Entries are decoded on the rayon pool and logged afterwards in table
    /// order.
    #[cfg(any(feature = "parallel", test))]
    pub fn read_parallel(&self, policy: SizePolicy) -> Vec<Result<Vec<u8>>>
    where
        D: Sync,
    {
        use rayon::prelude::*;

        let decoded: Vec<_> = self
            .entries
            .par_iter()
            .map(|entry| self.decode(entry, policy))
            .collect();

        self.entries
            .iter()
            .zip(decoded)
            .map(|(entry, result)| {
                let decoded = result?;
                self.trace_decoded(entry, &decoded);
                Ok(decoded.data)
            })
            .collect()
    }
}

impl<D> std::fmt::Debug for VolumeArchive<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeArchive")
            .field("name", &self.name)
            .field("data_base", &self.data_base)
            .field("entries", &self.entries.len())
            .finish()
    }
}
