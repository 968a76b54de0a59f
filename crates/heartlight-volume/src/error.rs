//! Error types for the volume crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::decompress::DecompressError;

/// Broad classification of a failure.
///
/// Every failure is fatal to an extraction run; the kind only tells the
/// caller whether the container itself is unrecognised, the environment
/// failed, or an asset's payload is damaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input is not a recognised container or its geometry is inconsistent.
    Format,
    /// Reading the container or writing an artifact failed.
    Io,
    /// An entry's payload cannot be reconstructed to its declared size.
    Corruption,
}

/// Errors that can occur when working with volume containers.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] heartlight_common::Error),

    /// Failed to open or map the container.
    #[error("failed to open container '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Footer magic did not decode to `volume`.
    #[error("not a volume container: footer magic is {actual:02x?}, expected \"volume\"")]
    InvalidMagic { actual: [u8; 6] },

    /// The container is too short for the footer or file table it declares.
    #[error("container truncated: {needed} bytes required, {available} available")]
    Truncated { needed: u64, available: u64 },

    /// The footer points the data region before the start of the container.
    #[error("data base delta {delta:#x} exceeds container length {length:#x}")]
    DataBaseOutOfRange { delta: u32, length: u64 },

    /// An entry name cannot be used as an output file name.
    #[error("entry {index} has unusable name {name:?}")]
    InvalidEntryName { index: usize, name: String },

    /// An entry's stored region lies outside the container.
    #[error("entry {name}: region {offset:#x}+{size:#x} lies outside container of {length:#x} bytes")]
    EntryOutOfBounds {
        name: String,
        offset: u64,
        size: u32,
        length: u64,
    },

    /// Decompression of an entry failed.
    #[error("entry {name} at {offset:#x}: {source}")]
    Decompression {
        name: String,
        offset: u64,
        #[source]
        source: DecompressError,
    },

    /// An uncompressed entry's stored and decoded sizes disagree.
    #[error("entry {name}: stored size {stored} does not match decoded size {decoded}")]
    SizeMismatch {
        name: String,
        stored: u32,
        decoded: u32,
    },

    /// Writing an artifact failed.
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry not found.
    #[error("entry not found: {0}")]
    EntryNotFound(String),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMagic { .. }
            | Self::Truncated { .. }
            | Self::DataBaseOutOfRange { .. }
            | Self::InvalidEntryName { .. }
            | Self::Common(_) => ErrorKind::Format,
            Self::Io(_)
            | Self::Open { .. }
            | Self::EntryOutOfBounds { .. }
            | Self::Write { .. }
            | Self::EntryNotFound(_) => ErrorKind::Io,
            Self::Decompression { .. } | Self::SizeMismatch { .. } => ErrorKind::Corruption,
        }
    }
}

/// Result type for volume operations.
pub type Result<T> = std::result::Result<T, Error>;
