//! Reader for the asset volume appended to the Heartlight executable.
//!
//! The game ships its graphics and sound assets as a packed volume glued to
//! the tail of `HL.EXE`. The volume consists of:
//!
//! - a data region holding each asset's stored bytes
//! - a file table of fixed 32-byte records, directly before the footer
//! - a 16-byte footer at the very end, starting with the magic `volume`
//!
//! Every region is obfuscated with a simple XOR keystream (see [`cipher`])
//! and compressed assets use a byte-oriented LZ scheme with a per-entry
//! escape byte (see [`decompress`]).
//!
//! With the `parallel` feature, entries can be decoded on a rayon pool.
//!
//! # Example
//!
//! ```no_run
//! use heartlight_volume::{Extractor, VolumeArchive};
//!
//! let archive = VolumeArchive::open("HL.EXE")?;
//!
//! for entry in archive.iter() {
//!     println!("{}: {} bytes", entry.name, entry.decoded_size);
//! }
//!
//! // Read a specific file
//! let sprite = archive.read_named("HEART.GGS")?;
//!
//! // Or write everything to a directory
//! Extractor::new(&archive, "extracted").run()?;
//! # Ok::<(), heartlight_volume::Error>(())
//! ```

mod archive;
pub mod cipher;
pub mod decompress;
mod entry;
mod error;
mod extract;
mod footer;

#[cfg(test)]
mod fixture;

pub use archive::{SizePolicy, VolumeArchive};
pub use decompress::{expand, DecompressError};
pub use entry::{read_table, VolumeEntry};
pub use error::{Error, ErrorKind, Result};
pub use extract::{ExtractOptions, ExtractSummary, Extractor};
pub use footer::VolumeFooter;
