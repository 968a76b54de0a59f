//! Common utilities for the Heartlight tools.
//!
//! This crate provides the foundational pieces shared by the Heartlight crates:
//!
//! - [`BinaryReader`] - Zero-copy little-endian reading from byte slices
//! - [`Error`] - Errors raised while walking fixed binary layouts

mod error;
mod reader;

pub use error::{Error, Result};
pub use reader::BinaryReader;

/// Re-export memchr for fast terminator scanning
pub use memchr;
