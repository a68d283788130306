//! Low-level file access
//!
//! This module provides the byte-level building blocks used by the format
//! implementations: buffered text files with transparent decompression,
//! endian-normalised random-access binary files, in-memory buffers, and the
//! NetCDF-3 container.

pub mod binary;
pub mod bz2;
pub mod gz;
pub mod memory;
pub mod netcdf3;
pub mod plain;
pub mod text;
pub mod xz;

pub use binary::{BinaryFile, Endianness};
pub use memory::{MemoryBuffer, SharedMemoryBuffer};
pub use netcdf3::{Netcdf3Builder, Netcdf3File};
pub use text::TextFile;

/// Mode used to open a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file for reading
    Read,
    /// Create or truncate a file for writing
    Write,
    /// Open or create a file, writing at the end
    Append,
}

impl OpenMode {
    /// Parse a single-character mode specifier: 'r', 'w' or 'a' (any case)
    pub fn from_char(mode: char) -> crate::error::Result<OpenMode> {
        match mode {
            'r' | 'R' => Ok(OpenMode::Read),
            'w' | 'W' => Ok(OpenMode::Write),
            'a' | 'A' => Ok(OpenMode::Append),
            _ => Err(crate::error::Error::File(format!("unknown file mode '{}'", mode))),
        }
    }
}

/// Compression method applied to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Plain text or binary data
    None,
    /// gzip compression (.gz)
    Gzip,
    /// bzip2 compression (.bz2)
    Bzip2,
    /// lzma compression (.xz)
    Lzma,
}
