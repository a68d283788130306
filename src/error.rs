//! Error types shared across the whole crate

use thiserror::Error;

/// Error types for trajectory I/O
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// OS-level I/O failure, compression codec failure, or a path that can
    /// not be opened
    #[error("file error: {0}")]
    File(String),

    /// Malformed file contents, inconsistent header, or unknown format
    /// name/extension
    #[error("format error: {0}")]
    Format(String),

    /// Allocation failure or size overflow (e.g. a u64 offset that does not
    /// fit in usize on this platform)
    #[error("memory error: {0}")]
    Memory(String),

    /// Raised by the selection engine
    #[error("selection error: {0}")]
    Selection(String),

    /// Bad TOML, or a configuration file explicitly requested but missing
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Indexing an atom, step, or dimension past declared bounds
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// Property present with the wrong kind, or missing where required
    #[error("property error: {0}")]
    Property(String),

    /// Anything else raised by the library itself
    #[error("{0}")]
    Generic(String),
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::File(error.to_string())
    }
}

/// Result type used by all fallible operations in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Convert a u64 file offset or count to usize, failing on 32-bit platforms
/// where it does not fit.
pub(crate) fn checked_usize(value: u64) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| Error::Memory(format!("{} is too large for this platform", value)))
}
