//! Process-wide registry of trajectory formats

use std::path::Path;
use std::sync::{OnceLock, RwLock};

use crate::error::{Error, Result};
use crate::files::{Compression, OpenMode, SharedMemoryBuffer};
use crate::formats::{amber_netcdf, dcd, xyz, Format};

/// Static description of a format: identification and capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatMetadata {
    /// Name of the format, used in format hints (e.g. "XYZ")
    pub name: &'static str,
    /// Primary file extension, with the leading dot (e.g. ".xyz")
    pub extension: Option<&'static str>,
    /// Short human-readable description
    pub description: &'static str,
    /// Link to a description of the format
    pub reference: &'static str,

    /// The format can read files
    pub read: bool,
    /// The format can write files
    pub write: bool,
    /// The format supports in-memory I/O
    pub memory: bool,

    /// The format stores atomic positions
    pub positions: bool,
    /// The format stores atomic velocities
    pub velocities: bool,
    /// The format stores the unit cell
    pub unit_cell: bool,
    /// The format stores atom names and types
    pub atoms: bool,
    /// The format stores bonds
    pub bonds: bool,
    /// The format stores residues
    pub residues: bool,
}

/// Function creating a format implementation for an on-disk file
pub type FormatCreator = fn(&Path, OpenMode, Compression) -> crate::error::Result<Box<dyn Format>>;

/// Function creating a format implementation for an in-memory buffer
pub type MemoryFormatCreator =
    fn(SharedMemoryBuffer, OpenMode, Compression) -> crate::error::Result<Box<dyn Format>>;

/// A format registered for lookup by name or extension
#[derive(Clone, Debug)]
pub struct RegisteredFormat {
    /// Description and capabilities of the format
    pub metadata: FormatMetadata,
    /// Creator for file-backed trajectories
    pub creator: FormatCreator,
    /// Creator for memory-backed trajectories, if supported
    pub memory_creator: Option<MemoryFormatCreator>,
}

fn builtin_formats() -> Vec<RegisteredFormat> {
    vec![
        RegisteredFormat {
            metadata: xyz::METADATA,
            creator: xyz::creator,
            memory_creator: Some(xyz::memory_creator),
        },
        RegisteredFormat {
            metadata: dcd::METADATA,
            creator: dcd::creator,
            memory_creator: None,
        },
        RegisteredFormat {
            metadata: amber_netcdf::METADATA,
            creator: amber_netcdf::creator,
            memory_creator: None,
        },
    ]
}

static REGISTRY: OnceLock<RwLock<Vec<RegisteredFormat>>> = OnceLock::new();

fn registry() -> &'static RwLock<Vec<RegisteredFormat>> {
    REGISTRY.get_or_init(|| RwLock::new(builtin_formats()))
}

/// Get the format registered under `name`
pub fn by_name(name: &str) -> Result<RegisteredFormat> {
    let formats = registry().read().expect("format registry lock poisoned");
    formats
        .iter()
        .find(|format| format.metadata.name == name)
        .cloned()
        .ok_or_else(|| Error::Format(format!("can not find a format named '{}'", name)))
}

/// Get the format registered for the file extension `extension`
/// (including the leading dot)
pub fn by_extension(extension: &str) -> Result<RegisteredFormat> {
    let formats = registry().read().expect("format registry lock poisoned");
    formats
        .iter()
        .find(|format| format.metadata.extension == Some(extension))
        .cloned()
        .ok_or_else(|| {
            Error::Format(format!(
                "can not find a format associated with the '{}' extension",
                extension
            ))
        })
}

/// Register a new format, refusing duplicate names or extensions
pub fn add_format(format: RegisteredFormat) -> Result<()> {
    let mut formats = registry().write().expect("format registry lock poisoned");

    if formats.iter().any(|f| f.metadata.name == format.metadata.name) {
        return Err(Error::Format(format!(
            "there is already a format named '{}' in the registry",
            format.metadata.name
        )));
    }
    if format.metadata.extension.is_some()
        && formats
            .iter()
            .any(|f| f.metadata.extension == format.metadata.extension)
    {
        return Err(Error::Format(format!(
            "there is already a format for the '{}' extension in the registry",
            format.metadata.extension.unwrap_or("")
        )));
    }

    formats.push(format);
    Ok(())
}

/// Metadata for all registered formats
pub fn formats() -> Vec<FormatMetadata> {
    registry()
        .read()
        .expect("format registry lock poisoned")
        .iter()
        .map(|format| format.metadata)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("XYZ").unwrap().metadata.extension, Some(".xyz"));
        assert_eq!(by_name("DCD").unwrap().metadata.name, "DCD");
        assert_eq!(by_name("Amber NetCDF").unwrap().metadata.extension, Some(".nc"));

        let error = by_name("unknown").unwrap_err();
        assert_eq!(
            error.to_string(),
            "format error: can not find a format named 'unknown'"
        );
    }

    #[test]
    fn test_by_extension() {
        assert_eq!(by_extension(".dcd").unwrap().metadata.name, "DCD");
        assert!(by_extension(".pdf").is_err());
    }

    #[test]
    fn test_capabilities() {
        let xyz = by_name("XYZ").unwrap().metadata;
        assert!(xyz.read && xyz.write && xyz.memory);
        assert!(xyz.positions && xyz.atoms);
        assert!(!xyz.velocities && !xyz.unit_cell);

        let dcd = by_name("DCD").unwrap().metadata;
        assert!(dcd.read && dcd.write && !dcd.memory);
        assert!(dcd.positions && dcd.unit_cell);
        assert!(!dcd.atoms);
    }

    #[test]
    fn test_no_duplicated_formats() {
        let xyz = by_name("XYZ").unwrap();
        assert!(add_format(xyz).is_err());
    }
}
