//! Molio - a library for reading and writing molecular trajectory files
//!
//! This library lets simulation and analysis tools exchange atomic
//! coordinates, topologies and per-frame metadata across many chemistry
//! file formats, without caring about format-specific byte layouts.
//!
//! ## Features
//!
//! - Multiple file format support (XYZ, DCD, Amber NetCDF), text and
//!   binary, with transparent gzip/bzip2/xz decompression
//! - One data model for all formats: frames, topologies, residues,
//!   periodic cells and typed properties
//! - Step-by-step reading and random access within a trajectory
//! - In-memory reading and writing for formats that support it
//! - TOML configuration files for atomic type renaming and overrides
//!
//! ## Quick Start
//!
//! ```no_run
//! use molio::{OpenMode, Trajectory};
//!
//! fn main() -> Result<(), molio::Error> {
//!     let mut trajectory = Trajectory::open("water.xyz", OpenMode::Read)?;
//!     while !trajectory.done() {
//!         let frame = trajectory.read()?;
//!         println!("step {} has {} atoms", frame.step(), frame.size());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`] - Core data structures (atoms, residues, topologies, frames)
//! - [`files`] - Low-level file access (text, compressed, binary, NetCDF-3)
//! - [`formats`] - Format implementations and the format registry
//! - [`config`] - TOML configuration files

pub mod config;
pub mod core;
pub mod error;
pub mod files;
pub mod formats;
pub mod trajectory;
pub mod warnings;

// Re-export common types for convenience
pub use crate::core::atom::Atom;
pub use crate::core::cell::{CellShape, UnitCell};
pub use crate::core::element::{element_data, ElementData};
pub use crate::core::frame::Frame;
pub use crate::core::property::{Property, PropertyMap};
pub use crate::core::residue::Residue;
pub use crate::core::topology::{BondOrder, Topology};
pub use crate::core::{Matrix3D, Vector3D};
pub use crate::error::Error;
pub use crate::files::OpenMode;
pub use crate::formats::guess_format;
pub use crate::trajectory::Trajectory;
pub use crate::warnings::set_warning_callback;

/// Version of this library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
