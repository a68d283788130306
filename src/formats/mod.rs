//! Trajectory file formats
//!
//! Every format implements the [`Format`] trait and registers itself with a
//! [`FormatMetadata`](registry::FormatMetadata) describing its
//! capabilities. Formats are looked up by name or file extension through
//! the process-wide registry.

pub mod amber_netcdf;
pub mod dcd;
pub mod guess;
pub mod registry;
pub mod xyz;

pub use amber_netcdf::AmberNetCDFFormat;
pub use dcd::DCDFormat;
pub use guess::guess_format;
pub use registry::{FormatMetadata, RegisteredFormat};
pub use xyz::XYZFormat;

use crate::core::frame::Frame;
use crate::error::Result;

/// A single trajectory file format: per-step reading and writing
pub trait Format: Send {
    /// Number of steps in the file
    fn n_steps(&mut self) -> Result<usize>;

    /// Read the next step into `frame` and advance the cursor
    fn read(&mut self, frame: &mut Frame) -> Result<()>;

    /// Read the given step into `frame`, setting the cursor to that step
    fn read_step(&mut self, step: usize, frame: &mut Frame) -> Result<()>;

    /// Append one step to the file
    fn write(&mut self, frame: &Frame) -> Result<()>;
}
