//! Amber NetCDF trajectory format
//!
//! Amber trajectories are NetCDF-3 files (64-bit offset variant) following
//! the AMBER conventions: positions in a `coordinates` record variable,
//! the cell in `cell_lengths`/`cell_angles`, optional `velocities` and
//! per-frame `time`.

use std::collections::BTreeMap;
use std::path::Path;

use crate::core::frame::Frame;
use crate::core::cell::{CellShape, UnitCell};
use crate::core::Vector3D;
use crate::error::{Error, Result};
use crate::files::netcdf3::{NcType, Value, VariableDefinition};
use crate::files::{Compression, Netcdf3Builder, Netcdf3File, OpenMode};
use crate::formats::registry::FormatMetadata;
use crate::formats::Format;
use crate::warnings::warning;

/// Metadata for the Amber NetCDF format
pub const METADATA: FormatMetadata = FormatMetadata {
    name: "Amber NetCDF",
    extension: Some(".nc"),
    description: "Amber conventions for binary NetCDF trajectories",
    reference: "http://ambermd.org/netcdf/nctraj.xhtml",

    read: true,
    write: true,
    memory: false,

    positions: true,
    velocities: true,
    unit_cell: true,
    atoms: false,
    bonds: false,
    residues: false,
};

/// Amber NetCDF format implementation
#[derive(Debug)]
pub struct AmberNetCDFFormat {
    file: Netcdf3File,
    n_atoms: usize,
    /// the file contains (or will contain) velocity data
    with_velocities: bool,
    step: usize,
    buffer: Vec<f32>,
}

pub(crate) fn creator(
    path: &Path,
    mode: OpenMode,
    compression: Compression,
) -> Result<Box<dyn Format>> {
    Ok(Box::new(AmberNetCDFFormat::open(path, mode, compression)?))
}

impl AmberNetCDFFormat {
    /// Open the Amber NetCDF file at `path`
    pub fn open(
        path: impl AsRef<Path>,
        mode: OpenMode,
        compression: Compression,
    ) -> Result<AmberNetCDFFormat> {
        if compression != Compression::None {
            return Err(Error::Format(
                "compression is not supported for NetCDF files".into(),
            ));
        }

        let file = Netcdf3File::open(path, mode)?;
        let mut format = AmberNetCDFFormat {
            file,
            n_atoms: 0,
            with_velocities: false,
            step: 0,
            buffer: Vec::new(),
        };

        if format.file.is_initialized() {
            format.validate()?;
        }

        Ok(format)
    }

    fn validate(&mut self) -> Result<()> {
        let conventions = self
            .file
            .attribute("Conventions")
            .and_then(|value| value.as_str())
            .unwrap_or("");
        if !conventions.contains("AMBER") {
            return Err(Error::Format(format!(
                "this NetCDF file does not follow the AMBER conventions (got '{}')",
                conventions
            )));
        }

        let version = self
            .file
            .attribute("ConventionVersion")
            .and_then(|value| value.as_str())
            .unwrap_or("");
        if version != "1.0" {
            warning(
                "Amber NetCDF reader",
                format!("unknown convention version '{}', trying to read anyway", version),
            );
        }

        if !self.file.has_variable("coordinates") {
            return Err(Error::Format(
                "missing the 'coordinates' variable in this NetCDF file".into(),
            ));
        }

        let atom = self
            .file
            .dimension("atom")
            .ok_or_else(|| Error::Format("missing the 'atom' dimension in this NetCDF file".into()))?;
        self.n_atoms = atom.size as usize;
        self.with_velocities = self.file.has_variable("velocities");

        Ok(())
    }

    fn read_step_impl(&mut self, step: usize, frame: &mut Frame) -> Result<()> {
        self.step = step;
        frame.resize(self.n_atoms);

        self.buffer.resize(3 * self.n_atoms, 0.0);
        self.file.read_variable_f32("coordinates", step, &mut self.buffer)?;
        let positions = frame.positions_mut();
        for (i, position) in positions.iter_mut().enumerate() {
            *position = Vector3D::new(
                f64::from(self.buffer[3 * i]),
                f64::from(self.buffer[3 * i + 1]),
                f64::from(self.buffer[3 * i + 2]),
            );
        }

        if self.file.has_variable("cell_lengths") {
            let mut lengths = [0.0_f64; 3];
            self.file.read_variable_f64("cell_lengths", step, &mut lengths)?;

            let mut angles = [90.0_f64; 3];
            if self.file.has_variable("cell_angles") {
                self.file.read_variable_f64("cell_angles", step, &mut angles)?;
            }

            let cell = UnitCell::from_lengths_angles(
                lengths[0], lengths[1], lengths[2], angles[0], angles[1], angles[2],
            )?;
            frame.set_cell(cell);
        }

        if self.with_velocities {
            self.file.read_variable_f32("velocities", step, &mut self.buffer)?;
            frame.add_velocities();
            if let Some(velocities) = frame.velocities_mut() {
                for (i, velocity) in velocities.iter_mut().enumerate() {
                    *velocity = Vector3D::new(
                        f64::from(self.buffer[3 * i]),
                        f64::from(self.buffer[3 * i + 1]),
                        f64::from(self.buffer[3 * i + 2]),
                    );
                }
            }
        }

        if self.file.has_variable("time") {
            let mut time = [0.0_f32];
            self.file.read_variable_f32("time", step, &mut time)?;
            frame.set("time", f64::from(time[0]));
        }

        Ok(())
    }

    fn initialize(&mut self, frame: &Frame) -> Result<()> {
        self.n_atoms = frame.size();
        self.with_velocities = frame.velocities().is_some();

        let mut builder = Netcdf3Builder::new();
        let frame_dim = builder.add_dimension("frame", 0)?;
        let spatial = builder.add_dimension("spatial", 3)?;
        let atom = builder.add_dimension("atom", self.n_atoms as i32)?;
        let cell_spatial = builder.add_dimension("cell_spatial", 3)?;
        let cell_angular = builder.add_dimension("cell_angular", 3)?;
        let label = builder.add_dimension("label", 10)?;

        builder.add_attribute("Conventions", Value::String("AMBER".into()))?;
        builder.add_attribute("ConventionVersion", Value::String("1.0".into()))?;
        builder.add_attribute("program", Value::String("molio".into()))?;
        builder.add_attribute(
            "programVersion",
            Value::String(env!("CARGO_PKG_VERSION").into()),
        )?;

        builder.add_variable(
            "spatial",
            VariableDefinition {
                nc_type: NcType::Char,
                dimensions: vec![spatial],
                attributes: BTreeMap::new(),
            },
        )?;
        builder.add_variable(
            "cell_spatial",
            VariableDefinition {
                nc_type: NcType::Char,
                dimensions: vec![cell_spatial],
                attributes: BTreeMap::new(),
            },
        )?;
        builder.add_variable(
            "cell_angular",
            VariableDefinition {
                nc_type: NcType::Char,
                dimensions: vec![cell_angular, label],
                attributes: BTreeMap::new(),
            },
        )?;

        let units = |unit: &str| {
            BTreeMap::from([("units".to_string(), Value::String(unit.into()))])
        };

        builder.add_variable(
            "time",
            VariableDefinition {
                nc_type: NcType::Float,
                dimensions: vec![frame_dim],
                attributes: units("picosecond"),
            },
        )?;
        builder.add_variable(
            "coordinates",
            VariableDefinition {
                nc_type: NcType::Float,
                dimensions: vec![frame_dim, atom, spatial],
                attributes: units("angstrom"),
            },
        )?;
        builder.add_variable(
            "cell_lengths",
            VariableDefinition {
                nc_type: NcType::Double,
                dimensions: vec![frame_dim, cell_spatial],
                attributes: units("angstrom"),
            },
        )?;
        builder.add_variable(
            "cell_angles",
            VariableDefinition {
                nc_type: NcType::Double,
                dimensions: vec![frame_dim, cell_angular],
                attributes: units("degree"),
            },
        )?;

        if self.with_velocities {
            builder.add_variable(
                "velocities",
                VariableDefinition {
                    nc_type: NcType::Float,
                    dimensions: vec![frame_dim, atom, spatial],
                    attributes: units("angstrom/picosecond"),
                },
            )?;
        }

        builder.initialize(&mut self.file)?;

        self.file.write_variable_char("spatial", 0, b"xyz")?;
        self.file.write_variable_char("cell_spatial", 0, b"abc")?;
        let mut labels = Vec::with_capacity(30);
        for name in ["alpha", "beta", "gamma"] {
            let mut label = name.as_bytes().to_vec();
            label.resize(10, 0);
            labels.extend(label);
        }
        self.file.write_variable_char("cell_angular", 0, &labels)?;

        Ok(())
    }
}

impl Format for AmberNetCDFFormat {
    fn n_steps(&mut self) -> Result<usize> {
        Ok(self.file.n_records() as usize)
    }

    fn read(&mut self, frame: &mut Frame) -> Result<()> {
        self.read_step_impl(self.step, frame)?;
        self.step += 1;
        Ok(())
    }

    fn read_step(&mut self, step: usize, frame: &mut Frame) -> Result<()> {
        if step as u64 >= self.file.n_records() {
            return Err(Error::OutOfBounds(format!(
                "step {} is out of bounds for a file with {} steps",
                step,
                self.file.n_records()
            )));
        }
        self.read_step_impl(step, frame)
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        if !self.file.is_initialized() {
            self.initialize(frame)?;
        } else if frame.size() != self.n_atoms {
            return Err(Error::Format(format!(
                "this file was initialized with {} atoms, can not write a frame with {} atoms to it",
                self.n_atoms,
                frame.size()
            )));
        }

        self.file.add_record()?;
        let step = (self.file.n_records() - 1) as usize;

        self.buffer.clear();
        for position in frame.positions() {
            self.buffer.push(position[0] as f32);
            self.buffer.push(position[1] as f32);
            self.buffer.push(position[2] as f32);
        }
        let buffer = std::mem::take(&mut self.buffer);
        self.file.write_variable_f32("coordinates", step, &buffer)?;
        self.buffer = buffer;

        let cell = frame.cell();
        if cell.shape() == CellShape::Infinite {
            self.file.write_variable_f64("cell_lengths", step, &[0.0, 0.0, 0.0])?;
            self.file
                .write_variable_f64("cell_angles", step, &[90.0, 90.0, 90.0])?;
        } else {
            let lengths = cell.lengths();
            let angles = cell.angles();
            self.file
                .write_variable_f64("cell_lengths", step, &[lengths[0], lengths[1], lengths[2]])?;
            self.file
                .write_variable_f64("cell_angles", step, &[angles[0], angles[1], angles[2]])?;
        }

        if self.with_velocities {
            match frame.velocities() {
                Some(velocities) => {
                    self.buffer.clear();
                    for velocity in velocities {
                        self.buffer.push(velocity[0] as f32);
                        self.buffer.push(velocity[1] as f32);
                        self.buffer.push(velocity[2] as f32);
                    }
                    let buffer = std::mem::take(&mut self.buffer);
                    self.file.write_variable_f32("velocities", step, &buffer)?;
                    self.buffer = buffer;
                }
                None => warning(
                    "Amber NetCDF writer",
                    "this file contains velocity data, but this frame does not; \
                     fill values will be written instead",
                ),
            }
        }

        if let Some(time) = frame.get("time").and_then(|property| property.as_double()) {
            self.file.write_variable_f32("time", step, &[time as f32])?;
        }

        self.step = step + 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atom::Atom;

    fn temporary_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("molio-amber-{}-{}", std::process::id(), name));
        path
    }

    fn example_frame() -> Frame {
        let mut frame = Frame::with_cell(UnitCell::from_lengths(15.0, 15.0, 15.0).unwrap());
        frame.add_atom(Atom::new("O"), Vector3D::new(0.0, 0.0, 0.0));
        frame.add_atom(Atom::new("H"), Vector3D::new(0.75, 0.58, 0.0));
        frame.set("time", 12.5);
        frame
    }

    #[test]
    fn test_write_and_read() {
        let path = temporary_path("roundtrip.nc");

        {
            let mut format = AmberNetCDFFormat::open(&path, OpenMode::Write, Compression::None).unwrap();
            let mut frame = example_frame();
            format.write(&frame).unwrap();

            frame.positions_mut()[0] = Vector3D::new(1.0, 1.0, 1.0);
            frame.set("time", 13.0);
            format.write(&frame).unwrap();
        }

        let mut format = AmberNetCDFFormat::open(&path, OpenMode::Read, Compression::None).unwrap();
        assert_eq!(format.n_steps().unwrap(), 2);

        let mut frame = Frame::new();
        format.read(&mut frame).unwrap();
        assert_eq!(frame.size(), 2);
        assert!((frame.positions()[1] - Vector3D::new(0.75, 0.58, 0.0)).norm() < 1e-6);
        assert!((frame.cell().lengths() - Vector3D::new(15.0, 15.0, 15.0)).norm() < 1e-6);
        assert_eq!(frame.get("time").unwrap().as_double(), Some(12.5));

        format.read(&mut frame).unwrap();
        assert!((frame.positions()[0] - Vector3D::new(1.0, 1.0, 1.0)).norm() < 1e-6);
        assert_eq!(frame.get("time").unwrap().as_double(), Some(13.0));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_velocities() {
        let path = temporary_path("velocities.nc");

        {
            let mut format = AmberNetCDFFormat::open(&path, OpenMode::Write, Compression::None).unwrap();
            let mut frame = Frame::new();
            frame.add_atom_with_velocity(
                Atom::new("C"),
                Vector3D::new(1.0, 2.0, 3.0),
                Vector3D::new(0.1, 0.2, 0.3),
            );
            format.write(&frame).unwrap();
        }

        let mut format = AmberNetCDFFormat::open(&path, OpenMode::Read, Compression::None).unwrap();
        let mut frame = Frame::new();
        format.read(&mut frame).unwrap();

        let velocities = frame.velocities().unwrap();
        assert!((velocities[0] - Vector3D::new(0.1, 0.2, 0.3)).norm() < 1e-6);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_not_an_amber_file() {
        let path = temporary_path("not-amber.nc");

        {
            let mut file = Netcdf3File::open(&path, OpenMode::Write).unwrap();
            let mut builder = Netcdf3Builder::new();
            builder.add_dimension("frame", 0).unwrap();
            builder
                .add_attribute("Conventions", Value::String("SOMETHING ELSE".into()))
                .unwrap();
            builder.initialize(&mut file).unwrap();
        }

        let error = AmberNetCDFFormat::open(&path, OpenMode::Read, Compression::None).unwrap_err();
        assert!(matches!(error, Error::Format(_)));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append() {
        let path = temporary_path("append.nc");

        {
            let mut format = AmberNetCDFFormat::open(&path, OpenMode::Write, Compression::None).unwrap();
            format.write(&example_frame()).unwrap();
        }
        {
            let mut format = AmberNetCDFFormat::open(&path, OpenMode::Append, Compression::None).unwrap();
            assert_eq!(format.n_steps().unwrap(), 1);
            format.write(&example_frame()).unwrap();
        }

        let mut format = AmberNetCDFFormat::open(&path, OpenMode::Read, Compression::None).unwrap();
        assert_eq!(format.n_steps().unwrap(), 2);

        std::fs::remove_file(&path).unwrap();
    }
}
