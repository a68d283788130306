//! DCD file format reader and writer
//!
//! DCD is the Fortran-unformatted binary trajectory format used by CHARMM,
//! NAMD and X-PLOR. Every logical record is framed by a marker giving its
//! byte length; the marker may be 32 or 64-bit wide, in either byte order,
//! so the reader detects both from the first bytes of the file.
//!
//! Two historical variants coexist: CHARMM files (non-zero version in the
//! header) store an optional unit cell and a 32-bit timestep, X-PLOR files
//! use a 64-bit timestep and no cell.

use std::path::Path;

use crate::core::cell::{is_upper_triangular, CellShape, UnitCell};
use crate::core::frame::Frame;
use crate::core::{Matrix3D, Vector3D};
use crate::error::{Error, Result};
use crate::files::{BinaryFile, Compression, Endianness, OpenMode};
use crate::formats::registry::FormatMetadata;
use crate::formats::Format;
use crate::warnings::warning;

/// Metadata for the DCD format
pub const METADATA: FormatMetadata = FormatMetadata {
    name: "DCD",
    extension: Some(".dcd"),
    description: "DCD binary format",
    reference: "https://web.archive.org/web/20070406065433/http://www.bio.unizh.ch/docu/acc_docs/doc/charmm_principles/Ch04_mol_dyn.FM5.html",

    read: true,
    write: true,
    memory: false,

    positions: true,
    velocities: false,
    unit_cell: true,
    atoms: false,
    bonds: false,
    residues: false,
};

/// cell angles stored as cosines are turned back into degrees
fn cos_to_angle_degrees(cos: f64) -> f64 {
    90.0 - cos.asin().to_degrees()
}

fn checked_cast(value: i64) -> Result<u64> {
    if value < 0 {
        return Err(Error::Format(format!(
            "invalid value in DCD file: expected a positive integer, got {}",
            value
        )));
    }
    Ok(value as u64)
}

#[derive(Debug, Clone, Copy, Default)]
struct DcdOptions {
    charmm_format: bool,
    charmm_unitcell: bool,
    charmm_version: u8,
    use_64_bit_markers: bool,
    has_4d_data: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct DcdTimesteps {
    start: u64,
    stride: u64,
    dt: f64,
}

#[derive(Debug, Clone, Copy)]
struct FixedAtom {
    fixed: bool,
    /// index in the coordinate records of the frames after the first one
    free_index: usize,
    /// coordinate captured from the first frame, for fixed atoms
    coord: Vector3D,
}

/// DCD format implementation
#[derive(Debug)]
pub struct DCDFormat {
    file: BinaryFile,
    options: DcdOptions,
    timesteps: DcdTimesteps,
    title: String,
    n_frames: usize,
    n_atoms: usize,
    n_free_atoms: usize,
    /// per-atom data, only used when the file contains fixed atoms
    fixed_atoms: Vec<FixedAtom>,
    header_size: u64,
    first_frame_size: u64,
    frame_size: u64,
    step: usize,
    buffer: Vec<f32>,
}

pub(crate) fn creator(
    path: &Path,
    mode: OpenMode,
    compression: Compression,
) -> Result<Box<dyn Format>> {
    Ok(Box::new(DCDFormat::open(path, mode, compression)?))
}

/// Detect the byte order and marker width of a DCD file from its first
/// bytes: the initial record marker (always 84) followed by "CORD".
fn open_dcd_file(path: &Path, mode: OpenMode) -> Result<(BinaryFile, bool)> {
    if mode == OpenMode::Write {
        return Ok((BinaryFile::open_native(path, mode)?, false));
    }

    let mut file = BinaryFile::open(path, mode, Endianness::Little)?;
    if mode == OpenMode::Append && file.file_size() == 0 {
        file.set_endianness(Endianness::native());
        return Ok((file, false));
    }

    file.seek(0);
    let mut data = [0_u8; 8];
    file.read_bytes(&mut data)?;

    if data[0] == 84 && data[1] == 0 && data[2] == 0 && data[3] == 0 {
        if &data[4..8] == b"CORD" {
            return Ok((file, false));
        } else if data[4..8] == [0, 0, 0, 0] {
            // might be 64-bit record markers, look for CORD after them
            let mut extra = [0_u8; 4];
            file.read_bytes(&mut extra)?;
            if &extra == b"CORD" {
                return Ok((file, true));
            }
        }
    } else if data[0] == 0 && data[1] == 0 && data[2] == 0 {
        if data[3] == 84 && &data[4..8] == b"CORD" {
            file.set_endianness(Endianness::Big);
            return Ok((file, false));
        } else if data[3] == 0 && data[4] == 0 && data[5] == 0 && data[6] == 0 && data[7] == 84 {
            let mut extra = [0_u8; 4];
            file.read_bytes(&mut extra)?;
            if &extra == b"CORD" {
                file.set_endianness(Endianness::Big);
                return Ok((file, true));
            }
        }
    }

    Err(Error::Format(format!(
        "this is not a DCD file, first 8 bytes are {:#04x} {:#04x} {:#04x} {:#04x} {:#04x} {:#04x} {:#04x} {:#04x}",
        data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7]
    )))
}

impl DCDFormat {
    /// Open the DCD file at `path`
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, compression: Compression) -> Result<DCDFormat> {
        let path = path.as_ref();
        if compression != Compression::None {
            return Err(Error::Format("compression is not supported for DCD files".into()));
        }

        let (file, use_64_bit_markers) = open_dcd_file(path, mode)
            .map_err(|e| Error::Format(format!("unable to open '{}': {}", path.display(), e)))?;

        let mut format = DCDFormat {
            file,
            options: DcdOptions {
                use_64_bit_markers,
                ..DcdOptions::default()
            },
            timesteps: DcdTimesteps::default(),
            title: String::new(),
            n_frames: 0,
            n_atoms: 0,
            n_free_atoms: 0,
            fixed_atoms: Vec::new(),
            header_size: 0,
            first_frame_size: 0,
            frame_size: 0,
            step: 0,
            buffer: Vec::new(),
        };

        if mode == OpenMode::Write || (mode == OpenMode::Append && format.file.file_size() == 0) {
            return Ok(format);
        }

        format.file.seek(0);
        format.read_header()?;

        if mode == OpenMode::Append {
            if format.options.has_4d_data {
                return Err(Error::Format("can not append to a file with 4D data".into()));
            }
            if format.options.use_64_bit_markers {
                return Err(Error::Format("can not append to a file with 64-bit markers".into()));
            }
            if !format.fixed_atoms.is_empty() {
                return Err(Error::Format("can not append to a file with fixed atoms".into()));
            }
            let size = format.file.file_size();
            format.file.seek(size);
        }

        Ok(format)
    }

    fn read_marker(&mut self) -> Result<u64> {
        if self.options.use_64_bit_markers {
            checked_cast(self.file.read_i64()?)
        } else {
            checked_cast(i64::from(self.file.read_i32()?))
        }
    }

    fn expect_marker(&mut self, size: u64) -> Result<()> {
        let marker = self.read_marker()?;
        if marker != size {
            return Err(Error::Format(format!(
                "invalid fortran record marker, expected {} got {}",
                size, marker
            )));
        }
        Ok(())
    }

    fn write_marker(&mut self, size: u64) -> Result<()> {
        if self.options.use_64_bit_markers {
            self.file.write_i64(size as i64)
        } else {
            self.file.write_i32(size as i32)
        }
    }

    fn read_header(&mut self) -> Result<()> {
        let header_size = self.read_marker()?;
        if header_size != 84 {
            return Err(Error::Format(format!(
                "invalid DCD header record size, expected 84 got {}",
                header_size
            )));
        }

        // the last integer of the header tells the format variant apart
        let header_start = self.file.tell();
        self.file.seek(header_start + 80);
        let charmm_version = self.file.read_i32()?;
        self.options.charmm_version = charmm_version as u8;
        self.options.charmm_format = charmm_version != 0;

        // the first 4 bytes are the "CORD" magic
        self.file.seek(header_start + 4);
        self.n_frames = checked_cast(i64::from(self.file.read_i32()?))? as usize;
        self.timesteps.start = checked_cast(i64::from(self.file.read_i32()?))?;
        self.timesteps.stride = checked_cast(i64::from(self.file.read_i32()?))?;

        // 20 unused bytes
        self.file.skip(20);
        let n_fixed_atoms = checked_cast(i64::from(self.file.read_i32()?))? as usize;

        if self.options.charmm_format {
            self.timesteps.dt = f64::from(self.file.read_f32()?);
            if self.file.read_i32()? != 0 {
                self.options.charmm_unitcell = true;
            }
            if self.file.read_i32()? == 1 {
                self.options.has_4d_data = true;
            }
        } else {
            // X-PLOR uses a 64-bit float for the timestep
            self.timesteps.dt = self.file.read_f64()?;
        }

        self.file.seek(header_start + 84);
        self.expect_marker(84)?;

        self.read_title()?;

        self.expect_marker(4)?;
        self.n_atoms = checked_cast(i64::from(self.file.read_i32()?))? as usize;
        self.expect_marker(4)?;

        self.n_free_atoms = self.n_atoms;
        if n_fixed_atoms != 0 {
            self.read_fixed_atoms_list(n_fixed_atoms)?;
        }

        self.header_size = self.file.tell();

        self.first_frame_size = self.frame_size_for(self.n_atoms);
        if self.fixed_atoms.is_empty() {
            self.frame_size = self.first_frame_size;
        } else {
            self.frame_size = self.frame_size_for(self.n_free_atoms);
        }

        let file_size = self.file.file_size();
        let n_frames_from_size = if file_size < self.header_size + self.first_frame_size {
            0
        } else {
            ((file_size - self.header_size - self.first_frame_size) / self.frame_size + 1) as usize
        };
        if n_frames_from_size != self.n_frames {
            warning(
                "DCD reader",
                format!(
                    "the file header claims {} frames, but the file size indicates we have {}",
                    self.n_frames, n_frames_from_size
                ),
            );
            self.n_frames = n_frames_from_size;
        }

        if !self.fixed_atoms.is_empty() {
            self.read_fixed_coordinates()?;
        }

        Ok(())
    }

    fn read_title(&mut self) -> Result<()> {
        let title_size = self.read_marker()?;
        if title_size < 4 || (title_size - 4) % 80 != 0 {
            if title_size != 0 {
                warning(
                    "DCD reader",
                    format!(
                        "invalid title record size ({}), skipping title section",
                        title_size
                    ),
                );
                self.file.skip(title_size);
            }
        } else {
            let n_lines = checked_cast(i64::from(self.file.read_i32()?))?;
            if n_lines != (title_size - 4) / 80 {
                warning(
                    "DCD reader",
                    format!(
                        "title record size ({}) does not match the number of title lines ({}), skipping title section",
                        title_size, n_lines
                    ),
                );
                self.file.skip(title_size - 4);
            } else {
                let mut buffer = vec![0_u8; (title_size - 4) as usize];
                self.file.read_bytes(&mut buffer)?;

                // lines are NULL or space padded, and might contain garbage
                // after the first NULL
                let mut lines = Vec::new();
                for line in buffer.chunks(80) {
                    let end = line.iter().position(|&c| c == 0).unwrap_or(line.len());
                    lines.push(String::from_utf8_lossy(&line[..end]).trim_end().to_string());
                }
                self.title = lines.join("\n").trim_end().to_string();
            }
        }
        self.expect_marker(title_size)
    }

    fn read_fixed_atoms_list(&mut self, n_fixed_atoms: usize) -> Result<()> {
        if n_fixed_atoms > self.n_atoms {
            return Err(Error::Format(format!(
                "invalid DCD file: {} fixed atoms for {} atoms in total",
                n_fixed_atoms, self.n_atoms
            )));
        }
        self.n_free_atoms = self.n_atoms - n_fixed_atoms;

        self.expect_marker(4 * self.n_free_atoms as u64)?;
        let mut free_atoms = vec![0_i32; self.n_free_atoms];
        self.file.read_i32_into(&mut free_atoms)?;
        self.expect_marker(4 * self.n_free_atoms as u64)?;

        // indexes are 1-based in the file
        let mut free_indexes = Vec::with_capacity(self.n_free_atoms);
        for index in free_atoms {
            if index < 1 || index as usize > self.n_atoms {
                return Err(Error::Format(format!(
                    "invalid free atom index ({}) in DCD file",
                    index
                )));
            }
            free_indexes.push(index as usize - 1);
        }
        free_indexes.sort_unstable();

        self.fixed_atoms = Vec::with_capacity(self.n_atoms);
        for atom in 0..self.n_atoms {
            match free_indexes.binary_search(&atom) {
                Ok(position) => self.fixed_atoms.push(FixedAtom {
                    fixed: false,
                    free_index: position,
                    coord: Vector3D::zeros(),
                }),
                Err(_) => self.fixed_atoms.push(FixedAtom {
                    fixed: true,
                    free_index: 0,
                    coord: Vector3D::zeros(),
                }),
            }
        }

        Ok(())
    }

    fn frame_size_for(&self, n_atoms: usize) -> u64 {
        let marker_size: u64 = if self.options.use_64_bit_markers { 8 } else { 4 };
        let mut size = 0;

        if self.options.charmm_format && self.options.charmm_unitcell {
            // 6 doubles and two markers for the unit cell
            size += 2 * marker_size + 6 * 8;
        }
        // three coordinate sets, each with two markers
        size += 3 * (2 * marker_size + n_atoms as u64 * 4);
        if self.options.has_4d_data {
            size += 2 * marker_size + n_atoms as u64 * 4;
        }

        size
    }

    fn read_cell(&mut self) -> Result<UnitCell> {
        if !self.options.charmm_format || !self.options.charmm_unitcell {
            return Ok(UnitCell::infinite());
        }

        self.expect_marker(6 * 8)?;
        let mut buffer = [0.0_f64; 6];
        self.file.read_f64_into(&mut buffer)?;
        self.expect_marker(6 * 8)?;

        if self.options.charmm_version > 25 {
            // recent CHARMM versions store the cell vectors directly, as
            // the upper triangle of a symmetric matrix
            let matrix = Matrix3D::new(
                buffer[0], buffer[1], buffer[3],
                buffer[1], buffer[2], buffer[4],
                buffer[3], buffer[4], buffer[5],
            );
            return UnitCell::from_matrix(matrix);
        }

        let lengths = (buffer[0], buffer[2], buffer[5]);
        let mut alpha = buffer[4];
        let mut beta = buffer[3];
        let mut gamma = buffer[1];

        if alpha.abs() <= 1.0 && beta.abs() <= 1.0 && gamma.abs() <= 1.0 {
            // angles smaller than 1 in absolute value are stored as the
            // cosine of the angle
            alpha = cos_to_angle_degrees(alpha);
            beta = cos_to_angle_degrees(beta);
            gamma = cos_to_angle_degrees(gamma);
        }

        UnitCell::from_lengths_angles(lengths.0, lengths.1, lengths.2, alpha, beta, gamma)
    }

    fn read_positions(&mut self, frame: &mut Frame) -> Result<()> {
        frame.resize(self.n_atoms);

        let mut n_atoms_to_read = self.n_atoms;
        if !self.fixed_atoms.is_empty() && self.step != 0 {
            n_atoms_to_read = self.n_free_atoms;
            let positions = frame.positions_mut();
            for (i, fixed) in self.fixed_atoms.iter().enumerate() {
                if fixed.fixed {
                    positions[i] = fixed.coord;
                }
            }
        }

        self.buffer.resize(n_atoms_to_read, 0.0);
        for axis in 0..3 {
            self.expect_marker(4 * n_atoms_to_read as u64)?;
            self.file.read_f32_into(&mut self.buffer)?;
            self.expect_marker(4 * n_atoms_to_read as u64)?;

            let positions = frame.positions_mut();
            if n_atoms_to_read == self.n_atoms {
                for (position, &value) in positions.iter_mut().zip(&self.buffer) {
                    position[axis] = f64::from(value);
                }
            } else {
                for (i, fixed) in self.fixed_atoms.iter().enumerate() {
                    if !fixed.fixed {
                        positions[i][axis] = f64::from(self.buffer[fixed.free_index]);
                    }
                }
            }
        }

        if self.options.has_4d_data {
            // skip the fourth dimension
            self.expect_marker(4 * n_atoms_to_read as u64)?;
            self.file.skip(4 * n_atoms_to_read as u64);
            self.expect_marker(4 * n_atoms_to_read as u64)?;
        }

        Ok(())
    }

    fn read_fixed_coordinates(&mut self) -> Result<()> {
        let mut frame = Frame::new();
        self.read_step_impl(0, &mut frame)?;

        let positions = frame.positions();
        for (fixed, &position) in self.fixed_atoms.iter_mut().zip(positions) {
            if fixed.fixed {
                fixed.coord = position;
            }
        }
        Ok(())
    }

    fn read_step_impl(&mut self, step: usize, frame: &mut Frame) -> Result<()> {
        self.step = step;

        if step == 0 {
            self.file.seek(self.header_size);
        } else {
            self.file
                .seek(self.header_size + self.first_frame_size + (step as u64 - 1) * self.frame_size);
        }

        let cell = self.read_cell()?;
        frame.set_cell(cell);
        self.read_positions(frame)?;

        if self.timesteps.dt != 0.0 && self.timesteps.stride != 0 {
            let simulation_step = (self.timesteps.stride * step as u64 + self.timesteps.start) as f64;
            frame.set("time", self.timesteps.dt * simulation_step);
        }

        if !self.title.is_empty() {
            frame.set("title", self.title.clone());
        }

        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        self.write_marker(84)?;

        self.file.write_bytes(b"CORD")?;
        self.file.write_i32(self.n_frames as i32)?;
        self.file.write_i32(self.timesteps.start as i32)?;
        self.file.write_i32(self.timesteps.stride as i32)?;

        // 16 unused bytes
        self.file.write_bytes(&[0; 16])?;

        self.file.write_i32(3 * self.n_atoms as i32)?; // degrees of freedom
        self.file.write_i32(0)?; // number of fixed atoms
        self.file.write_f32(self.timesteps.dt as f32)?;

        self.file.write_i32(i32::from(self.options.charmm_unitcell))?;
        self.file.write_i32(0)?; // no 4D data

        // 28 unused bytes
        self.file.write_bytes(&[0; 28])?;
        self.file.write_i32(i32::from(self.options.charmm_version))?;
        self.write_marker(84)?;

        if self.title.is_empty() {
            self.write_marker(0)?;
            self.write_marker(0)?;
        } else {
            let mut title = self.title.clone().into_bytes();
            if title.len() % 80 != 0 {
                let padded = (title.len() / 80 + 1) * 80;
                title.resize(padded, 0);
            }
            self.write_marker(title.len() as u64 + 4)?;
            self.file.write_i32((title.len() / 80) as i32)?;
            self.file.write_bytes(&title)?;
            self.write_marker(title.len() as u64 + 4)?;
        }

        self.write_marker(4)?;
        self.file.write_i32(self.n_atoms as i32)?;
        self.write_marker(4)?;

        Ok(())
    }

    fn write_cell(&mut self, cell: &UnitCell) -> Result<()> {
        if cell.shape() == CellShape::Infinite {
            if self.options.charmm_unitcell {
                warning(
                    "DCD writer",
                    "this file contains unit cell information, but we have an \
                     infinite cell, we'll write zeros for the cell lengths",
                );
            } else {
                return Ok(());
            }
        } else if !self.options.charmm_unitcell {
            warning(
                "DCD writer",
                "this file does not store unit cell information, we'll skip writing the cell",
            );
            return Ok(());
        }

        let matrix = cell.matrix();
        if !is_upper_triangular(&matrix) {
            warning(
                "DCD writer",
                "the unit cell is not upper-triangular, positions might not \
                 align with the cell in the file",
            );
        }

        let lengths = cell.lengths();
        let angles = cell.angles();

        self.write_marker(6 * 8)?;
        let buffer = [
            lengths[0],
            angles[2],
            lengths[1],
            angles[1],
            angles[0],
            lengths[2],
        ];
        self.file.write_f64_slice(&buffer)?;
        self.write_marker(6 * 8)
    }

    fn write_positions(&mut self, frame: &Frame) -> Result<()> {
        let positions = frame.positions();

        for axis in 0..3 {
            self.buffer.clear();
            self.buffer
                .extend(positions.iter().map(|position| position[axis] as f32));

            self.write_marker(4 * self.n_atoms as u64)?;
            let buffer = std::mem::take(&mut self.buffer);
            self.file.write_f32_slice(&buffer)?;
            self.buffer = buffer;
            self.write_marker(4 * self.n_atoms as u64)?;
        }

        Ok(())
    }
}

impl Format for DCDFormat {
    fn n_steps(&mut self) -> Result<usize> {
        Ok(self.n_frames)
    }

    fn read(&mut self, frame: &mut Frame) -> Result<()> {
        self.read_step_impl(self.step, frame)?;
        self.step += 1;
        Ok(())
    }

    fn read_step(&mut self, step: usize, frame: &mut Frame) -> Result<()> {
        if step >= self.n_frames {
            return Err(Error::OutOfBounds(format!(
                "step {} is out of bounds for a file with {} steps",
                step, self.n_frames
            )));
        }
        self.read_step_impl(step, frame)
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        if self.n_frames == 0 {
            // initialize the data that is constant for this file
            self.n_atoms = frame.size();
            self.n_free_atoms = frame.size();

            if self.n_atoms == 0 {
                return Err(Error::File("can not write a frame with 0 atoms".into()));
            }

            self.title = frame
                .get("title")
                .and_then(|property| property.as_string())
                .unwrap_or("")
                .to_string();

            self.options.charmm_format = true;
            self.options.charmm_version = 24;
            self.options.charmm_unitcell = frame.cell().shape() != CellShape::Infinite;
            self.options.use_64_bit_markers = false;
            self.options.has_4d_data = false;

            self.file.seek(0);
            self.write_header()?;
            self.header_size = self.file.tell();

            // 6 doubles and two markers for the unit cell, then three
            // coordinate sets with two markers each
            self.frame_size = 2 * 4 + 6 * 8 + 3 * (2 * 4 + self.n_atoms as u64 * 4);
            self.first_frame_size = self.frame_size;
        } else if self.n_atoms != frame.size() {
            return Err(Error::Format(format!(
                "this file was initialized with {} atoms, can not write a frame with {} atoms to it",
                self.n_atoms,
                frame.size()
            )));
        } else if self.n_atoms != self.n_free_atoms {
            return Err(Error::Format("can not append to a file with fixed atoms".into()));
        } else if self.options.has_4d_data {
            return Err(Error::Format("can not append to a file with 4D data".into()));
        } else if self.options.use_64_bit_markers {
            return Err(Error::Format("can not append to a file with 64-bit markers".into()));
        }

        let title = frame.get("title").and_then(|property| property.as_string());
        if let Some(title) = title {
            if title != self.title {
                warning(
                    "DCD writer",
                    "the title of this frame doesn't match the title of the \
                     file, the frame title will be ignored",
                );
            }
        }

        self.write_cell(frame.cell())?;
        self.write_positions(frame)?;

        self.n_frames += 1;
        self.step += 1;

        // the number of frames is always at offset 8 (one marker + CORD)
        let current = self.file.tell();
        self.file.seek(8);
        self.file.write_i32(self.n_frames as i32)?;
        self.file.seek(current);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atom::Atom;

    fn temporary_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("molio-dcd-{}-{}", std::process::id(), name));
        path
    }

    fn water_frame() -> Frame {
        let mut frame = Frame::with_cell(UnitCell::from_lengths(10.0, 10.0, 10.0).unwrap());
        frame.add_atom(Atom::new("O"), Vector3D::new(1.0, 2.0, 3.0));
        frame.add_atom(Atom::new("H"), Vector3D::new(4.0, 5.0, 6.0));
        frame.add_atom(Atom::new("H"), Vector3D::new(7.0, 8.0, 9.0));
        frame.set("title", "test");
        frame
    }

    #[test]
    fn test_cos_to_angle() {
        assert!((cos_to_angle_degrees(0.0) - 90.0).abs() < 1e-12);
        assert!((cos_to_angle_degrees(0.5) - 60.0).abs() < 1e-12);
        assert!((cos_to_angle_degrees(-0.5) - 120.0).abs() < 1e-12);
    }

    #[test]
    fn test_write_and_read() {
        let path = temporary_path("roundtrip.dcd");

        {
            let mut dcd = DCDFormat::open(&path, OpenMode::Write, Compression::None).unwrap();
            let frame = water_frame();
            dcd.write(&frame).unwrap();
            dcd.write(&frame).unwrap();
        }

        let mut dcd = DCDFormat::open(&path, OpenMode::Read, Compression::None).unwrap();
        assert_eq!(dcd.n_steps().unwrap(), 2);

        let mut frame = Frame::new();
        dcd.read_step(1, &mut frame).unwrap();

        assert_eq!(frame.size(), 3);
        let positions = frame.positions();
        assert!((positions[0] - Vector3D::new(1.0, 2.0, 3.0)).norm() < 1e-5);
        assert!((positions[2] - Vector3D::new(7.0, 8.0, 9.0)).norm() < 1e-5);

        let lengths = frame.cell().lengths();
        assert!((lengths - Vector3D::new(10.0, 10.0, 10.0)).norm() < 1e-9);

        assert_eq!(frame.get("title").unwrap().as_string(), Some("test"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_written_file_layout() {
        let path = temporary_path("layout.dcd");

        {
            let mut dcd = DCDFormat::open(&path, OpenMode::Write, Compression::None).unwrap();
            dcd.write(&water_frame()).unwrap();
        }

        let raw = std::fs::read(&path).unwrap();
        if cfg!(target_endian = "little") {
            // little-endian, 32-bit markers
            assert_eq!(&raw[..8], &[84, 0, 0, 0, b'C', b'O', b'R', b'D']);
            // one frame, patched after the write
            assert_eq!(&raw[8..12], &[1, 0, 0, 0]);
        }

        std::fs::remove_file(&path).unwrap();
    }

    /// write the fixed 84-byte header content (between the markers) for a
    /// CHARMM file with one frame of one atom and no unit cell
    fn write_header_body(file: &mut BinaryFile) {
        file.write_bytes(b"CORD").unwrap();
        file.write_i32(1).unwrap(); // n_frames
        file.write_i32(0).unwrap(); // start_step
        file.write_i32(0).unwrap(); // step_stride
        file.write_bytes(&[0; 20]).unwrap();
        file.write_i32(0).unwrap(); // n_fixed_atoms
        file.write_f32(0.0).unwrap(); // dt
        file.write_i32(0).unwrap(); // has_unit_cell
        file.write_i32(0).unwrap(); // has_4d_data
        file.write_bytes(&[0; 28]).unwrap();
        file.write_i32(24).unwrap(); // charmm version
    }

    #[test]
    fn test_big_endian_detection() {
        let path = temporary_path("big-endian.dcd");

        {
            let mut file = BinaryFile::open(&path, OpenMode::Write, Endianness::Big).unwrap();
            file.write_i32(84).unwrap();
            write_header_body(&mut file);
            file.write_i32(84).unwrap();

            file.write_i32(0).unwrap(); // empty title record
            file.write_i32(0).unwrap();

            file.write_i32(4).unwrap();
            file.write_i32(1).unwrap(); // one atom
            file.write_i32(4).unwrap();

            for axis in 0..3 {
                file.write_i32(4).unwrap();
                file.write_f32(1.5 + f32::from(axis as u8)).unwrap();
                file.write_i32(4).unwrap();
            }
        }

        let mut dcd = DCDFormat::open(&path, OpenMode::Read, Compression::None).unwrap();
        assert_eq!(dcd.n_steps().unwrap(), 1);

        let mut frame = Frame::new();
        dcd.read(&mut frame).unwrap();
        assert_eq!(frame.size(), 1);
        assert!((frame.positions()[0] - Vector3D::new(1.5, 2.5, 3.5)).norm() < 1e-6);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_64_bit_markers_detection() {
        let path = temporary_path("64-bit-markers.dcd");

        {
            let mut file = BinaryFile::open(&path, OpenMode::Write, Endianness::Little).unwrap();
            file.write_i64(84).unwrap();
            write_header_body(&mut file);
            file.write_i64(84).unwrap();

            file.write_i64(0).unwrap(); // empty title record
            file.write_i64(0).unwrap();

            file.write_i64(4).unwrap();
            file.write_i32(1).unwrap(); // one atom
            file.write_i64(4).unwrap();

            for axis in 0..3 {
                file.write_i64(4).unwrap();
                file.write_f32(1.5 + f32::from(axis as u8)).unwrap();
                file.write_i64(4).unwrap();
            }
        }

        let mut dcd = DCDFormat::open(&path, OpenMode::Read, Compression::None).unwrap();
        assert_eq!(dcd.n_steps().unwrap(), 1);

        let mut frame = Frame::new();
        dcd.read(&mut frame).unwrap();
        assert!((frame.positions()[0] - Vector3D::new(1.5, 2.5, 3.5)).norm() < 1e-6);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_not_a_dcd() {
        let path = temporary_path("not-a-dcd.dcd");
        std::fs::write(&path, b"this is not a dcd file at all").unwrap();

        let error = DCDFormat::open(&path, OpenMode::Read, Compression::None).unwrap_err();
        assert!(matches!(error, Error::Format(_)));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_no_compression() {
        let path = temporary_path("compressed.dcd");
        let error = DCDFormat::open(&path, OpenMode::Write, Compression::Gzip).unwrap_err();
        assert!(matches!(error, Error::Format(_)));
    }

    #[test]
    fn test_atom_count_mismatch() {
        let path = temporary_path("mismatch.dcd");

        let mut dcd = DCDFormat::open(&path, OpenMode::Write, Compression::None).unwrap();
        dcd.write(&water_frame()).unwrap();

        let mut other = Frame::new();
        other.add_atom(Atom::new("C"), Vector3D::zeros());
        assert!(dcd.write(&other).is_err());

        drop(dcd);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append() {
        let path = temporary_path("append.dcd");

        {
            let mut dcd = DCDFormat::open(&path, OpenMode::Write, Compression::None).unwrap();
            dcd.write(&water_frame()).unwrap();
        }
        {
            let mut dcd = DCDFormat::open(&path, OpenMode::Append, Compression::None).unwrap();
            assert_eq!(dcd.n_steps().unwrap(), 1);
            dcd.write(&water_frame()).unwrap();
        }

        let mut dcd = DCDFormat::open(&path, OpenMode::Read, Compression::None).unwrap();
        assert_eq!(dcd.n_steps().unwrap(), 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_infinite_cell_writes_no_cell_record() {
        let path = temporary_path("no-cell.dcd");

        {
            let mut dcd = DCDFormat::open(&path, OpenMode::Write, Compression::None).unwrap();
            let mut frame = Frame::new();
            frame.add_atom(Atom::new("C"), Vector3D::new(1.0, 1.0, 1.0));
            dcd.write(&frame).unwrap();
        }

        let mut dcd = DCDFormat::open(&path, OpenMode::Read, Compression::None).unwrap();
        let mut frame = Frame::new();
        dcd.read(&mut frame).unwrap();
        assert_eq!(frame.cell().shape(), CellShape::Infinite);
        assert!((frame.positions()[0] - Vector3D::new(1.0, 1.0, 1.0)).norm() < 1e-6);

        std::fs::remove_file(&path).unwrap();
    }
}
