//! XYZ file format reader and writer
//!
//! The XYZ format is a simple multi-frame coordinate format. Each frame is:
//! a line with the number of atoms, a free-form comment line, then one
//! `symbol x y z` line per atom.

use std::path::Path;

use crate::core::atom::Atom;
use crate::core::frame::Frame;
use crate::core::Vector3D;
use crate::error::{Error, Result};
use crate::files::{Compression, OpenMode, SharedMemoryBuffer, TextFile};
use crate::formats::registry::FormatMetadata;
use crate::formats::Format;

/// Metadata for the XYZ format
pub const METADATA: FormatMetadata = FormatMetadata {
    name: "XYZ",
    extension: Some(".xyz"),
    description: "XYZ text format",
    reference: "https://openbabel.org/wiki/XYZ",

    read: true,
    write: true,
    memory: true,

    positions: true,
    velocities: false,
    unit_cell: false,
    atoms: true,
    bonds: false,
    residues: false,
};

/// XYZ format implementation
pub struct XYZFormat {
    file: TextFile,
    /// byte offset of the start of each step in the decompressed stream
    frame_positions: Vec<u64>,
    step: usize,
}

pub(crate) fn creator(
    path: &Path,
    mode: OpenMode,
    compression: Compression,
) -> Result<Box<dyn Format>> {
    let file = TextFile::open(path, mode, compression)?;
    Ok(Box::new(XYZFormat::with_file(file, mode)?))
}

pub(crate) fn memory_creator(
    buffer: SharedMemoryBuffer,
    mode: OpenMode,
    compression: Compression,
) -> Result<Box<dyn Format>> {
    let file = TextFile::open_memory(buffer, mode, compression)?;
    Ok(Box::new(XYZFormat::with_file(file, mode)?))
}

impl XYZFormat {
    /// Open the XYZ file at `path`
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, compression: Compression) -> Result<XYZFormat> {
        let file = TextFile::open(path, mode, compression)?;
        XYZFormat::with_file(file, mode)
    }

    fn with_file(file: TextFile, mode: OpenMode) -> Result<XYZFormat> {
        let mut format = XYZFormat {
            file,
            frame_positions: Vec::new(),
            step: 0,
        };

        if mode != OpenMode::Write {
            format.scan_steps()?;
        }
        Ok(format)
    }

    /// Scan the whole file, recording the starting offset of every frame
    fn scan_steps(&mut self) -> Result<()> {
        self.file.rewind()?;

        loop {
            let position = self.file.tell_pos();
            let line = self.file.read_line()?;
            if line.trim().is_empty() {
                if self.file.eof() {
                    break;
                }
                return Err(Error::Format(format!(
                    "expected the number of atoms in '{}', got an empty line",
                    self.file.path()
                )));
            }

            let n_atoms = parse_atom_count(&line, self.file.path())?;
            self.file.read_line()?;
            for _ in 0..n_atoms {
                let line = self.file.read_line()?;
                if self.file.eof() && line.is_empty() {
                    return Err(Error::Format(format!(
                        "unexpected end of file in '{}' while reading atoms",
                        self.file.path()
                    )));
                }
            }

            self.frame_positions.push(position);
        }

        self.file.clear();
        Ok(())
    }

    fn read_frame(&mut self, frame: &mut Frame) -> Result<()> {
        let line = self.file.read_line()?;
        let n_atoms = parse_atom_count(&line, self.file.path())?;

        let comment = self.file.read_line()?;
        frame.resize(0);
        if !comment.trim().is_empty() {
            frame.set("comment", comment.trim());
        }

        for _ in 0..n_atoms {
            let line = self.file.read_line()?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return Err(Error::Format(format!(
                    "expected an atom line with at least 4 fields in '{}', got {}",
                    self.file.path(),
                    fields.len()
                )));
            }

            let x = parse_coordinate(fields[1], self.file.path())?;
            let y = parse_coordinate(fields[2], self.file.path())?;
            let z = parse_coordinate(fields[3], self.file.path())?;
            frame.add_atom(Atom::new(fields[0]), Vector3D::new(x, y, z));
        }

        Ok(())
    }
}

fn parse_atom_count(line: &str, path: &str) -> Result<usize> {
    line.trim().parse::<usize>().map_err(|_| {
        Error::Format(format!(
            "expected the number of atoms in '{}', got '{}'",
            path,
            line.trim()
        ))
    })
}

fn parse_coordinate(field: &str, path: &str) -> Result<f64> {
    field.parse::<f64>().map_err(|_| {
        Error::Format(format!("invalid coordinate '{}' in '{}'", field, path))
    })
}

impl Format for XYZFormat {
    fn n_steps(&mut self) -> Result<usize> {
        Ok(self.frame_positions.len())
    }

    fn read(&mut self, frame: &mut Frame) -> Result<()> {
        self.read_step(self.step, frame)
    }

    fn read_step(&mut self, step: usize, frame: &mut Frame) -> Result<()> {
        let position = *self.frame_positions.get(step).ok_or_else(|| {
            Error::OutOfBounds(format!(
                "step {} is out of bounds for a file with {} steps",
                step,
                self.frame_positions.len()
            ))
        })?;

        self.file.seek_pos(position)?;
        self.read_frame(frame)?;
        self.step = step + 1;
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<()> {
        self.file.print(format_args!("{}\n", frame.size()))?;

        let comment = frame
            .get("comment")
            .and_then(|property| property.as_string())
            .unwrap_or("");
        self.file.print(format_args!("{}\n", comment))?;

        let topology = frame.topology();
        for (atom, position) in topology.atoms().iter().zip(frame.positions()) {
            let name = if atom.name().is_empty() { "X" } else { atom.name() };
            self.file.print(format_args!(
                "{} {:.5} {:.5} {:.5}\n",
                name, position[0], position[1], position[2]
            ))?;
        }

        self.step += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::memory::MemoryBuffer;

    fn format_for(content: &str) -> XYZFormat {
        let buffer = SharedMemoryBuffer::new(MemoryBuffer::from_data(content.as_bytes()));
        let file = TextFile::open_memory(buffer, OpenMode::Read, Compression::None).unwrap();
        XYZFormat::with_file(file, OpenMode::Read).unwrap()
    }

    #[test]
    fn test_read_single_frame() {
        let mut format = format_for(
            "3
water
O 0.0 0.0 0.0
H 0.757 0.586 0.0
H -0.757 0.586 0.0
",
        );

        assert_eq!(format.n_steps().unwrap(), 1);

        let mut frame = Frame::new();
        format.read(&mut frame).unwrap();

        assert_eq!(frame.size(), 3);
        assert_eq!(frame.get("comment").unwrap().as_string(), Some("water"));
        assert_eq!(frame.topology().atom(0).unwrap().name(), "O");
        assert_eq!(frame.positions()[1], Vector3D::new(0.757, 0.586, 0.0));
    }

    #[test]
    fn test_read_multiple_frames() {
        let mut format = format_for(
            "2
frame 0
X 0.0 0.0 0.0
X 1.0 0.0 0.0
2
frame 1
X 0.1 0.0 0.0
X 1.1 0.0 0.0
",
        );

        assert_eq!(format.n_steps().unwrap(), 2);

        let mut frame = Frame::new();
        format.read_step(1, &mut frame).unwrap();
        assert_eq!(frame.positions()[0], Vector3D::new(0.1, 0.0, 0.0));

        // random access then sequential continues from there
        format.read_step(0, &mut frame).unwrap();
        format.read(&mut frame).unwrap();
        assert_eq!(frame.positions()[1], Vector3D::new(1.1, 0.0, 0.0));

        assert!(format.read_step(2, &mut frame).is_err());
    }

    #[test]
    fn test_malformed_files() {
        let buffer = SharedMemoryBuffer::new(MemoryBuffer::from_data(b"not a number\ncomment\n"));
        let file = TextFile::open_memory(buffer, OpenMode::Read, Compression::None).unwrap();
        assert!(XYZFormat::with_file(file, OpenMode::Read).is_err());

        // truncated atom list
        let buffer = SharedMemoryBuffer::new(MemoryBuffer::from_data(b"4\ncomment\nO 0 0 0\n"));
        let file = TextFile::open_memory(buffer, OpenMode::Read, Compression::None).unwrap();
        assert!(XYZFormat::with_file(file, OpenMode::Read).is_err());
    }

    #[test]
    fn test_write() {
        let buffer = SharedMemoryBuffer::new(MemoryBuffer::new());
        let file =
            TextFile::open_memory(buffer.clone(), OpenMode::Write, Compression::None).unwrap();
        let mut format = XYZFormat::with_file(file, OpenMode::Write).unwrap();

        let mut frame = Frame::new();
        frame.set("comment", "written by molio");
        frame.add_atom(Atom::new("O"), Vector3D::new(1.0, 2.0, 3.0));
        frame.add_atom(Atom::new("H"), Vector3D::new(4.0, 5.0, 6.0));
        format.write(&frame).unwrap();

        let content = String::from_utf8(buffer.to_vec()).unwrap();
        assert_eq!(
            content,
            "2
written by molio
O 1.00000 2.00000 3.00000
H 4.00000 5.00000 6.00000
"
        );
    }
}
