//! Trajectory: the main entry point for reading and writing files

use std::path::{Path, PathBuf};

use crate::config;
use crate::core::cell::UnitCell;
use crate::core::frame::{Frame, STEP_SENTINEL};
use crate::core::topology::Topology;
use crate::error::{Error, Result};
use crate::files::{Compression, MemoryBuffer, OpenMode, SharedMemoryBuffer};
use crate::formats::{guess_format, registry, Format};

/// Format name and compression parsed from a format hint, or guessed from
/// a file extension
struct FileOpenInfo {
    format: String,
    compression: Compression,
}

impl FileOpenInfo {
    /// Parse a `"<FormatName>"` or `"<FormatName> / <Compression>"` hint,
    /// guessing from the path extension when the hint is empty.
    fn parse(path: &Path, hint: &str, mode: OpenMode) -> Result<FileOpenInfo> {
        let hint = if hint.is_empty() {
            guess_format(path, mode)?
        } else {
            hint.to_string()
        };

        match hint.find('/') {
            Some(slash) => {
                let compression = match hint[slash + 1..].trim() {
                    "GZ" => Compression::Gzip,
                    "BZ2" => Compression::Bzip2,
                    "XZ" => Compression::Lzma,
                    other => {
                        return Err(Error::File(format!(
                            "unknown compression method '{}'",
                            other
                        )));
                    }
                };
                Ok(FileOpenInfo {
                    format: hint[..slash].trim().to_string(),
                    compression,
                })
            }
            None => Ok(FileOpenInfo {
                format: hint.trim().to_string(),
                compression: Compression::None,
            }),
        }
    }
}

/// A trajectory file, read or written one [`Frame`] at a time.
///
/// The format is resolved from the file extension or from an explicit
/// format hint; optional cell and topology overrides are applied to every
/// frame read from or written to the file.
pub struct Trajectory {
    path: PathBuf,
    mode: OpenMode,
    format: Option<Box<dyn Format>>,
    step: usize,
    n_steps: usize,
    custom_cell: Option<UnitCell>,
    custom_topology: Option<Topology>,
    buffer: Option<SharedMemoryBuffer>,
}

impl Trajectory {
    /// Open the file at `path`, guessing the format from the extension
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Trajectory> {
        Trajectory::open_with_format(path, mode, "")
    }

    /// Open the file at `path` with an explicit format hint, either
    /// `"<FormatName>"` or `"<FormatName> / <Compression>"` with
    /// compression one of GZ, BZ2 and XZ. An empty hint guesses from the
    /// extension.
    pub fn open_with_format(
        path: impl AsRef<Path>,
        mode: OpenMode,
        format_hint: &str,
    ) -> Result<Trajectory> {
        let path = path.as_ref();
        let info = FileOpenInfo::parse(path, format_hint, mode)?;
        let registered = registry::by_name(&info.format)?;
        let format = (registered.creator)(path, mode, info.compression)?;

        Trajectory::with_format(path.to_path_buf(), mode, format, None)
    }

    /// Read a trajectory from an in-memory buffer. The format hint must
    /// not be empty, since there is no extension to guess from.
    pub fn memory_reader(data: &[u8], format_hint: &str) -> Result<Trajectory> {
        let info = FileOpenInfo::parse(Path::new(""), format_hint, OpenMode::Read)?;
        if info.format.is_empty() {
            return Err(Error::Format(format!(
                "format name '{}' is invalid",
                format_hint
            )));
        }

        let registered = registry::by_name(&info.format)?;
        let memory_creator = registered.memory_creator.ok_or_else(|| {
            Error::Format(format!(
                "in-memory I/O is not supported for the '{}' format",
                info.format
            ))
        })?;

        let buffer = SharedMemoryBuffer::new(MemoryBuffer::from_data(data));
        let format = memory_creator(buffer.clone(), OpenMode::Read, info.compression)?;

        Trajectory::with_format("<memory>".into(), OpenMode::Read, format, Some(buffer))
    }

    /// Write a trajectory to an in-memory buffer, retrieved with
    /// [`Trajectory::memory_buffer`]. The format hint must not be empty.
    pub fn memory_writer(format_hint: &str) -> Result<Trajectory> {
        let info = FileOpenInfo::parse(Path::new(""), format_hint, OpenMode::Write)?;
        if info.format.is_empty() {
            return Err(Error::Format(format!(
                "format name '{}' is invalid",
                format_hint
            )));
        }

        let registered = registry::by_name(&info.format)?;
        let memory_creator = registered.memory_creator.ok_or_else(|| {
            Error::Format(format!(
                "in-memory I/O is not supported for the '{}' format",
                info.format
            ))
        })?;

        let buffer = SharedMemoryBuffer::new(MemoryBuffer::new());
        let format = memory_creator(buffer.clone(), OpenMode::Write, info.compression)?;

        Trajectory::with_format("<memory>".into(), OpenMode::Write, format, Some(buffer))
    }

    fn with_format(
        path: PathBuf,
        mode: OpenMode,
        format: Box<dyn Format>,
        buffer: Option<SharedMemoryBuffer>,
    ) -> Result<Trajectory> {
        let mut trajectory = Trajectory {
            path,
            mode,
            format: Some(format),
            step: 0,
            n_steps: 0,
            custom_cell: None,
            custom_topology: None,
            buffer,
        };

        if mode == OpenMode::Read || mode == OpenMode::Append {
            trajectory.n_steps = trajectory
                .format
                .as_mut()
                .expect("the format was just created")
                .n_steps()?;
        }
        Ok(trajectory)
    }

    /// Path used to open this trajectory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of steps in this trajectory
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Check whether all the steps of this trajectory have been read
    pub fn done(&self) -> bool {
        self.step >= self.n_steps
    }

    fn check_opened(&self) -> Result<()> {
        if self.format.is_none() {
            return Err(Error::File("can not use a closed trajectory".into()));
        }
        Ok(())
    }

    fn pre_read(&self, step: usize) -> Result<()> {
        self.check_opened()?;
        if step >= self.n_steps {
            if self.n_steps == 0 {
                return Err(Error::File(format!(
                    "can not read file '{}' at step {}, it does not contain any step",
                    self.path.display(),
                    step
                )));
            }
            return Err(Error::File(format!(
                "can not read file '{}' at step {}: maximal step is {}",
                self.path.display(),
                step,
                self.n_steps - 1
            )));
        }
        if self.mode != OpenMode::Read {
            return Err(Error::File(format!(
                "the file at '{}' was not opened in read mode",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn post_read(&self, frame: &mut Frame) -> Result<()> {
        if let Some(topology) = &self.custom_topology {
            frame.set_topology(topology.clone())?;
        } else {
            for atom in frame.topology_mut().atoms_mut() {
                let renamed = config::rename(atom.atom_type());
                if renamed != atom.atom_type() {
                    atom.set_type(renamed);
                }
            }
        }

        if let Some(cell) = &self.custom_cell {
            frame.set_cell(*cell);
        }
        Ok(())
    }

    /// Read the next step of this trajectory
    pub fn read(&mut self) -> Result<Frame> {
        self.pre_read(self.step)?;

        let mut frame = Frame::new();
        frame.set_step(STEP_SENTINEL);
        self.format
            .as_mut()
            .expect("checked in pre_read")
            .read(&mut frame)?;
        self.post_read(&mut frame)?;

        // don't override a step set by the format
        if frame.step() == STEP_SENTINEL {
            frame.set_step(self.step);
        }

        self.step += 1;
        Ok(frame)
    }

    /// Read the given step of this trajectory, also setting the cursor
    /// used by [`Trajectory::read`] to that step.
    pub fn read_step(&mut self, step: usize) -> Result<Frame> {
        self.pre_read(step)?;

        let mut frame = Frame::new();
        frame.set_step(STEP_SENTINEL);
        self.step = step;
        self.format
            .as_mut()
            .expect("checked in pre_read")
            .read_step(step, &mut frame)?;

        if frame.step() == STEP_SENTINEL {
            frame.set_step(step);
        }

        self.post_read(&mut frame)?;
        self.step += 1;
        Ok(frame)
    }

    /// Append `frame` to this trajectory
    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        self.check_opened()?;
        if !(self.mode == OpenMode::Write || self.mode == OpenMode::Append) {
            return Err(Error::File(format!(
                "the file at '{}' was not opened in write or append mode",
                self.path.display()
            )));
        }

        let format = self.format.as_mut().expect("checked above");
        if self.custom_topology.is_some() || self.custom_cell.is_some() {
            let mut copy = frame.clone();
            if let Some(topology) = &self.custom_topology {
                copy.set_topology(topology.clone())?;
            }
            if let Some(cell) = &self.custom_cell {
                copy.set_cell(*cell);
            }
            format.write(&copy)?;
        } else {
            format.write(frame)?;
        }

        self.step += 1;
        self.n_steps += 1;
        Ok(())
    }

    /// Use `cell` for all frames instead of the cell in the file
    pub fn set_cell(&mut self, cell: UnitCell) -> Result<()> {
        self.check_opened()?;
        self.custom_cell = Some(cell);
        Ok(())
    }

    /// Use `topology` for all frames instead of the topology in the file
    pub fn set_topology(&mut self, topology: Topology) -> Result<()> {
        self.check_opened()?;
        self.custom_topology = Some(topology);
        Ok(())
    }

    /// Read the topology from the first step of the file at `path` and
    /// use it for all frames. The format hint follows the same rules as
    /// [`Trajectory::open_with_format`].
    pub fn set_topology_file(&mut self, path: impl AsRef<Path>, format_hint: &str) -> Result<()> {
        self.check_opened()?;

        let mut topology_file = Trajectory::open_with_format(path, OpenMode::Read, format_hint)?;
        if topology_file.n_steps() == 0 {
            return Err(Error::Format(format!(
                "can not use '{}' as a topology file, it does not contain any step",
                topology_file.path().display()
            )));
        }

        let frame = topology_file.read_step(0)?;
        self.custom_topology = Some(frame.topology().clone());
        Ok(())
    }

    /// A copy of the underlying buffer, when this trajectory was created
    /// with [`Trajectory::memory_writer`]
    pub fn memory_buffer(&self) -> Option<Vec<u8>> {
        if self.mode == OpenMode::Read {
            return None;
        }
        self.buffer.as_ref().map(|buffer| buffer.to_vec())
    }

    /// Close this trajectory, releasing the underlying file. Any
    /// subsequent operation fails; calling `close` again is a no-op.
    pub fn close(&mut self) {
        self.format = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::atom::Atom;
    use crate::core::Vector3D;

    const XYZ_CONTENT: &[u8] = b"2
first frame
O 1.0 2.0 3.0
H 4.0 5.0 6.0
2
second frame
O 1.5 2.0 3.0
H 4.5 5.0 6.0
";

    #[test]
    fn test_memory_reader() {
        let mut trajectory = Trajectory::memory_reader(XYZ_CONTENT, "XYZ").unwrap();
        assert_eq!(trajectory.n_steps(), 2);
        assert!(!trajectory.done());

        let frame = trajectory.read().unwrap();
        assert_eq!(frame.step(), 0);
        assert_eq!(frame.size(), 2);
        assert_eq!(frame.positions()[0], Vector3D::new(1.0, 2.0, 3.0));

        let frame = trajectory.read().unwrap();
        assert_eq!(frame.step(), 1);
        assert!(trajectory.done());

        // reading past the end is an error
        assert!(trajectory.read().is_err());
    }

    #[test]
    fn test_read_step() {
        let mut trajectory = Trajectory::memory_reader(XYZ_CONTENT, "XYZ").unwrap();

        let frame = trajectory.read_step(1).unwrap();
        assert_eq!(frame.step(), 1);
        assert_eq!(frame.positions()[0], Vector3D::new(1.5, 2.0, 3.0));

        assert!(trajectory.read_step(12).is_err());
    }

    #[test]
    fn test_memory_writer() {
        let mut trajectory = Trajectory::memory_writer("XYZ").unwrap();

        let mut frame = Frame::new();
        frame.add_atom(Atom::new("C"), Vector3D::new(1.0, 2.0, 3.0));
        trajectory.write(&frame).unwrap();
        assert_eq!(trajectory.n_steps(), 1);

        let content = String::from_utf8(trajectory.memory_buffer().unwrap()).unwrap();
        assert_eq!(content, "1\n\nC 1.00000 2.00000 3.00000\n");

        // reading from a writer is an error
        assert!(trajectory.read().is_err());
    }

    #[test]
    fn test_memory_requires_format() {
        assert!(Trajectory::memory_reader(b"", "").is_err());
        assert!(Trajectory::memory_writer("").is_err());
        assert!(Trajectory::memory_writer("DCD").is_err());
    }

    #[test]
    fn test_override_cell() {
        let mut trajectory = Trajectory::memory_reader(XYZ_CONTENT, "XYZ").unwrap();
        trajectory
            .set_cell(UnitCell::from_lengths(30.0, 30.0, 30.0).unwrap())
            .unwrap();

        let frame = trajectory.read().unwrap();
        assert_eq!(frame.cell().lengths(), Vector3D::new(30.0, 30.0, 30.0));
    }

    #[test]
    fn test_override_topology() {
        let mut topology = Topology::new();
        topology.add_atom(Atom::with_type("O1", "O"));
        topology.add_atom(Atom::with_type("H1", "H"));

        let mut trajectory = Trajectory::memory_reader(XYZ_CONTENT, "XYZ").unwrap();
        trajectory.set_topology(topology).unwrap();

        let frame = trajectory.read().unwrap();
        assert_eq!(frame.topology().atom(0).unwrap().name(), "O1");

        // a topology with the wrong size fails the read
        let mut bad = Topology::new();
        bad.add_atom(Atom::new("C"));
        trajectory.set_topology(bad).unwrap();
        assert!(trajectory.read().is_err());
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut trajectory = Trajectory::memory_reader(XYZ_CONTENT, "XYZ").unwrap();
        trajectory.close();
        trajectory.close();

        assert!(trajectory.read().is_err());
        assert!(trajectory.set_cell(UnitCell::infinite()).is_err());
    }

    #[test]
    fn test_bad_format_hints() {
        assert!(Trajectory::memory_reader(b"", "Unknown-Format").is_err());
        assert!(Trajectory::memory_reader(XYZ_CONTENT, "XYZ / RAR").is_err());
    }
}
