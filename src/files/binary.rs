//! Random-access binary file with endian-normalised primitive I/O
//!
//! The file is opened with a fixed byte order chosen by the format (DCD
//! auto-detects it, NetCDF-3 is always big-endian); every multi-byte read
//! and write swaps bytes as needed.
//!
//! On unix the file is memory-mapped: read mode maps the whole file, write
//! and append modes map a large virtual window and extend the file in
//! page-multiple chunks, remapping only when the window is exceeded. On
//! other platforms a positioned `std::fs::File` backend provides the same
//! observable behaviour.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::files::OpenMode;
use crate::warnings::warning;

/// Size of the initial virtual mapping in write mode (1 GiB). This is only
/// reserved address space, not resident memory.
const INITIAL_WINDOW: u64 = 0x4000_0000;

/// The file grows in chunks of this many bytes while writing
const GROW_CHUNK: u64 = 4 * 4096;

/// Byte order of a binary file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    /// Most significant byte first
    Big,
    /// Least significant byte first
    Little,
}

impl Endianness {
    /// The byte order of the machine running this code
    pub fn native() -> Endianness {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }
}

#[cfg(unix)]
#[derive(Debug)]
enum Region {
    Read(memmap2::Mmap),
    Write(memmap2::MmapMut),
    Empty,
}

#[cfg(unix)]
#[derive(Debug)]
struct Backend {
    file: File,
    region: Region,
    /// size of the current mapping window
    window: u64,
    /// current on-disk size, page-rounded in write mode
    disk_size: u64,
}

#[cfg(not(unix))]
#[derive(Debug)]
struct Backend {
    file: File,
}

/// A binary file with a fixed byte order
#[derive(Debug)]
pub struct BinaryFile {
    path: PathBuf,
    mode: OpenMode,
    endianness: Endianness,
    backend: Backend,
    /// logical size of the file content, excluding the pre-allocated tail
    file_size: u64,
    /// current read/write offset
    offset: u64,
}

impl BinaryFile {
    /// Open the binary file at `path` with the given mode and byte order
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, endianness: Endianness) -> Result<BinaryFile> {
        Self::open_with_window(path, mode, endianness, INITIAL_WINDOW)
    }

    /// Open the binary file at `path` using the byte order of this machine
    pub fn open_native(path: impl AsRef<Path>, mode: OpenMode) -> Result<BinaryFile> {
        Self::open(path, mode, Endianness::native())
    }

    fn open_with_window(
        path: impl AsRef<Path>,
        mode: OpenMode,
        endianness: Endianness,
        window: u64,
    ) -> Result<BinaryFile> {
        let path = path.as_ref();
        let file = match mode {
            OpenMode::Read => File::open(path),
            OpenMode::Write => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(path),
            OpenMode::Append => OpenOptions::new().read(true).write(true).create(true).open(path),
        }
        .map_err(|e| Error::File(format!("could not open file at '{}': {}", path.display(), e)))?;

        let file_size = file
            .metadata()
            .map_err(|e| Error::File(format!("could not stat '{}': {}", path.display(), e)))?
            .len();

        let backend = Backend::new(&file, path, mode, file_size, window)?;

        Ok(BinaryFile {
            path: path.to_path_buf(),
            mode,
            endianness,
            backend,
            file_size,
            offset: if mode == OpenMode::Append { file_size } else { 0 },
        })
    }

    /// Path used to open this file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode used to open this file
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Byte order of this file
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Change the byte order of this file. Used by formats that detect the
    /// byte order from the file content after opening.
    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    /// Current offset in the file
    pub fn tell(&self) -> u64 {
        self.offset
    }

    /// Move the current offset to `position`
    pub fn seek(&mut self, position: u64) {
        self.offset = position;
    }

    /// Move the current offset forward by `count` bytes
    pub fn skip(&mut self, count: u64) {
        self.offset += count;
    }

    /// Logical size of the file content, in bytes.
    ///
    /// In write and append modes this is the number of bytes actually
    /// written, not the pre-allocated on-disk size; the file is truncated
    /// to this size on close.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Read exactly `data.len()` opaque bytes at the current offset
    pub fn read_bytes(&mut self, data: &mut [u8]) -> Result<()> {
        let count = data.len() as u64;
        if self.offset + count > self.file_size {
            return Err(Error::File(format!(
                "failed to read {} bytes from the file at '{}': end of file",
                count,
                self.path.display()
            )));
        }
        self.backend.read_at(self.offset, data)?;
        self.offset += count;
        Ok(())
    }

    /// Write `data` at the current offset, extending the file as needed
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if self.mode == OpenMode::Read {
            return Err(Error::File(format!(
                "the file at '{}' was opened in read-only mode",
                self.path.display()
            )));
        }
        self.backend.write_at(self.offset, data)?;
        self.offset += data.len() as u64;
        if self.offset > self.file_size {
            self.file_size = self.offset;
        }
        Ok(())
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        let mut buffer = [0_u8; 1];
        self.read_bytes(&mut buffer)?;
        Ok(buffer[0])
    }

    /// Read a single signed byte
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read `data.len()` signed bytes
    pub fn read_i8_into(&mut self, data: &mut [i8]) -> Result<()> {
        let mut buffer = vec![0_u8; data.len()];
        self.read_bytes(&mut buffer)?;
        for (out, byte) in data.iter_mut().zip(buffer) {
            *out = byte as i8;
        }
        Ok(())
    }

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    /// Write a single signed byte
    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.write_bytes(&[value as u8])
    }

    /// Write a slice of signed bytes
    pub fn write_i8_slice(&mut self, data: &[i8]) -> Result<()> {
        let buffer: Vec<u8> = data.iter().map(|&v| v as u8).collect();
        self.write_bytes(&buffer)
    }
}

macro_rules! typed_io {
    (
        $(#[$doc:meta])* => $read_one:ident, $read_into:ident, $write_one:ident, $write_slice:ident,
        $ty:ty, $size:expr, $bo_read:ident, $bo_read_into:ident, $bo_write_into:ident
    ) => {
        impl BinaryFile {
            $(#[$doc])*
            pub fn $read_one(&mut self) -> Result<$ty> {
                let mut buffer = [0_u8; $size];
                self.read_bytes(&mut buffer)?;
                Ok(match self.endianness {
                    Endianness::Big => BigEndian::$bo_read(&buffer),
                    Endianness::Little => LittleEndian::$bo_read(&buffer),
                })
            }

            /// Read values into `data`, converting from the file byte order
            pub fn $read_into(&mut self, data: &mut [$ty]) -> Result<()> {
                let mut buffer = vec![0_u8; data.len() * $size];
                self.read_bytes(&mut buffer)?;
                match self.endianness {
                    Endianness::Big => BigEndian::$bo_read_into(&buffer, data),
                    Endianness::Little => LittleEndian::$bo_read_into(&buffer, data),
                }
                Ok(())
            }

            /// Write a single value in the file byte order
            pub fn $write_one(&mut self, value: $ty) -> Result<()> {
                self.$write_slice(&[value])
            }

            /// Write all values of `data` in the file byte order
            pub fn $write_slice(&mut self, data: &[$ty]) -> Result<()> {
                let mut buffer = vec![0_u8; data.len() * $size];
                match self.endianness {
                    Endianness::Big => BigEndian::$bo_write_into(data, &mut buffer),
                    Endianness::Little => LittleEndian::$bo_write_into(data, &mut buffer),
                }
                self.write_bytes(&buffer)
            }
        }
    };
}

typed_io!(
    /// Read a single value, converting from the file byte order
    => read_i16, read_i16_into, write_i16, write_i16_slice,
    i16, 2, read_i16, read_i16_into, write_i16_into
);
typed_io!(
    /// Read a single value, converting from the file byte order
    => read_u16, read_u16_into, write_u16, write_u16_slice,
    u16, 2, read_u16, read_u16_into, write_u16_into
);
typed_io!(
    /// Read a single value, converting from the file byte order
    => read_i32, read_i32_into, write_i32, write_i32_slice,
    i32, 4, read_i32, read_i32_into, write_i32_into
);
typed_io!(
    /// Read a single value, converting from the file byte order
    => read_u32, read_u32_into, write_u32, write_u32_slice,
    u32, 4, read_u32, read_u32_into, write_u32_into
);
typed_io!(
    /// Read a single value, converting from the file byte order
    => read_i64, read_i64_into, write_i64, write_i64_slice,
    i64, 8, read_i64, read_i64_into, write_i64_into
);
typed_io!(
    /// Read a single value, converting from the file byte order
    => read_u64, read_u64_into, write_u64, write_u64_slice,
    u64, 8, read_u64, read_u64_into, write_u64_into
);
typed_io!(
    /// Read a single value, converting from the file byte order
    => read_f32, read_f32_into, write_f32, write_f32_slice,
    f32, 4, read_f32, read_f32_into, write_f32_into
);
typed_io!(
    /// Read a single value, converting from the file byte order
    => read_f64, read_f64_into, write_f64, write_f64_slice,
    f64, 8, read_f64, read_f64_into, write_f64_into
);

impl Drop for BinaryFile {
    fn drop(&mut self) {
        if self.mode != OpenMode::Read {
            if let Err(e) = self.backend.close(self.file_size) {
                warning(
                    "binary file writer",
                    format!("failed to resize file to its actual size when closing: {}", e),
                );
            }
        }
    }
}

#[cfg(unix)]
impl Backend {
    fn new(file: &File, path: &Path, mode: OpenMode, file_size: u64, window: u64) -> Result<Backend> {
        let file = file
            .try_clone()
            .map_err(|e| Error::File(format!("could not duplicate the file handle: {}", e)))?;

        match mode {
            OpenMode::Read => {
                let region = if file_size == 0 {
                    Region::Empty
                } else {
                    // SAFETY: the mapping is only invalidated by truncating
                    // the file, which only happens on close in write modes
                    let map = unsafe { memmap2::Mmap::map(&file) }.map_err(|e| {
                        Error::File(format!("mmap failed for '{}': {}", path.display(), e))
                    })?;
                    Region::Read(map)
                };
                Ok(Backend {
                    file,
                    region,
                    window: file_size,
                    disk_size: file_size,
                })
            }
            OpenMode::Write | OpenMode::Append => {
                let mut window = window;
                while file_size > window {
                    window *= 2;
                }
                let map = unsafe { memmap2::MmapOptions::new().len(window as usize).map_mut(&file) }
                    .map_err(|e| Error::File(format!("mmap failed for '{}': {}", path.display(), e)))?;
                Ok(Backend {
                    file,
                    region: Region::Write(map),
                    window,
                    disk_size: file_size,
                })
            }
        }
    }

    fn read_at(&mut self, offset: u64, data: &mut [u8]) -> Result<()> {
        let start = crate::error::checked_usize(offset)?;
        match &self.region {
            Region::Read(map) => data.copy_from_slice(&map[start..start + data.len()]),
            Region::Write(map) => data.copy_from_slice(&map[start..start + data.len()]),
            Region::Empty => {
                return Err(Error::File("tried to read from an empty file".into()));
            }
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let end = offset + data.len() as u64;
        if end > self.disk_size {
            while end > self.disk_size {
                // grow the file in chunks to call set_len less often
                self.disk_size += GROW_CHUNK;
            }
            self.file
                .set_len(self.disk_size)
                .map_err(|e| Error::File(format!("failed to resize file: {}", e)))?;

            if self.disk_size > self.window {
                // remap the file with a bigger window
                while self.disk_size > self.window {
                    self.window *= 2;
                }
                if let Region::Write(map) = &self.region {
                    map.flush()
                        .map_err(|e| Error::File(format!("failed to flush mmap data: {}", e)))?;
                }
                let map = unsafe {
                    memmap2::MmapOptions::new()
                        .len(self.window as usize)
                        .map_mut(&self.file)
                }
                .map_err(|e| Error::File(format!("mmap failed: {}", e)))?;
                self.region = Region::Write(map);
            }
        }

        let start = crate::error::checked_usize(offset)?;
        match &mut self.region {
            Region::Write(map) => {
                map[start..start + data.len()].copy_from_slice(data);
                Ok(())
            }
            _ => Err(Error::File("tried to write to a read-only file".into())),
        }
    }

    fn close(&mut self, file_size: u64) -> std::io::Result<()> {
        if let Region::Write(map) = &self.region {
            map.flush()?;
        }
        self.region = Region::Empty;
        self.file.set_len(file_size)
    }
}

#[cfg(not(unix))]
impl Backend {
    fn new(file: &File, _path: &Path, _mode: OpenMode, _file_size: u64, _window: u64) -> Result<Backend> {
        let file = file
            .try_clone()
            .map_err(|e| Error::File(format!("could not duplicate the file handle: {}", e)))?;
        Ok(Backend { file })
    }

    fn read_at(&mut self, offset: u64, data: &mut [u8]) -> Result<()> {
        use std::io::{Read, Seek, SeekFrom};
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(data)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn close(&mut self, file_size: u64) -> std::io::Result<()> {
        use std::io::Write;
        self.file.flush()?;
        self.file.set_len(file_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temporary_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("molio-binary-{}-{}", std::process::id(), name));
        path
    }

    #[test]
    fn test_native_endianness() {
        #[cfg(target_endian = "little")]
        assert_eq!(Endianness::native(), Endianness::Little);
        #[cfg(target_endian = "big")]
        assert_eq!(Endianness::native(), Endianness::Big);
    }

    #[test]
    fn test_big_endian_roundtrip() {
        let path = temporary_path("big-endian.bin");

        {
            let mut file = BinaryFile::open(&path, OpenMode::Write, Endianness::Big).unwrap();
            file.write_i32(-42).unwrap();
            file.write_f64(3.5).unwrap();
            file.write_f32_slice(&[1.0, 2.0, 3.0]).unwrap();
            file.write_bytes(b"CORD").unwrap();
            assert_eq!(file.tell(), 4 + 8 + 12 + 4);
        }

        // the on-disk layout is big-endian
        let raw = std::fs::read(&path).unwrap();
        assert_eq!(raw.len(), 28);
        assert_eq!(&raw[..4], &[0xFF, 0xFF, 0xFF, 0xD6]);

        let mut file = BinaryFile::open(&path, OpenMode::Read, Endianness::Big).unwrap();
        assert_eq!(file.file_size(), 28);
        assert_eq!(file.read_i32().unwrap(), -42);
        assert_eq!(file.read_f64().unwrap(), 3.5);
        let mut values = [0.0_f32; 3];
        file.read_f32_into(&mut values).unwrap();
        assert_eq!(values, [1.0, 2.0, 3.0]);
        let mut magic = [0_u8; 4];
        file.read_bytes(&mut magic).unwrap();
        assert_eq!(&magic, b"CORD");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_little_endian_roundtrip() {
        let path = temporary_path("little-endian.bin");

        {
            let mut file = BinaryFile::open(&path, OpenMode::Write, Endianness::Little).unwrap();
            file.write_u16(0x0102).unwrap();
            file.write_i64(-1).unwrap();
        }

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &[0x02, 0x01]);

        let mut file = BinaryFile::open(&path, OpenMode::Read, Endianness::Little).unwrap();
        assert_eq!(file.read_u16().unwrap(), 0x0102);
        assert_eq!(file.read_i64().unwrap(), -1);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_seek_and_patch() {
        let path = temporary_path("seek-patch.bin");

        {
            let mut file = BinaryFile::open(&path, OpenMode::Write, Endianness::Little).unwrap();
            file.write_i32(0).unwrap();
            file.write_i32(22).unwrap();

            // patch the first value, like the DCD frame counter
            let current = file.tell();
            file.seek(0);
            file.write_i32(7).unwrap();
            file.seek(current);
            file.write_i32(33).unwrap();
        }

        let mut file = BinaryFile::open(&path, OpenMode::Read, Endianness::Little).unwrap();
        assert_eq!(file.file_size(), 12);
        assert_eq!(file.read_i32().unwrap(), 7);
        assert_eq!(file.read_i32().unwrap(), 22);
        assert_eq!(file.read_i32().unwrap(), 33);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_past_end() {
        let path = temporary_path("read-past-end.bin");

        {
            let mut file = BinaryFile::open(&path, OpenMode::Write, Endianness::Little).unwrap();
            file.write_i32(1).unwrap();
        }

        let mut file = BinaryFile::open(&path, OpenMode::Read, Endianness::Little).unwrap();
        file.seek(2);
        assert!(file.read_i32().is_err());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append() {
        let path = temporary_path("append.bin");

        {
            let mut file = BinaryFile::open(&path, OpenMode::Write, Endianness::Little).unwrap();
            file.write_i32(1).unwrap();
        }
        {
            let mut file = BinaryFile::open(&path, OpenMode::Append, Endianness::Little).unwrap();
            assert_eq!(file.tell(), 4);
            assert_eq!(file.file_size(), 4);
            file.write_i32(2).unwrap();
        }

        let mut file = BinaryFile::open(&path, OpenMode::Read, Endianness::Little).unwrap();
        assert_eq!(file.file_size(), 8);
        assert_eq!(file.read_i32().unwrap(), 1);
        assert_eq!(file.read_i32().unwrap(), 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_write_across_mmap_window() {
        let path = temporary_path("remap.bin");

        {
            // a tiny initial window forces the remap code path
            let mut file =
                BinaryFile::open_with_window(&path, OpenMode::Write, Endianness::Little, 8192)
                    .unwrap();
            for i in 0..16 * 1024_i32 {
                file.write_i32(i).unwrap();
            }
        }

        let mut file = BinaryFile::open(&path, OpenMode::Read, Endianness::Little).unwrap();
        assert_eq!(file.file_size(), 64 * 1024);
        file.seek(4 * 12345);
        assert_eq!(file.read_i32().unwrap(), 12345);

        std::fs::remove_file(&path).unwrap();
    }
}
