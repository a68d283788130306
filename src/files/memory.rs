//! In-memory file backend

use std::io::Read;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::files::text::TextFileImpl;
use crate::files::{Compression, OpenMode};

/// A byte buffer backing an in-memory file: either a growable owned vector
/// (write mode) or read-only data.
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    data: Vec<u8>,
    writable: bool,
}

impl MemoryBuffer {
    /// Create an empty, writable buffer
    pub fn new() -> MemoryBuffer {
        MemoryBuffer {
            data: Vec::with_capacity(8192),
            writable: true,
        }
    }

    /// Create a read-only buffer with a copy of `data`
    pub fn from_data(data: &[u8]) -> MemoryBuffer {
        MemoryBuffer {
            data: data.to_vec(),
            writable: false,
        }
    }

    /// The current content of the buffer
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size of the buffer content, in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if !self.writable {
            return Err(Error::File("can not write to a read-only memory buffer".into()));
        }
        self.data.extend_from_slice(data);
        Ok(data.len())
    }

    /// Replace the buffer content with its decompressed form
    pub fn decompress(&mut self, compression: Compression) -> Result<()> {
        let decompressed = match compression {
            Compression::None => return Ok(()),
            Compression::Gzip => {
                let mut decoder = flate2::read::MultiGzDecoder::new(self.data.as_slice());
                let mut output = Vec::new();
                decoder
                    .read_to_end(&mut output)
                    .map_err(|e| Error::File(format!("gzip decompression failed: {}", e)))?;
                output
            }
            Compression::Bzip2 => {
                let mut decoder = bzip2::read::BzDecoder::new(self.data.as_slice());
                let mut output = Vec::new();
                decoder
                    .read_to_end(&mut output)
                    .map_err(|e| Error::File(format!("bzip2 decompression failed: {}", e)))?;
                output
            }
            Compression::Lzma => {
                let mut decoder = xz2::read::XzDecoder::new(self.data.as_slice());
                let mut output = Vec::new();
                decoder
                    .read_to_end(&mut output)
                    .map_err(|e| Error::File(format!("xz decompression failed: {}", e)))?;
                output
            }
        };

        self.data = decompressed;
        Ok(())
    }
}

/// A [`MemoryBuffer`] shared between a trajectory and its format
/// implementation
#[derive(Debug, Clone, Default)]
pub struct SharedMemoryBuffer(Arc<RwLock<MemoryBuffer>>);

impl SharedMemoryBuffer {
    /// Wrap a buffer for sharing
    pub fn new(buffer: MemoryBuffer) -> SharedMemoryBuffer {
        SharedMemoryBuffer(Arc::new(RwLock::new(buffer)))
    }

    /// Copy the current content of the buffer
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.read().expect("memory buffer lock poisoned").data().to_vec()
    }

    /// Size of the buffer content, in bytes
    pub fn len(&self) -> usize {
        self.0.read().expect("memory buffer lock poisoned").len()
    }

    /// Check whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn decompress(&self, compression: Compression) -> Result<()> {
        self.0
            .write()
            .expect("memory buffer lock poisoned")
            .decompress(compression)
    }

    fn read_at(&self, position: usize, data: &mut [u8]) -> usize {
        let buffer = self.0.read().expect("memory buffer lock poisoned");
        let content = buffer.data();
        if position >= content.len() {
            return 0;
        }
        let count = std::cmp::min(data.len(), content.len() - position);
        data[..count].copy_from_slice(&content[position..position + count]);
        count
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        self.0.write().expect("memory buffer lock poisoned").write(data)
    }
}

/// Text file backend over a shared in-memory buffer
pub(crate) struct MemoryFile {
    buffer: SharedMemoryBuffer,
    position: usize,
    mode: OpenMode,
}

impl MemoryFile {
    pub fn new(buffer: SharedMemoryBuffer, mode: OpenMode) -> MemoryFile {
        MemoryFile {
            buffer,
            position: 0,
            mode,
        }
    }
}

impl TextFileImpl for MemoryFile {
    fn seek(&mut self, position: u64) -> Result<()> {
        self.position = crate::error::checked_usize(position)?;
        Ok(())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        if self.mode != OpenMode::Read {
            return Err(Error::File("can not read a memory file opened in write mode".into()));
        }
        let count = self.buffer.read_at(self.position, data);
        self.position += count;
        Ok(count)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.mode != OpenMode::Write {
            return Err(Error::File("can not write to a memory file opened in read mode".into()));
        }
        let count = self.buffer.write(data)?;
        self.position += count;
        Ok(count)
    }
}
