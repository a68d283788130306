//! Buffered text file with transparent decompression
//!
//! `TextFile` wraps one of several byte-stream implementations (plain file,
//! gzip, bzip2, xz, in-memory buffer) behind a line-oriented interface. All
//! positions are logical offsets in the decompressed stream, so formats can
//! index frames by byte offset regardless of the compression used.

use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};
use crate::files::bz2::Bz2File;
use crate::files::gz::GzFile;
use crate::files::memory::{MemoryFile, SharedMemoryBuffer};
use crate::files::plain::PlainFile;
use crate::files::xz::XzFile;
use crate::files::{Compression, OpenMode};

/// Initial size of the read buffer
const BUFFER_SIZE: usize = 8192;

/// Byte-stream backend for a [`TextFile`].
///
/// A return value of 0 from `read` means the end of the stream was reached.
/// `seek` positions are in the decompressed stream.
pub(crate) trait TextFileImpl: Send {
    fn clear(&mut self) {}
    fn seek(&mut self, position: u64) -> Result<()>;
    fn read(&mut self, data: &mut [u8]) -> Result<usize>;
    fn write(&mut self, data: &[u8]) -> Result<usize>;
}

/// A line-oriented text file, with optional transparent compression
pub struct TextFile {
    path: String,
    mode: OpenMode,
    imp: Box<dyn TextFileImpl>,
    buffer: Vec<u8>,
    /// start of the unread data in `buffer`
    start: usize,
    /// end of the valid data in `buffer`
    end: usize,
    /// position in the decompressed stream corresponding to `buffer[0]`
    position: u64,
    /// the backend reached the end of the stream
    got_impl_eof: bool,
    /// a read operation actually hit the end of the file
    eof: bool,
}

impl TextFile {
    /// Open the text file at `path` with the given mode and compression.
    ///
    /// Append mode is only supported for uncompressed files.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, compression: Compression) -> Result<TextFile> {
        let path = path.as_ref();
        if mode == OpenMode::Append && compression != Compression::None {
            return Err(Error::File(format!(
                "can not open '{}' in append mode with compression",
                path.display()
            )));
        }

        let imp: Box<dyn TextFileImpl> = match compression {
            Compression::None => Box::new(PlainFile::open(path, mode)?),
            Compression::Gzip => Box::new(GzFile::open(path, mode)?),
            Compression::Bzip2 => Box::new(Bz2File::open(path, mode)?),
            Compression::Lzma => Box::new(XzFile::open(path, mode)?),
        };

        Ok(TextFile::from_impl(path.display().to_string(), mode, imp))
    }

    /// Open a text file over an in-memory buffer.
    ///
    /// Compressed buffers are eagerly decompressed when opened for reading;
    /// writing with compression and appending are not supported for
    /// in-memory files.
    pub fn open_memory(
        buffer: SharedMemoryBuffer,
        mode: OpenMode,
        compression: Compression,
    ) -> Result<TextFile> {
        match mode {
            OpenMode::Append => {
                return Err(Error::File(
                    "can not append to an in-memory file".into(),
                ));
            }
            OpenMode::Write => {
                if compression != Compression::None {
                    return Err(Error::File(
                        "can not write to a compressed in-memory file".into(),
                    ));
                }
            }
            OpenMode::Read => {
                if compression != Compression::None {
                    buffer.decompress(compression)?;
                }
            }
        }

        let imp = Box::new(MemoryFile::new(buffer, mode));
        Ok(TextFile::from_impl("<memory>".into(), mode, imp))
    }

    fn from_impl(path: String, mode: OpenMode, imp: Box<dyn TextFileImpl>) -> TextFile {
        TextFile {
            path,
            mode,
            imp,
            buffer: vec![0; BUFFER_SIZE],
            start: 0,
            end: 0,
            position: 0,
            got_impl_eof: false,
            eof: false,
        }
    }

    /// Path used to open this file
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current position in the decompressed stream
    pub fn tell_pos(&self) -> u64 {
        self.position + self.start as u64
    }

    /// Move to `position` in the decompressed stream
    pub fn seek_pos(&mut self, position: u64) -> Result<()> {
        self.imp.seek(position)?;
        self.position = position;
        self.start = 0;
        self.end = 0;
        self.got_impl_eof = false;
        self.eof = false;
        Ok(())
    }

    /// Reset the position to the start of the file and clear the eof flag
    pub fn rewind(&mut self) -> Result<()> {
        self.clear();
        self.seek_pos(0)
    }

    /// Check whether a read operation reached the end of the file
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Clear the end-of-file flag
    pub fn clear(&mut self) {
        self.eof = false;
        self.got_impl_eof = false;
        self.imp.clear();
    }

    /// Read a single line from the file.
    ///
    /// `\n`, `\r` and `\r\n` all delimit lines; the terminator is not
    /// included in the returned string. Reaching the end of the file
    /// mid-line returns the partial line and sets the eof flag; reading
    /// past the end returns empty strings.
    pub fn read_line(&mut self) -> Result<String> {
        if self.mode == OpenMode::Write {
            return Err(Error::File(format!(
                "the file at '{}' was not opened in read mode",
                self.path
            )));
        }

        loop {
            let data = &self.buffer[self.start..self.end];
            if let Some(i) = data.iter().position(|&c| c == b'\n' || c == b'\r') {
                if data[i] == b'\r' && i + 1 == data.len() && !self.got_impl_eof {
                    // the terminator might be the first half of a \r\n pair
                    // that is split across the buffer boundary
                    self.refill()?;
                    continue;
                }

                let line = String::from_utf8_lossy(&data[..i]).into_owned();
                let mut consumed = i + 1;
                if data[i] == b'\r' && data.get(i + 1) == Some(&b'\n') {
                    consumed += 1;
                }
                self.start += consumed;
                return Ok(line);
            }

            if self.got_impl_eof {
                let line = String::from_utf8_lossy(data).into_owned();
                self.start = self.end;
                self.eof = true;
                return Ok(line);
            }

            self.refill()?;
        }
    }

    /// Read the entire remaining content of the file
    pub fn read_all(&mut self) -> Result<String> {
        if self.mode == OpenMode::Write {
            return Err(Error::File(format!(
                "the file at '{}' was not opened in read mode",
                self.path
            )));
        }

        let mut content = self.buffer[self.start..self.end].to_vec();
        self.position += self.end as u64;
        self.start = 0;
        self.end = 0;

        let mut chunk = [0_u8; BUFFER_SIZE];
        loop {
            let count = self.imp.read(&mut chunk)?;
            if count == 0 {
                break;
            }
            content.extend_from_slice(&chunk[..count]);
            self.position += count as u64;
        }

        self.got_impl_eof = true;
        self.eof = true;
        Ok(String::from_utf8_lossy(&content).into_owned())
    }

    /// Write formatted data to the file.
    ///
    /// This is usually called through the `write!`-like formatting macros:
    /// `file.print(format_args!("{} atoms\n", count))`.
    pub fn print(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        if self.mode == OpenMode::Read {
            return Err(Error::File(format!(
                "the file at '{}' was not opened in write or append mode",
                self.path
            )));
        }

        let data = match args.as_str() {
            Some(s) => s.to_string(),
            None => args.to_string(),
        };
        let mut remaining = data.as_bytes();
        while !remaining.is_empty() {
            let written = self.imp.write(remaining)?;
            if written == 0 {
                return Err(Error::File(format!(
                    "failed to write {} bytes to the file at '{}'",
                    remaining.len(),
                    self.path
                )));
            }
            remaining = &remaining[written..];
            self.position += written as u64;
        }
        Ok(())
    }

    fn refill(&mut self) -> Result<()> {
        // move the unread data to the front of the buffer
        if self.start > 0 {
            self.buffer.copy_within(self.start..self.end, 0);
            self.position += self.start as u64;
            self.end -= self.start;
            self.start = 0;
        }

        // the whole buffer contains a single unfinished line, grow it
        if self.end == self.buffer.len() {
            self.buffer.resize(2 * self.buffer.len(), 0);
        }

        let count = self.imp.read(&mut self.buffer[self.end..])?;
        if count == 0 {
            self.got_impl_eof = true;
        } else {
            self.end += count;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TextFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextFile")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("position", &self.tell_pos())
            .field("eof", &self.eof)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::memory::MemoryBuffer;

    fn memory_reader(content: &str) -> TextFile {
        let buffer = SharedMemoryBuffer::new(MemoryBuffer::from_data(content.as_bytes()));
        TextFile::open_memory(buffer, OpenMode::Read, Compression::None).unwrap()
    }

    #[test]
    fn test_read_lines() {
        let mut file = memory_reader("first\nsecond\r\nthird\rfourth");
        assert_eq!(file.read_line().unwrap(), "first");
        assert_eq!(file.read_line().unwrap(), "second");
        assert_eq!(file.read_line().unwrap(), "third");
        assert!(!file.eof());

        // partial last line
        assert_eq!(file.read_line().unwrap(), "fourth");
        assert!(file.eof());

        // reading past the end gives empty strings
        assert_eq!(file.read_line().unwrap(), "");
        assert_eq!(file.read_line().unwrap(), "");
        assert!(file.eof());
    }

    #[test]
    fn test_tell_and_seek() {
        let mut file = memory_reader("first\nsecond\nthird\n");
        assert_eq!(file.tell_pos(), 0);
        file.read_line().unwrap();
        assert_eq!(file.tell_pos(), 6);

        file.seek_pos(13).unwrap();
        assert_eq!(file.read_line().unwrap(), "third");

        file.rewind().unwrap();
        assert_eq!(file.tell_pos(), 0);
        assert_eq!(file.read_line().unwrap(), "first");
    }

    #[test]
    fn test_clear_after_eof() {
        let mut file = memory_reader("only line");
        assert_eq!(file.read_line().unwrap(), "only line");
        assert!(file.eof());

        file.clear();
        assert!(!file.eof());
        file.seek_pos(0).unwrap();
        assert_eq!(file.read_line().unwrap(), "only line");
    }

    #[test]
    fn test_read_all() {
        let mut file = memory_reader("first\nsecond\n");
        assert_eq!(file.read_all().unwrap(), "first\nsecond\n");
        assert!(file.eof());

        file.rewind().unwrap();
        file.read_line().unwrap();
        assert_eq!(file.read_all().unwrap(), "second\n");
    }

    #[test]
    fn test_long_lines() {
        let long = "a".repeat(3 * BUFFER_SIZE);
        let content = format!("{}\nnext\n", long);
        let mut file = memory_reader(&content);
        assert_eq!(file.read_line().unwrap(), long);
        assert_eq!(file.read_line().unwrap(), "next");
        assert_eq!(file.tell_pos(), content.len() as u64);
    }

    #[test]
    fn test_write_to_memory() {
        let buffer = SharedMemoryBuffer::new(MemoryBuffer::new());
        let mut file =
            TextFile::open_memory(buffer.clone(), OpenMode::Write, Compression::None).unwrap();

        file.print(format_args!("{} atoms\n", 42)).unwrap();
        file.print(format_args!("done\n")).unwrap();
        assert_eq!(file.tell_pos(), 14);

        assert_eq!(buffer.to_vec(), b"42 atoms\ndone\n");
    }

    #[test]
    fn test_no_compressed_memory_write() {
        let buffer = SharedMemoryBuffer::new(MemoryBuffer::new());
        let result = TextFile::open_memory(buffer, OpenMode::Write, Compression::Gzip);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_memory_append() {
        let buffer = SharedMemoryBuffer::new(MemoryBuffer::new());
        let result = TextFile::open_memory(buffer, OpenMode::Append, Compression::None);
        assert!(result.is_err());
    }
}
