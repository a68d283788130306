//! xz/lzma-compressed text file backend

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use xz2::read::XzDecoder;
use xz2::write::XzEncoder;

use crate::error::{Error, Result};
use crate::files::text::TextFileImpl;
use crate::files::OpenMode;
use crate::warnings::warning;

/// Compression level used when writing xz files
const XZ_LEVEL: u32 = 6;

enum XzStream {
    Reader(XzDecoder<File>),
    Writer(Option<XzEncoder<File>>),
}

/// Text file backend decompressing xz data on the fly.
///
/// Seeking backward resets the decoder and decompresses from the start of
/// the stream again, like the other compressed backends.
pub(crate) struct XzFile {
    path: PathBuf,
    stream: XzStream,
    /// current position in the decompressed stream (read mode)
    position: u64,
}

impl XzFile {
    pub fn open(path: &Path, mode: OpenMode) -> Result<XzFile> {
        let stream = match mode {
            OpenMode::Read => {
                let file = File::open(path).map_err(|e| {
                    Error::File(format!("could not open file at '{}': {}", path.display(), e))
                })?;
                XzStream::Reader(XzDecoder::new(file))
            }
            OpenMode::Write => {
                let file = File::create(path).map_err(|e| {
                    Error::File(format!("could not open file at '{}': {}", path.display(), e))
                })?;
                XzStream::Writer(Some(XzEncoder::new(file, XZ_LEVEL)))
            }
            OpenMode::Append => {
                return Err(Error::File(format!(
                    "can not open the xz file at '{}' in append mode",
                    path.display()
                )));
            }
        };

        Ok(XzFile {
            path: path.to_path_buf(),
            stream,
            position: 0,
        })
    }

    fn discard(&mut self, mut count: u64) -> Result<()> {
        let mut scratch = [0_u8; 8192];
        while count > 0 {
            let chunk = std::cmp::min(count, scratch.len() as u64) as usize;
            let read = self.read(&mut scratch[..chunk])?;
            if read == 0 {
                return Err(Error::File(format!(
                    "tried to seek past the end of the xz file at '{}'",
                    self.path.display()
                )));
            }
            count -= read as u64;
        }
        Ok(())
    }
}

impl TextFileImpl for XzFile {
    fn seek(&mut self, position: u64) -> Result<()> {
        match &mut self.stream {
            XzStream::Reader(_) => {
                if position < self.position {
                    let file = File::open(&self.path).map_err(|e| {
                        Error::File(format!(
                            "could not open file at '{}': {}",
                            self.path.display(),
                            e
                        ))
                    })?;
                    self.stream = XzStream::Reader(XzDecoder::new(file));
                    self.position = 0;
                }
                let skip = position - self.position;
                self.discard(skip)
            }
            XzStream::Writer(_) => Err(Error::File(
                "can not seek in a compressed file opened in write mode".into(),
            )),
        }
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        match &mut self.stream {
            XzStream::Reader(decoder) => {
                let count = decoder
                    .read(data)
                    .map_err(|e| Error::File(format!("xz decompression failed: {}", e)))?;
                self.position += count as u64;
                Ok(count)
            }
            XzStream::Writer(_) => Err(Error::File(
                "can not read an xz file opened in write mode".into(),
            )),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match &mut self.stream {
            XzStream::Writer(Some(encoder)) => encoder
                .write(data)
                .map_err(|e| Error::File(format!("xz compression failed: {}", e))),
            _ => Err(Error::File(
                "can not write to an xz file opened in read mode".into(),
            )),
        }
    }
}

impl Drop for XzFile {
    fn drop(&mut self) {
        if let XzStream::Writer(encoder) = &mut self.stream {
            if let Some(encoder) = encoder.take() {
                if let Err(e) = encoder.finish() {
                    warning(
                        "xz writer",
                        format!("failed to finish the compressed stream: {}", e),
                    );
                }
            }
        }
    }
}
