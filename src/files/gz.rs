//! gzip-compressed text file backend

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::error::{Error, Result};
use crate::files::text::TextFileImpl;
use crate::files::OpenMode;
use crate::warnings::warning;

enum GzStream {
    Reader(MultiGzDecoder<File>),
    Writer(Option<GzEncoder<File>>),
}

/// Text file backend decompressing gzip data on the fly.
///
/// gzip streams do not support random access: seeking backward resets the
/// decoder and decompresses from the start of the file again. This is fine
/// for the sequential access patterns of the text formats.
pub(crate) struct GzFile {
    path: PathBuf,
    stream: GzStream,
    /// current position in the decompressed stream (read mode)
    position: u64,
}

impl GzFile {
    pub fn open(path: &Path, mode: OpenMode) -> Result<GzFile> {
        let stream = match mode {
            OpenMode::Read => {
                let file = File::open(path).map_err(|e| {
                    Error::File(format!("could not open file at '{}': {}", path.display(), e))
                })?;
                GzStream::Reader(MultiGzDecoder::new(file))
            }
            OpenMode::Write => {
                let file = File::create(path).map_err(|e| {
                    Error::File(format!("could not open file at '{}': {}", path.display(), e))
                })?;
                GzStream::Writer(Some(GzEncoder::new(file, flate2::Compression::default())))
            }
            OpenMode::Append => {
                return Err(Error::File(format!(
                    "can not open the gzip file at '{}' in append mode",
                    path.display()
                )));
            }
        };

        Ok(GzFile {
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
                    "tried to seek past the end of the gzip file at '{}'",
                    self.path.display()
                )));
            }
            count -= read as u64;
        }
        Ok(())
    }
}

impl TextFileImpl for GzFile {
    fn seek(&mut self, position: u64) -> Result<()> {
        match &mut self.stream {
            GzStream::Reader(_) => {
                if position < self.position {
                    // gzip does not support backward seeks, restart the
                    // decoder from the beginning of the file
                    let file = File::open(&self.path).map_err(|e| {
                        Error::File(format!(
                            "could not open file at '{}': {}",
                            self.path.display(),
                            e
                        ))
                    })?;
                    self.stream = GzStream::Reader(MultiGzDecoder::new(file));
                    self.position = 0;
                }
                let skip = position - self.position;
                self.discard(skip)
            }
            GzStream::Writer(_) => Err(Error::File(
                "can not seek in a compressed file opened in write mode".into(),
            )),
        }
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        match &mut self.stream {
            GzStream::Reader(decoder) => {
                let count = decoder
                    .read(data)
                    .map_err(|e| Error::File(format!("gzip decompression failed: {}", e)))?;
                self.position += count as u64;
                Ok(count)
            }
            GzStream::Writer(_) => Err(Error::File(
                "can not read a gzip file opened in write mode".into(),
            )),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match &mut self.stream {
            GzStream::Writer(Some(encoder)) => encoder
                .write(data)
                .map_err(|e| Error::File(format!("gzip compression failed: {}", e))),
            _ => Err(Error::File(
                "can not write to a gzip file opened in read mode".into(),
            )),
        }
    }
}

impl Drop for GzFile {
    fn drop(&mut self) {
        if let GzStream::Writer(encoder) = &mut self.stream {
            if let Some(encoder) = encoder.take() {
                if let Err(e) = encoder.finish() {
                    warning(
                        "gzip writer",
                        format!("failed to finish the compressed stream: {}", e),
                    );
                }
            }
        }
    }
}
