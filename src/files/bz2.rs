//! bzip2-compressed text file backend

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;

use crate::error::{Error, Result};
use crate::files::text::TextFileImpl;
use crate::files::OpenMode;
use crate::warnings::warning;

enum Bz2Stream {
    Reader(BzDecoder<File>),
    Writer(Option<BzEncoder<File>>),
}

/// Text file backend decompressing bzip2 data on the fly.
///
/// Like gzip, bzip2 streams are sequential: seeking backward resets the
/// decoder and decompresses from the start of the file again.
pub(crate) struct Bz2File {
    path: PathBuf,
    stream: Bz2Stream,
    /// current position in the decompressed stream (read mode)
    position: u64,
}

impl Bz2File {
    pub fn open(path: &Path, mode: OpenMode) -> Result<Bz2File> {
        let stream = match mode {
            OpenMode::Read => {
                let file = File::open(path).map_err(|e| {
                    Error::File(format!("could not open file at '{}': {}", path.display(), e))
                })?;
                Bz2Stream::Reader(BzDecoder::new(file))
            }
            OpenMode::Write => {
                let file = File::create(path).map_err(|e| {
                    Error::File(format!("could not open file at '{}': {}", path.display(), e))
                })?;
                Bz2Stream::Writer(Some(BzEncoder::new(file, bzip2::Compression::default())))
            }
            OpenMode::Append => {
                return Err(Error::File(format!(
                    "can not open the bzip2 file at '{}' in append mode",
                    path.display()
                )));
            }
        };

        Ok(Bz2File {
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
                    "tried to seek past the end of the bzip2 file at '{}'",
                    self.path.display()
                )));
            }
            count -= read as u64;
        }
        Ok(())
    }
}

impl TextFileImpl for Bz2File {
    fn seek(&mut self, position: u64) -> Result<()> {
        match &mut self.stream {
            Bz2Stream::Reader(_) => {
                if position < self.position {
                    let file = File::open(&self.path).map_err(|e| {
                        Error::File(format!(
                            "could not open file at '{}': {}",
                            self.path.display(),
                            e
                        ))
                    })?;
                    self.stream = Bz2Stream::Reader(BzDecoder::new(file));
                    self.position = 0;
                }
                let skip = position - self.position;
                self.discard(skip)
            }
            Bz2Stream::Writer(_) => Err(Error::File(
                "can not seek in a compressed file opened in write mode".into(),
            )),
        }
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        match &mut self.stream {
            Bz2Stream::Reader(decoder) => {
                let count = decoder
                    .read(data)
                    .map_err(|e| Error::File(format!("bzip2 decompression failed: {}", e)))?;
                self.position += count as u64;
                Ok(count)
            }
            Bz2Stream::Writer(_) => Err(Error::File(
                "can not read a bzip2 file opened in write mode".into(),
            )),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        match &mut self.stream {
            Bz2Stream::Writer(Some(encoder)) => encoder
                .write(data)
                .map_err(|e| Error::File(format!("bzip2 compression failed: {}", e))),
            _ => Err(Error::File(
                "can not write to a bzip2 file opened in read mode".into(),
            )),
        }
    }
}

impl Drop for Bz2File {
    fn drop(&mut self) {
        if let Bz2Stream::Writer(encoder) = &mut self.stream {
            if let Some(encoder) = encoder.take() {
                if let Err(e) = encoder.finish() {
                    warning(
                        "bzip2 writer",
                        format!("failed to finish the compressed stream: {}", e),
                    );
                }
            }
        }
    }
}
