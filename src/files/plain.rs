//! Plain, uncompressed text file backend

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::files::text::TextFileImpl;
use crate::files::OpenMode;

/// Text file backend reading and writing directly to an on-disk file
pub(crate) struct PlainFile {
    file: File,
}

impl PlainFile {
    pub fn open(path: &Path, mode: OpenMode) -> Result<PlainFile> {
        let result = match mode {
            OpenMode::Read => File::open(path),
            OpenMode::Write => File::create(path),
            OpenMode::Append => OpenOptions::new()
                .read(true)
                .append(true)
                .create(true)
                .open(path),
        };

        let file = result.map_err(|e| {
            Error::File(format!("could not open file at '{}': {}", path.display(), e))
        })?;
        Ok(PlainFile { file })
    }
}

impl TextFileImpl for PlainFile {
    fn seek(&mut self, position: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(data)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        Ok(self.file.write(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::{Compression, TextFile};

    fn temporary_path(name: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("molio-plain-{}-{}", std::process::id(), name));
        path
    }

    #[test]
    fn test_roundtrip() {
        let path = temporary_path("roundtrip.txt");

        {
            let mut file = TextFile::open(&path, OpenMode::Write, Compression::None).unwrap();
            file.print(format_args!("first line\n")).unwrap();
            file.print(format_args!("value = {}\n", 42)).unwrap();
        }

        let mut file = TextFile::open(&path, OpenMode::Read, Compression::None).unwrap();
        assert_eq!(file.read_line().unwrap(), "first line");
        assert_eq!(file.read_line().unwrap(), "value = 42");
        file.read_line().unwrap();
        assert!(file.eof());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_append() {
        let path = temporary_path("append.txt");

        {
            let mut file = TextFile::open(&path, OpenMode::Write, Compression::None).unwrap();
            file.print(format_args!("first\n")).unwrap();
        }
        {
            let mut file = TextFile::open(&path, OpenMode::Append, Compression::None).unwrap();
            file.print(format_args!("second\n")).unwrap();
        }

        let mut file = TextFile::open(&path, OpenMode::Read, Compression::None).unwrap();
        assert_eq!(file.read_all().unwrap(), "first\nsecond\n");

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let path = temporary_path("does-not-exist.txt");
        assert!(TextFile::open(&path, OpenMode::Read, Compression::None).is_err());
    }
}
