use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An open media file plus the access mode it was opened with.
///
/// Reads and writes go straight to the OS handle, so a write is visible to
/// the next read through the same handle.
#[derive(Debug)]
pub struct FileHandle {
    file: File,
    path: PathBuf,
    writable: bool,
}

impl FileHandle {
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self { file, path, writable: false })
    }

    pub fn open_rw(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Ok(Self { file, path, writable: true })
    }

    /// Reopen `path` with the same access mode as `self` had.
    pub fn reopen(path: impl AsRef<Path>, writable: bool) -> Result<Self> {
        if writable { Self::open_rw(path) } else { Self::open_read(path) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn seek_to(&mut self, pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos)).map_err(Error::Seek)?;
        Ok(())
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    /// Fill `buf` completely or fail with [`Error::Truncated`].
    pub fn read_exact_at(&mut self, pos: u64, buf: &mut [u8]) -> Result<()> {
        self.seek_to(pos)?;
        self.file.read_exact(buf).map_err(Error::from_read)
    }

    /// Read up to `buf.len()` bytes; short reads are not an error.
    pub fn read_partial(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf)?)
    }

    pub fn write_all_at(&mut self, pos: u64, bytes: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::ReadOnly);
        }
        self.seek_to(pos)?;
        self.file.write_all(bytes).map_err(Error::WriteFailed)
    }

    pub fn truncate(&mut self, len: u64) -> Result<()> {
        if !self.writable {
            return Err(Error::ReadOnly);
        }
        self.file.set_len(len).map_err(Error::WriteFailed)
    }

    /// Flush file contents to durable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush().map_err(Error::WriteFailed)?;
        self.file.sync_all().map_err(Error::WriteFailed)
    }
}

impl Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for FileHandle {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn read_only_handle_rejects_writes() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"abcdefgh").unwrap();

        let mut fh = FileHandle::open_read(tmp.path()).unwrap();
        assert!(!fh.is_writable());
        assert!(matches!(fh.write_all_at(0, b"x"), Err(Error::ReadOnly)));
        assert!(matches!(fh.truncate(2), Err(Error::ReadOnly)));
        assert_eq!(fh.size().unwrap(), 8);
    }

    #[test]
    fn writes_are_visible_to_reads() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"abcdefgh").unwrap();

        let mut fh = FileHandle::open_rw(tmp.path()).unwrap();
        fh.write_all_at(2, b"XY").unwrap();
        let mut buf = [0u8; 4];
        fh.read_exact_at(0, &mut buf).unwrap();
        assert_eq!(&buf, b"abXY");

        fh.truncate(3).unwrap();
        assert_eq!(fh.size().unwrap(), 3);
        let mut big = [0u8; 8];
        assert!(matches!(fh.read_exact_at(0, &mut big), Err(Error::Truncated)));

        fh.seek_to(1).unwrap();
        assert_eq!(fh.position().unwrap(), 1);
        assert_eq!(fh.read_partial(&mut big).unwrap(), 2);
    }
}
