//! Injected file I/O.
//!
//! Banks are never read through `std::fs` directly. The loaders take an
//! [`IoProvider`] and pull all bytes through the handles it opens, so a
//! host can serve bank data from plain files, archives, or memory
//! buffers without the loaders knowing the difference.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opens bank files for the loaders.
pub trait IoProvider: Send + Sync {
    /// Open the file at `path` for reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn IoHandle>>;
}

/// An open, seekable bank file. The file is closed when the handle is
/// dropped.
pub trait IoHandle: Send {
    /// Read up to `buf.len()` bytes, returning the number read. Zero
    /// means end of file.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Reposition the read cursor, returning the new absolute offset.
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    /// Current absolute read position.
    fn tell(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::Current(0))
    }
}

/// Default provider backed by the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileIo;

impl IoProvider for FileIo {
    fn open(&self, path: &Path) -> io::Result<Box<dyn IoHandle>> {
        Ok(Box::new(FileHandle(File::open(path)?)))
    }
}

struct FileHandle(File);

impl IoHandle for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }
}

/// Provider serving banks from in-memory buffers, keyed by path.
///
/// Useful for hosts that embed banks in their binary, and for tests.
#[derive(Default)]
pub struct MemoryIo {
    files: HashMap<PathBuf, Arc<[u8]>>,
}

impl MemoryIo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` under `path`.
    pub fn insert(&mut self, path: impl Into<PathBuf>, data: Vec<u8>) {
        self.files.insert(path.into(), data.into());
    }
}

impl IoProvider for MemoryIo {
    fn open(&self, path: &Path) -> io::Result<Box<dyn IoHandle>> {
        let data = self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))
        })?;
        Ok(Box::new(MemoryHandle { data, pos: 0 }))
    }
}

struct MemoryHandle {
    data: Arc<[u8]>,
    pos: u64,
}

impl IoHandle for MemoryHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = (self.pos as usize).min(self.data.len());
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let next = match pos {
            SeekFrom::Start(n) => n as i64,
            SeekFrom::Current(n) => self.pos as i64 + n,
            SeekFrom::End(n) => self.data.len() as i64 + n,
        };
        if next < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of buffer",
            ));
        }
        self.pos = next as u64;
        Ok(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_io_read_and_seek() {
        let mut io = MemoryIo::new();
        io.insert("/bank.sf2", vec![1, 2, 3, 4, 5]);
        let mut h = io.open(Path::new("/bank.sf2")).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(h.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(h.tell().unwrap(), 3);

        h.seek(SeekFrom::Start(1)).unwrap();
        assert_eq!(h.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [2, 3, 4]);

        // reads past the end are short, not errors
        h.seek(SeekFrom::Start(4)).unwrap();
        assert_eq!(h.read(&mut buf).unwrap(), 1);
        assert_eq!(h.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_memory_io_missing_file() {
        let io = MemoryIo::new();
        assert!(io.open(Path::new("/nope")).is_err());
    }
}
