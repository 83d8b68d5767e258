//! Random-access file storage
//!
//! Reads and writes are positioned (`pread`/`pwrite` style): every access names
//! its own offset and never relies on the file cursor. On Windows the cursor is
//! still moved as a side effect, so nothing else using the same handle may
//! assume a cursor position. Mutable files are pre-extended to their full size
//! on open by writing a single zero byte at the final offset.

use crate::storage::{check_bounds, MutableStorage, Storage, StorageAllocator};
use crate::{FilterError, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

// `seek_read` and `seek_write` leave the cursor after the accessed range
#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn file_len(file: &File) -> Result<usize> {
    let len = file.metadata()?.len();
    usize::try_from(len).map_err(|_| {
        FilterError::StorageAllocation(format!("file of {} bytes exceeds address space", len))
    })
}

/// How a mutable file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Open read/write, creating the file if missing and keeping existing content
    #[default]
    ReadWrite,
    /// Create or truncate the file
    Truncate,
    /// Create the file, failing if it already exists
    CreateNew,
}

/// Options for opening mutable file storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileStorageOptions {
    pub mode: OpenMode,
}

impl FileStorageOptions {
    pub fn with_mode(mode: OpenMode) -> Self {
        FileStorageOptions { mode }
    }

    fn open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        match self.mode {
            OpenMode::ReadWrite => options.create(true),
            OpenMode::Truncate => options.create(true).truncate(true),
            OpenMode::CreateNew => options.create_new(true),
        };
        options
    }
}

/// Read-only file storage
#[derive(Debug)]
pub struct FileStorage {
    file: File,
    size: usize,
}

impl FileStorage {
    /// Open an existing file for reading. The storage size is the file length.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let size = file_len(&file)?;
        debug!(path = %path.as_ref().display(), size, "opened read-only file storage");
        Ok(FileStorage { file, size })
    }
}

impl Storage for FileStorage {
    fn size(&self) -> usize {
        self.size
    }

    fn byte(&self, index: usize) -> Result<u8> {
        let mut buf = [0u8; 1];
        check_bounds(index, 1, self.size)?;
        read_exact_at(&self.file, &mut buf, index as u64)?;
        Ok(buf[0])
    }

    fn read(&self, index: usize, length: usize) -> Result<Vec<u8>> {
        check_bounds(index, length, self.size)?;
        let mut buf = vec![0u8; length];
        read_exact_at(&self.file, &mut buf, index as u64)?;
        Ok(buf)
    }
}

/// Read/write file storage
#[derive(Debug)]
pub struct MutableFileStorage {
    inner: FileStorage,
}

impl MutableFileStorage {
    /// Open `path` for reading and writing.
    ///
    /// When `size` is given and the file is shorter, the file is extended to
    /// `size` bytes so that later in-range writes never grow it. Without a
    /// size, the storage spans the current file length.
    pub fn open<P: AsRef<Path>>(
        path: P,
        size: Option<usize>,
        options: FileStorageOptions,
    ) -> Result<Self> {
        let file = options.open_options().open(path.as_ref())?;
        let current = file_len(&file)?;

        let size = match size {
            Some(size) => {
                if size > 0 && current < size {
                    write_all_at(&file, &[0], (size - 1) as u64)?;
                }
                size
            }
            None => current,
        };

        debug!(
            path = %path.as_ref().display(),
            size,
            mode = ?options.mode,
            "opened mutable file storage"
        );
        Ok(MutableFileStorage {
            inner: FileStorage { file, size },
        })
    }
}

impl Storage for MutableFileStorage {
    fn size(&self) -> usize {
        self.inner.size()
    }

    fn byte(&self, index: usize) -> Result<u8> {
        self.inner.byte(index)
    }

    fn read(&self, index: usize, length: usize) -> Result<Vec<u8>> {
        self.inner.read(index, length)
    }
}

impl MutableStorage for MutableFileStorage {
    fn set_byte(&mut self, index: usize, value: u8) -> Result<()> {
        self.write(index, &[value])
    }

    fn write(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        check_bounds(index, bytes.len(), self.inner.size)?;
        write_all_at(&self.inner.file, bytes, index as u64)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.file.sync_data()?;
        Ok(())
    }
}

/// Allocates [`MutableFileStorage`] at a fixed path.
///
/// Defaults to [`OpenMode::CreateNew`], so an existing file is never reused by accident.
#[derive(Debug, Clone)]
pub struct FileAllocator {
    path: PathBuf,
    options: FileStorageOptions,
}

impl FileAllocator {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileAllocator {
            path: path.into(),
            options: FileStorageOptions::with_mode(OpenMode::CreateNew),
        }
    }

    pub fn with_options<P: Into<PathBuf>>(path: P, options: FileStorageOptions) -> Self {
        FileAllocator {
            path: path.into(),
            options,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageAllocator for FileAllocator {
    type Storage = MutableFileStorage;

    fn alloc(&self, size: usize) -> Result<MutableFileStorage> {
        MutableFileStorage::open(&self.path, Some(size), self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_extends_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alloc.bin");

        let storage = FileAllocator::new(&path).alloc(4096).unwrap();
        assert_eq!(storage.size(), 4096);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
        assert_eq!(storage.read(4090, 6).unwrap(), vec![0u8; 6]);
    }

    #[test]
    fn test_alloc_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.bin");
        std::fs::write(&path, b"hello").unwrap();

        let result = FileAllocator::new(&path).alloc(16);
        assert!(matches!(result, Err(FilterError::Io(_))));
    }

    #[test]
    fn test_positioned_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rw.bin");

        let mut storage =
            MutableFileStorage::open(&path, Some(32), FileStorageOptions::default()).unwrap();
        storage.write(10, &[1, 2, 3]).unwrap();
        storage.set_byte(31, 0xFF).unwrap();
        assert_eq!(storage.byte(11).unwrap(), 2);
        // Reads do not depend on the order of preceding writes
        assert_eq!(storage.read(9, 5).unwrap(), vec![0, 1, 2, 3, 0]);
        storage.flush().unwrap();
        drop(storage);

        let reader = FileStorage::open(&path).unwrap();
        assert_eq!(reader.size(), 32);
        assert_eq!(reader.byte(31).unwrap(), 0xFF);
        assert_eq!(reader.read(10, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_file_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bounds.bin");

        let mut storage =
            MutableFileStorage::open(&path, Some(8), FileStorageOptions::default()).unwrap();
        assert!(matches!(
            storage.write(6, &[1, 2, 3]),
            Err(FilterError::StorageBounds { index: 6, length: 3, size: 8 })
        ));
        assert!(storage.byte(8).is_err());
        assert!(storage.read(0, 9).is_err());

        // Out-of-range writes must not grow the file
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 8);
    }

    #[test]
    fn test_reopen_keeps_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.bin");
        std::fs::write(&path, [7u8; 12]).unwrap();

        let storage = MutableFileStorage::open(&path, None, FileStorageOptions::default()).unwrap();
        assert_eq!(storage.size(), 12);
        assert_eq!(storage.byte(5).unwrap(), 7);

        let truncated = MutableFileStorage::open(
            &path,
            Some(4),
            FileStorageOptions::with_mode(OpenMode::Truncate),
        )
        .unwrap();
        assert_eq!(truncated.read(0, 4).unwrap(), vec![0u8; 4]);
    }
}
