//! Byte-addressable storage backing a filter
//!
//! A filter never touches memory or disk directly. It goes through [`Storage`]
//! (read-only) or [`MutableStorage`] (read/write), so the same algorithm runs
//! over a heap buffer or a file with no code change.

use crate::{FilterError, Result};

/// Read-only, fixed-size byte region.
pub trait Storage {
    /// Size of the region in bytes
    fn size(&self) -> usize;

    /// Read the byte at `index`
    fn byte(&self, index: usize) -> Result<u8>;

    /// Read `length` bytes starting at `index`
    fn read(&self, index: usize, length: usize) -> Result<Vec<u8>>;
}

/// Storage that can also be written in place.
pub trait MutableStorage: Storage {
    fn set_byte(&mut self, index: usize, value: u8) -> Result<()>;

    fn write(&mut self, index: usize, bytes: &[u8]) -> Result<()>;

    /// Push pending writes to the backing medium.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Creates zero-initialized mutable storage of a requested size.
pub trait StorageAllocator {
    type Storage: MutableStorage;

    fn alloc(&self, size: usize) -> Result<Self::Storage>;
}

/// Check that `[index, index + length)` lies inside a region of `size` bytes.
pub(crate) fn check_bounds(index: usize, length: usize, size: usize) -> Result<()> {
    match index.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(FilterError::StorageBounds {
            index,
            length,
            size,
        }),
    }
}

/// Heap-backed storage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStorage {
    buffer: Vec<u8>,
}

impl BufferStorage {
    /// Allocate a zeroed buffer of `size` bytes
    pub fn new(size: usize) -> Self {
        BufferStorage {
            buffer: vec![0; size],
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl From<Vec<u8>> for BufferStorage {
    fn from(buffer: Vec<u8>) -> Self {
        BufferStorage { buffer }
    }
}

impl From<&[u8]> for BufferStorage {
    fn from(bytes: &[u8]) -> Self {
        BufferStorage {
            buffer: bytes.to_vec(),
        }
    }
}

impl Storage for BufferStorage {
    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn byte(&self, index: usize) -> Result<u8> {
        self.buffer
            .get(index)
            .copied()
            .ok_or(FilterError::StorageBounds {
                index,
                length: 1,
                size: self.buffer.len(),
            })
    }

    fn read(&self, index: usize, length: usize) -> Result<Vec<u8>> {
        check_bounds(index, length, self.buffer.len())?;
        Ok(self.buffer[index..index + length].to_vec())
    }
}

impl MutableStorage for BufferStorage {
    fn set_byte(&mut self, index: usize, value: u8) -> Result<()> {
        let size = self.buffer.len();
        match self.buffer.get_mut(index) {
            Some(byte) => {
                *byte = value;
                Ok(())
            }
            None => Err(FilterError::StorageBounds {
                index,
                length: 1,
                size,
            }),
        }
    }

    fn write(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        check_bounds(index, bytes.len(), self.buffer.len())?;
        self.buffer[index..index + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// Allocator producing [`BufferStorage`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BufferAllocator;

impl StorageAllocator for BufferAllocator {
    type Storage = BufferStorage;

    fn alloc(&self, size: usize) -> Result<BufferStorage> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(size).map_err(|e| {
            FilterError::StorageAllocation(format!("cannot allocate {} bytes: {}", size, e))
        })?;
        buffer.resize(size, 0);
        Ok(BufferStorage { buffer })
    }
}
