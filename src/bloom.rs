//! Persistent Bloom filter
//!
//! Stored layout, big-endian:
//!
//! ```text
//! offset 0:  n        (8 bytes)
//! offset 8:  m        (8 bytes)
//! offset 16: k        (1 byte)
//! offset 17: reserved (3 bytes, zero)
//! offset 20: bit array, ceil(m/8) bytes, bit b at byte 20 + b/8, bit b%8 (LSB first)
//! ```

use crate::filter::{Filter, MutableFilter};
use crate::hash::bit_index;
use crate::params::{epsilon_with, populate_options, validate_k, validate_m, BloomOptions};
use crate::storage::{MutableStorage, Storage, StorageAllocator};
use crate::{FilterError, Result};
use tracing::debug;

/// Size of the metadata header in bytes
pub const HEADER_SIZE: usize = 20;

/// Bytes scanned per read when counting set bits
const SCAN_CHUNK: usize = 64 * 1024;

/// Filter metadata stored at the start of the storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub n: u64,
    pub m: u64,
    pub k: u8,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..8].copy_from_slice(&self.n.to_be_bytes());
        bytes[8..16].copy_from_slice(&self.m.to_be_bytes());
        bytes[16] = self.k;
        bytes
    }

    /// Decode a header. Reserved bytes are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FilterError::StorageBounds {
                index: 0,
                length: HEADER_SIZE,
                size: bytes.len(),
            });
        }
        let mut n = [0u8; 8];
        let mut m = [0u8; 8];
        n.copy_from_slice(&bytes[0..8]);
        m.copy_from_slice(&bytes[8..16]);
        Ok(Header {
            n: u64::from_be_bytes(n),
            m: u64::from_be_bytes(m),
            k: bytes[16],
        })
    }
}

/// Total storage size for a filter of `m` bits
pub fn storage_size(m: u64) -> Result<usize> {
    usize::try_from(m.div_ceil(8))
        .ok()
        .and_then(|bytes| bytes.checked_add(HEADER_SIZE))
        .ok_or_else(|| {
            FilterError::StorageAllocation(format!(
                "a filter of {} bits exceeds the addressable space",
                m
            ))
        })
}

/// Map a bit index to its storage byte and in-byte mask
fn storage_index(bit: u64) -> (usize, u8) {
    ((bit / 8) as usize + HEADER_SIZE, 1 << (bit % 8))
}

/// A Bloom filter over some storage.
///
/// Reading requires only [`Storage`]; `create` and `add` require
/// [`MutableStorage`]. `m` and `k` are fixed for the lifetime of the filter.
#[derive(Debug)]
pub struct BloomFilter<S> {
    storage: S,
    n: u64,
    m: u64,
    k: u8,
}

impl<S: Storage> BloomFilter<S> {
    /// Reconstruct a filter from storage that already holds a header.
    pub fn open(storage: S) -> Result<Self> {
        let header = Header::decode(&storage.read(0, HEADER_SIZE)?)?;
        let m = validate_m(header.m)?;
        let k = validate_k(header.k as u32)?;

        let required = storage_size(m)?;
        if storage.size() < required {
            return Err(FilterError::InvalidParameter(format!(
                "storage holds {} bytes but a filter of {} bits needs {}",
                storage.size(),
                m,
                required
            )));
        }

        debug!(n = header.n, m, k, "opened bloom filter");
        Ok(BloomFilter {
            storage,
            n: header.n,
            m,
            k,
        })
    }

    /// Number of elements added
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Bit-array width
    pub fn m(&self) -> u64 {
        self.m
    }

    /// Hash rounds per element
    pub fn k(&self) -> u8 {
        self.k
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Check if an element might be in the filter.
    ///
    /// Stops at the first unset bit.
    pub fn has(&self, element: &[u8]) -> Result<bool> {
        for round in 0..self.k {
            if !self.bit(bit_index(element, round, self.m))? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Approximate false positive rate at the current n
    pub fn epsilon(&self) -> f64 {
        epsilon_with(self.m, self.k, self.n)
    }

    /// Whether bit `index` is set
    pub fn bit(&self, index: u64) -> Result<bool> {
        let (byte, mask) = storage_index(index);
        Ok(self.storage.byte(byte)? & mask != 0)
    }

    /// Re-read `n` from storage, for storage that may have been changed by another handle
    pub fn reload_n(&mut self) -> Result<u64> {
        let bytes = self.storage.read(0, 8)?;
        let mut n = [0u8; 8];
        n.copy_from_slice(&bytes);
        self.n = u64::from_be_bytes(n);
        Ok(self.n)
    }

    /// Fraction of bits set, by scanning the whole bit array
    pub fn load_factor(&self) -> Result<f64> {
        let total = self.m.div_ceil(8) as usize;
        let full_bytes = (self.m / 8) as usize;
        let mut set_bits = 0u64;
        let mut offset = 0;

        while offset < total {
            let len = SCAN_CHUNK.min(total - offset);
            let chunk = self.storage.read(HEADER_SIZE + offset, len)?;
            for (i, byte) in chunk.iter().enumerate() {
                let byte = if offset + i < full_bytes {
                    *byte
                } else {
                    // Trailing partial byte: ignore bits at or above m
                    *byte & ((1u8 << (self.m % 8)) - 1)
                };
                set_bits += byte.count_ones() as u64;
            }
            offset += len;
        }

        Ok(set_bits as f64 / self.m as f64)
    }

    /// Get statistics about the filter
    pub fn stats(&self) -> Result<BloomStats> {
        Ok(BloomStats {
            bits: self.m,
            num_hash_functions: self.k,
            elements_inserted: self.n,
            storage_bytes: self.storage.size(),
            load_factor: self.load_factor()?,
            epsilon: self.epsilon(),
        })
    }
}

impl<S: MutableStorage> BloomFilter<S> {
    /// Create a fresh filter.
    ///
    /// The options are completed with [`populate_options`], storage of
    /// `20 + ceil(m/8)` bytes is allocated and the header is written with n = 0.
    pub fn create<A>(options: &BloomOptions, allocator: &A) -> Result<Self>
    where
        A: StorageAllocator<Storage = S>,
    {
        let params = populate_options(options)?;
        let size = storage_size(params.m)?;
        let mut storage = allocator.alloc(size)?;

        let header = Header {
            n: 0,
            m: params.m,
            k: params.k,
        };
        storage.write(0, &header.encode())?;

        debug!(m = params.m, k = params.k, size, "created bloom filter");
        Ok(BloomFilter {
            storage,
            n: 0,
            m: params.m,
            k: params.k,
        })
    }

    /// Add an element. The new n is persisted before returning.
    ///
    /// `n` only changes once it has been written to storage.
    pub fn add(&mut self, element: &[u8]) -> Result<()> {
        let n = self.n.checked_add(1).ok_or_else(|| {
            FilterError::InvalidParameter(format!(
                "element count {} cannot be incremented",
                self.n
            ))
        })?;
        for round in 0..self.k {
            self.set_bit(bit_index(element, round, self.m))?;
        }
        self.write_n(n)?;
        self.n = n;
        Ok(())
    }

    /// Flush the underlying storage
    pub fn flush(&mut self) -> Result<()> {
        self.storage.flush()
    }

    fn set_bit(&mut self, index: u64) -> Result<()> {
        let (byte, mask) = storage_index(index);
        let current = self.storage.byte(byte)?;
        if current & mask == 0 {
            self.storage.set_byte(byte, current | mask)?;
        }
        Ok(())
    }

    fn write_n(&mut self, n: u64) -> Result<()> {
        self.storage.write(0, &n.to_be_bytes())
    }
}

impl<S: Storage> Filter for BloomFilter<S> {
    fn has(&self, element: &[u8]) -> Result<bool> {
        BloomFilter::has(self, element)
    }

    fn epsilon(&self) -> f64 {
        BloomFilter::epsilon(self)
    }
}

impl<S: MutableStorage> MutableFilter for BloomFilter<S> {
    fn add(&mut self, element: &[u8]) -> Result<()> {
        BloomFilter::add(self, element)
    }
}

/// Statistics about a Bloom filter
#[derive(Debug, Clone)]
pub struct BloomStats {
    pub bits: u64,
    pub num_hash_functions: u8,
    pub elements_inserted: u64,
    pub storage_bytes: usize,
    pub load_factor: f64,
    pub epsilon: f64,
}

impl std::fmt::Display for BloomStats {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "BloomFilter Stats:\n\
             - Size: {} bits ({} bytes stored)\n\
             - Hash functions: {}\n\
             - Elements inserted: {}\n\
             - Load factor: {:.3}\n\
             - Estimated FPR: {:.6}",
            self.bits,
            self.storage_bytes,
            self.num_hash_functions,
            self.elements_inserted,
            self.load_factor,
            self.epsilon
        )
    }
}
