//! # Password Filters
//!
//! Persistent Bloom filters for answering "possibly breached" / "definitely not
//! breached" about password hashes without shipping the reference corpus.
//! The same filter logic runs over an in-memory buffer or a random-access file.

pub mod bloom;
pub mod commands;
pub mod file;
pub mod filter;
pub mod hash;
pub mod hibp;
pub mod params;
pub mod set;
pub mod storage;
pub mod units;

pub use bloom::{BloomFilter, BloomStats, Header, HEADER_SIZE};
pub use file::{FileAllocator, FileStorage, FileStorageOptions, MutableFileStorage, OpenMode};
pub use filter::{Filter, MutableFilter};
pub use params::{epsilon_with, populate_options, BloomOptions, BloomParameters};
pub use set::SetFilter;
pub use storage::{BufferAllocator, BufferStorage, MutableStorage, Storage, StorageAllocator};

// Python bindings
#[cfg(feature = "python")]
pub mod python_module;

/// Common error types for the library
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("incomplete specification: complete bloom filter options cannot be inferred from the provided parameters")]
    IncompleteSpecification,

    #[error("provided parameters are inconsistent: error rate {actual} exceeds requested {requested}")]
    InconsistentParameters { requested: f64, actual: f64 },

    #[error("Storage access out of bounds: {length} bytes at index {index} (size {size})")]
    StorageBounds {
        index: usize,
        length: usize,
        size: usize,
    },

    #[error("Storage allocation error: {0}")]
    StorageAllocation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FilterError>;
