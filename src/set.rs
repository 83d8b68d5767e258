//! Exact in-memory filter
//!
//! Stores one 32-bit SHA-1 prefix per element. Collisions are treated as
//! negligible, so the reported error rate is zero. Useful as ground truth when
//! checking the Bloom filter's contract.

use crate::filter::{Filter, MutableFilter};
use crate::hash::digest32;
use crate::Result;
use fnv::FnvHashSet;

/// Simple filter directly implemented as a set in memory
#[derive(Debug, Clone, Default)]
pub struct SetFilter {
    set: FnvHashSet<u32>,
}

impl SetFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, element: &[u8]) {
        self.set.insert(digest32(element));
    }

    pub fn has(&self, element: &[u8]) -> bool {
        self.set.contains(&digest32(element))
    }

    pub fn epsilon(&self) -> f64 {
        0.0
    }

    /// Number of distinct digests stored
    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl Filter for SetFilter {
    fn has(&self, element: &[u8]) -> Result<bool> {
        Ok(SetFilter::has(self, element))
    }

    fn epsilon(&self) -> f64 {
        SetFilter::epsilon(self)
    }
}

impl MutableFilter for SetFilter {
    fn add(&mut self, element: &[u8]) -> Result<()> {
        SetFilter::add(self, element);
        Ok(())
    }
}
