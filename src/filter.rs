//! Membership filter interfaces
//!
//! A filter answers "maybe in the set" or "definitely not in the set" with a
//! known chance of false positives and no false negatives.

use crate::Result;

/// Queryable filter
pub trait Filter {
    /// Whether `element` may have been added
    fn has(&self, element: &[u8]) -> Result<bool>;

    /// Estimated false positive rate at the current load
    fn epsilon(&self) -> f64;
}

/// Filter that accepts new elements
pub trait MutableFilter: Filter {
    fn add(&mut self, element: &[u8]) -> Result<()>;
}
