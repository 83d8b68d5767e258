//! Bloom filter parameter derivation
//!
//! Given any subset of {m, k, n, epsilon}, derives a complete, consistent set.
//! Equations for the optimal settings follow the usual analysis:
//! epsilon = (1 - e^(-kn/m))^k, k* = (m/n) ln 2, m* = -n ln(epsilon) / (ln 2)^2.

use crate::{FilterError, Result};
use std::f64::consts::LN_2;
use tracing::debug;

/// Largest supported bit width. Bit positions are drawn from a 53-bit sample.
pub const MAX_BITS: u64 = 1 << 53;

/// Upper bound (exclusive) of the binary searches over n and m
const SEARCH_LIMIT: u64 = (1 << 53) - 1;

/// Partially specified filter parameters
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BloomOptions {
    /// Bit-array width
    pub m: Option<u64>,
    /// Hash rounds per element
    pub k: Option<u32>,
    /// Capacity
    pub n: Option<u64>,
    /// Maximum false positive rate
    pub epsilon: Option<f64>,
}

impl BloomOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn m(mut self, m: u64) -> Self {
        self.m = Some(m);
        self
    }

    pub fn k(mut self, k: u32) -> Self {
        self.k = Some(k);
        self
    }

    pub fn n(mut self, n: u64) -> Self {
        self.n = Some(n);
        self
    }

    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = Some(epsilon);
        self
    }
}

/// Resolved filter parameters. `n` and `epsilon` stay unknown only when
/// nothing but `m` and `k` was given.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BloomParameters {
    pub m: u64,
    pub k: u8,
    pub n: Option<u64>,
    pub epsilon: Option<f64>,
}

impl From<BloomParameters> for BloomOptions {
    fn from(params: BloomParameters) -> Self {
        BloomOptions {
            m: Some(params.m),
            k: Some(params.k as u32),
            n: params.n,
            epsilon: params.epsilon,
        }
    }
}

/// Approximate false positive rate for `m` bits, `k` rounds and `n` elements.
///
/// An empty filter never reports a false positive; a zero-width one always does.
pub fn epsilon_with(m: u64, k: u8, n: u64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    if m == 0 {
        return 1.0;
    }
    let k = k as f64;
    (1.0 - (-k * n as f64 / m as f64).exp()).powf(k)
}

/// Same as [`epsilon_with`] for a real-valued `m`, used while m is still being solved for.
fn epsilon_with_real(m: f64, k: u8, n: u64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let k = k as f64;
    (1.0 - (-k * n as f64 / m).exp()).powf(k)
}

/// Integer k minimizing epsilon for the given m and n.
///
/// The continuous optimum is (m/n) ln 2; its floor and ceiling are compared
/// and the one with the lower epsilon wins.
pub fn k_optimal(m: f64, n: u64) -> u8 {
    if n == 0 {
        return 1;
    }
    let k_star = (m / n as f64) * LN_2;
    if !k_star.is_finite() {
        return u8::MAX;
    }
    let lower = k_star.floor().clamp(1.0, 255.0) as u8;
    let upper = k_star.ceil().clamp(1.0, 255.0) as u8;
    if epsilon_with_real(m, lower, n) < epsilon_with_real(m, upper, n) {
        lower
    } else {
        upper
    }
}

/// Largest n such that `epsilon_with(m, k, n) <= epsilon`.
pub fn n_max(m: u64, k: u8, epsilon: f64) -> u64 {
    let (mut low, mut high) = (0u64, SEARCH_LIMIT);
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if epsilon_with(m, k, mid) <= epsilon {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    low
}

/// Smallest m such that `epsilon_with(m, k, n) <= epsilon`.
pub fn m_min(k: u8, n: u64, epsilon: f64) -> Result<u64> {
    let (mut low, mut high) = (1u64, SEARCH_LIMIT);
    while low < high {
        let mid = low + (high - low) / 2;
        if epsilon_with(mid, k, n) <= epsilon {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    if low >= SEARCH_LIMIT {
        return Err(FilterError::StorageAllocation(
            "minimum m value exceeds supported maximum size".to_string(),
        ));
    }
    Ok(low)
}

/// Round a bit count up to a whole number of bytes.
fn round_to_byte(bits: u64) -> u64 {
    bits.div_ceil(8) * 8
}

pub(crate) fn validate_m(m: u64) -> Result<u64> {
    if m == 0 || m > MAX_BITS {
        return Err(FilterError::InvalidParameter(format!(
            "m value must be an integer in interval [1, 2^53], got {}",
            m
        )));
    }
    Ok(m)
}

pub(crate) fn validate_k(k: u32) -> Result<u8> {
    match u8::try_from(k) {
        Ok(k) if k >= 1 => Ok(k),
        _ => Err(FilterError::InvalidParameter(format!(
            "k value must be an integer in interval [1, 256), got {}",
            k
        ))),
    }
}

fn validate_epsilon(epsilon: f64) -> Result<f64> {
    if !(epsilon > 0.0 && epsilon < 1.0) {
        return Err(FilterError::InvalidParameter(format!(
            "epsilon must be in interval (0, 1), got {}",
            epsilon
        )));
    }
    Ok(epsilon)
}

fn check_consistent(m: u64, k: u8, n: u64, epsilon: f64) -> Result<()> {
    let actual = epsilon_with(m, k, n);
    if actual > epsilon {
        return Err(FilterError::InconsistentParameters {
            requested: epsilon,
            actual,
        });
    }
    Ok(())
}

/// Complete a partial set of options into parameters that are optimal within
/// the given constraints.
///
/// Fails with [`FilterError::IncompleteSpecification`] unless `m` plus one of
/// {k, n, epsilon}, or both `n` and `epsilon`, are given, and with
/// [`FilterError::InconsistentParameters`] when the given values cannot meet
/// the requested error rate.
pub fn populate_options(options: &BloomOptions) -> Result<BloomParameters> {
    let m = options.m.map(validate_m).transpose()?;
    let k = options.k.map(validate_k).transpose()?;
    let n = options.n;
    let epsilon = options.epsilon.map(validate_epsilon).transpose()?;

    let params = match (m, k, n, epsilon) {
        (Some(m), Some(k), Some(n), Some(epsilon)) => {
            check_consistent(m, k, n, epsilon)?;
            BloomParameters {
                m,
                k,
                n: Some(n),
                epsilon: Some(epsilon),
            }
        }
        (Some(m), Some(k), Some(n), None) => BloomParameters {
            m,
            k,
            n: Some(n),
            epsilon: Some(epsilon_with(m, k, n)),
        },
        (Some(m), Some(k), None, Some(epsilon)) => BloomParameters {
            m,
            k,
            n: Some(n_max(m, k, epsilon)),
            epsilon: Some(epsilon),
        },
        (Some(m), None, Some(n), Some(epsilon)) => {
            let k = k_optimal(m as f64, n);
            check_consistent(m, k, n, epsilon)?;
            BloomParameters {
                m,
                k,
                n: Some(n),
                epsilon: Some(epsilon),
            }
        }
        (None, Some(k), Some(n), Some(epsilon)) => BloomParameters {
            m: validate_m(round_to_byte(m_min(k, n, epsilon)?))?,
            k,
            n: Some(n),
            epsilon: Some(epsilon),
        },
        (Some(m), None, Some(n), None) => {
            let k = k_optimal(m as f64, n);
            BloomParameters {
                m,
                k,
                n: Some(n),
                epsilon: Some(epsilon_with(m, k, n)),
            }
        }
        (Some(m), None, None, Some(epsilon)) => {
            let limit = (-(m as f64 / epsilon.ln()) * LN_2 * LN_2).floor() as u64;
            let k = k_optimal(m as f64, limit);
            // The closed form ignores that k is an integer; settle on the
            // largest n that still meets the bound with this k.
            BloomParameters {
                m,
                k,
                n: Some(n_max(m, k, epsilon)),
                epsilon: Some(epsilon),
            }
        }
        (None, None, Some(n), Some(epsilon)) => {
            let m_optimal = -(n as f64 * epsilon.ln()) / (LN_2 * LN_2);
            let k = k_optimal(m_optimal, n);
            BloomParameters {
                m: validate_m(round_to_byte(m_min(k, n, epsilon)?))?,
                k,
                n: Some(n),
                epsilon: Some(epsilon),
            }
        }
        (Some(m), Some(k), None, None) => BloomParameters {
            m,
            k,
            n: None,
            epsilon: None,
        },
        _ => return Err(FilterError::IncompleteSpecification),
    };

    debug!(
        m = params.m,
        k = params.k,
        n = ?params.n,
        epsilon = ?params.epsilon,
        "resolved bloom filter parameters"
    );
    Ok(params)
}
