//! Hash functions for Bloom filters
//!
//! Bit positions come from SHA-1 over `round || counter || element`. A 53-bit
//! sample of the digest is reduced modulo m with try-and-increment rejection
//! sampling, so positions are unbiased for any m up to 2^53.
//!
//! The layout of the digest input and the 53-bit slice are part of the stored
//! filter format: changing either breaks every existing filter file.

use sha1::{Digest, Sha1};
use tracing::trace;

/// Size of the 53-bit sample space
const SAMPLE_RANGE: u64 = 1 << 53;

/// SHA-1 of an arbitrary byte string
pub fn sha1(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

/// Uniform 53-bit sample for one `(round, counter)` attempt
fn sample(element: &[u8], round: u8, counter: u8) -> u64 {
    let mut hasher = Sha1::new();
    hasher.update([round]);
    hasher.update([counter]);
    hasher.update(element);
    let digest = hasher.finalize();

    let high = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) as u64;
    let low = u32::from_be_bytes([digest[4], digest[5], digest[6], digest[7]]) as u64;
    ((high & 0x1F_FFFF) << 32) | low
}

/// Bit position in `[0, m)` for hash round `round` of `element`.
///
/// A sample `x` is accepted when `x - (x mod m) <= 2^53 - m`, i.e. when it
/// does not fall in the incomplete last block of width m; otherwise the
/// counter is bumped and a fresh sample drawn. Each attempt is rejected with
/// probability below 1/2, so the loop ends quickly.
///
/// `m` must lie in `[1, 2^53]`.
pub fn bit_index(element: &[u8], round: u8, m: u64) -> u64 {
    debug_assert!(m >= 1 && m <= SAMPLE_RANGE);

    let mut counter: u8 = 0;
    loop {
        let x = sample(element, round, counter);
        let r = x % m;
        if x - r <= SAMPLE_RANGE - m {
            return r;
        }
        trace!(round, counter, "rejected biased hash sample");
        counter = counter.wrapping_add(1);
    }
}

/// First 32 bits of the SHA-1 digest, big-endian
pub fn digest32(element: &[u8]) -> u32 {
    let digest = Sha1::digest(element);
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_known_value() {
        // SHA-1("password"), the top entry of every breach corpus
        assert_eq!(
            hex::encode_upper(sha1(b"password")),
            "5BAA61E4C9B93F3F0682250B6CF8331B7EE68FD8"
        );
        assert_eq!(digest32(b"password"), 0x5BAA61E4);
    }

    #[test]
    fn test_sample_matches_digest_layout() {
        let mut input = vec![2u8, 0u8];
        input.extend_from_slice(b"element");
        let digest = sha1(&input);

        let high = u32::from_be_bytes(digest[0..4].try_into().unwrap()) as u64;
        let low = u32::from_be_bytes(digest[4..8].try_into().unwrap()) as u64;
        let expected = (high % (1 << 21)) * (1u64 << 32) + low;

        assert_eq!(sample(b"element", 2, 0), expected);
        assert!(expected < SAMPLE_RANGE);
    }

    #[test]
    fn test_bit_index_known_values() {
        // Stored filters depend on these exact positions
        let expected = [9197u64, 4405, 11751, 10723];
        for (round, want) in expected.into_iter().enumerate() {
            assert_eq!(bit_index(b"Item 0", round as u8, 20480), want, "round {}", round);
        }
        assert_eq!(bit_index(b"password", 0, 1_000_003), 539485);
        assert_eq!(sample(b"Item 0", 0, 0), 8538499393954797);
    }

    #[test]
    fn test_bit_index_known_values_after_rejection() {
        // With m = 2^52 + 1 only samples below m are accepted, so round 0
        // of "Item 0" is rejected twice and round 3 four times
        let m = (1u64 << 52) + 1;
        assert_eq!(bit_index(b"Item 0", 0, m), 1940497444699973);
        assert_eq!(bit_index(b"Item 0", 1, m), 3322804058640669);
        assert_eq!(bit_index(b"Item 0", 2, m), 445513375448551);
        assert_eq!(bit_index(b"Item 0", 3, m), 3738697961635382);
    }

    #[test]
    fn test_bit_index_in_range() {
        for m in [1u64, 2, 7, 8, 1000, 20480, 1 << 40, SAMPLE_RANGE] {
            for round in 0..8u8 {
                let index = bit_index(b"Item 42", round, m);
                assert!(index < m, "index {} out of range for m = {}", index, m);
            }
        }
        assert_eq!(bit_index(b"anything", 0, 1), 0);
    }

    #[test]
    fn test_bit_index_deterministic() {
        assert_eq!(bit_index(b"hello", 3, 20480), bit_index(b"hello", 3, 20480));
    }

    #[test]
    fn test_rounds_are_diverse() {
        let indices: std::collections::HashSet<_> =
            (0..16u8).map(|round| bit_index(b"hello", round, 1 << 32)).collect();
        assert!(indices.len() > 1);
    }

    #[test]
    fn test_bit_index_accepts_unbiased_sample_directly() {
        // For m = 2^k every sample is accepted, so the index is the sample reduced mod m
        let m = 1u64 << 20;
        assert_eq!(bit_index(b"x", 1, m), sample(b"x", 1, 0) % m);
    }

    #[test]
    fn test_bit_index_distribution() {
        // Rough uniformity check across a small, non-power-of-two range
        let m = 10u64;
        let mut counts = [0usize; 10];
        for i in 0..5000 {
            let element = format!("Item {}", i);
            counts[bit_index(element.as_bytes(), 0, m) as usize] += 1;
        }
        for count in counts {
            assert!((350..=650).contains(&count), "bucket count {}", count);
        }
    }
}
