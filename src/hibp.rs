//! Reader for the HIBP "ordered by count" password list
//!
//! Each line is a hex-encoded SHA-1 hash, a colon and a decimal count:
//!
//! ```text
//! 7C4A8D09CA3762AF61E59520943DC26494F8941B:24230577
//! ```
//!
//! Blank lines are skipped. A malformed line yields an error and iteration
//! carries on with the next line, so callers choose whether to skip or abort.

use std::io::{self, BufRead};

/// Length of a hex-encoded SHA-1 hash
const HEX_HASH_LEN: usize = 40;

/// One password hash and how often it appeared in breaches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HibpEntry {
    pub hash: [u8; 20],
    pub count: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("invalid entry on line {line}")]
    InvalidEntry { line: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Parse a single line, without its terminator.
pub fn parse_line(line: &[u8]) -> Option<HibpEntry> {
    // 40 hex characters, a colon, and at least one digit
    if line.len() < HEX_HASH_LEN + 2 || line[HEX_HASH_LEN] != b':' {
        return None;
    }

    let mut hash = [0u8; 20];
    hex::decode_to_slice(&line[..HEX_HASH_LEN], &mut hash).ok()?;

    let digits = &line[HEX_HASH_LEN + 1..];
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let count = std::str::from_utf8(digits).ok()?.parse().ok()?;

    Some(HibpEntry { hash, count })
}

/// Lazy iterator of entries read from a `BufRead`.
///
/// Yields `Err(ReadError::InvalidEntry)` for each malformed line and ends after
/// the first I/O error.
pub struct HibpReader<R> {
    input: R,
    line: Vec<u8>,
    line_number: u64,
    failed: bool,
}

impl<R: BufRead> HibpReader<R> {
    pub fn new(input: R) -> Self {
        HibpReader {
            input,
            line: Vec::with_capacity(64),
            line_number: 0,
            failed: false,
        }
    }

    /// Number of lines consumed so far
    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}

impl<R: BufRead> Iterator for HibpReader<R> {
    type Item = Result<HibpEntry, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            self.line.clear();
            match self.input.read_until(b'\n', &mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(ReadError::Io(e)));
                }
            }
            self.line_number += 1;

            let mut line = self.line.as_slice();
            if let Some(stripped) = line.strip_suffix(b"\n") {
                line = stripped;
            }
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            if line.is_empty() {
                continue;
            }

            return Some(parse_line(line).ok_or(ReadError::InvalidEntry {
                line: self.line_number,
            }));
        }
    }
}
