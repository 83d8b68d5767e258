//! Build, query, show and tune operations behind the command line tool
//!
//! Kept in the library so the binary stays a thin argument-parsing layer and
//! the operations can be tested directly.

use crate::bloom::BloomFilter;
use crate::file::{FileAllocator, FileStorage};
use crate::hash::sha1;
use crate::hibp::{HibpReader, ReadError};
use crate::params::{populate_options, BloomOptions, BloomParameters};
use crate::storage::{BufferAllocator, MutableStorage};
use crate::units::{format_bits, format_count};
use crate::FilterError;
use std::fs::OpenOptions;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("error reading input file: {0}")]
    Read(#[from] ReadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a filter is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildTarget {
    /// Build in memory and write the finished filter out in one go
    #[default]
    Memory,
    /// Build directly in the output file
    Direct,
}

/// Settings for [`build`]
#[derive(Debug, Clone, Default)]
pub struct BuildConfig {
    pub options: BloomOptions,
    pub target: BuildTarget,
    /// Skip malformed input lines instead of aborting
    pub skip_invalid: bool,
}

/// Outcome of [`build`]
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub params: BloomParameters,
    pub inserted: u64,
    pub epsilon: f64,
    /// Input remained after the filter reached its capacity
    pub stopped_early: bool,
    /// Malformed lines skipped
    pub skipped: u64,
}

impl std::fmt::Display for BuildReport {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Built a bloom filter with {} entries and an error rate of {}",
            self.inserted, self.epsilon
        )
    }
}

/// Stream entries from `input` into `filter` until the input ends or `capacity` is reached.
fn fill<S, R>(
    filter: &mut BloomFilter<S>,
    input: R,
    capacity: Option<u64>,
    skip_invalid: bool,
) -> Result<(bool, u64), CommandError>
where
    S: MutableStorage,
    R: BufRead,
{
    let mut skipped = 0;
    for result in HibpReader::new(input) {
        if capacity.is_some_and(|n| filter.n() >= n) {
            return Ok((true, skipped));
        }
        match result {
            Ok(entry) => filter.add(&entry.hash)?,
            Err(ReadError::InvalidEntry { line }) if skip_invalid => {
                warn!(line, "skipping malformed entry");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok((false, skipped))
}

/// Write `bytes` to a file at `path` that must not exist yet
fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_data()
}

/// Build a filter at `output` from an HIBP list read from `input`.
///
/// Missing parameters are derived with [`populate_options`]. When a capacity
/// is known, insertion stops once the filter holds that many entries.
/// An existing file at `output` is never overwritten, and a failed direct
/// build removes what it wrote.
pub fn build<R: BufRead>(
    input: R,
    output: &Path,
    config: &BuildConfig,
) -> Result<BuildReport, CommandError> {
    let params = populate_options(&config.options)?;
    let options = BloomOptions::from(params);

    let (inserted, epsilon, stopped_early, skipped) = match config.target {
        BuildTarget::Memory => {
            let mut filter = BloomFilter::create(&options, &BufferAllocator)?;
            let (stopped_early, skipped) =
                fill(&mut filter, input, params.n, config.skip_invalid)?;
            write_new(output, filter.storage().as_bytes())?;
            (filter.n(), filter.epsilon(), stopped_early, skipped)
        }
        BuildTarget::Direct => {
            let mut filter = BloomFilter::create(&options, &FileAllocator::new(output))?;
            let filled = fill(&mut filter, input, params.n, config.skip_invalid)
                .and_then(|outcome| {
                    filter.flush()?;
                    Ok(outcome)
                });
            match filled {
                Ok((stopped_early, skipped)) => {
                    (filter.n(), filter.epsilon(), stopped_early, skipped)
                }
                Err(e) => {
                    // The output only ever holds a complete filter
                    drop(filter);
                    if let Err(remove) = std::fs::remove_file(output) {
                        warn!(
                            path = %output.display(),
                            error = %remove,
                            "cannot remove partial filter"
                        );
                    }
                    return Err(e);
                }
            }
        }
    };

    if stopped_early {
        if let Some(n) = params.n {
            warn!(capacity = n, "reached max capacity, skipping remaining entries");
        }
    }
    info!(inserted, epsilon, path = %output.display(), "built bloom filter");

    Ok(BuildReport {
        params,
        inserted,
        epsilon,
        stopped_early,
        skipped,
    })
}

/// Check whether `password` is in the filter stored at `path`.
///
/// Filters are built from SHA-1 password hashes, so the password is hashed
/// once before the lookup.
pub fn query(path: &Path, password: &str) -> Result<bool, CommandError> {
    let filter = BloomFilter::open(FileStorage::open(path)?)?;
    Ok(filter.has(&sha1(password.as_bytes()))?)
}

/// Describe the filter stored at `path`.
pub fn show(path: &Path) -> Result<String, CommandError> {
    let filter = BloomFilter::open(FileStorage::open(path)?)?;
    let stats = filter.stats()?;

    Ok(format!(
        "Storage size: {}\n\
         Capacity:     {}\n\
         Hashes:       {}\n\
         Load factor:  {:.3}\n\
         Error rate:   {}",
        format_bits(stats.bits, 2),
        format_count(stats.elements_inserted, 2),
        stats.num_hash_functions,
        stats.load_factor,
        stats.epsilon
    ))
}

/// Resolve partial parameters and describe the result.
pub fn tune(options: &BloomOptions) -> Result<String, CommandError> {
    let params = populate_options(options)?;
    let describe = |value: Option<String>| value.unwrap_or_else(|| "unknown".to_string());

    Ok(format!(
        "Storage size: {}\n\
         Capacity:     {}\n\
         Hashes:       {}\n\
         Error rate:   {}",
        format_bits(params.m, 2),
        describe(params.n.map(|n| format_count(n, 2))),
        params.k,
        describe(params.epsilon.map(|e| e.to_string()))
    ))
}
