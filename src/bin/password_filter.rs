//! Command line front end: build, query, show and tune password filters.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use password_filters::commands::{self, BuildConfig, BuildTarget};
use password_filters::units::{parse_bits, parse_count};
use password_filters::BloomOptions;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Build and query Bloom filters of breached password hashes
#[derive(Parser, Debug)]
#[command(name = "password-filter", version)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a filter from a list of password hashes
    Build {
        /// Source file in HIBP ordered-by-count text format
        #[arg(short = 'i', long = "in")]
        input: PathBuf,

        /// Output file to store the built filter
        #[arg(short = 'o', long = "out")]
        output: PathBuf,

        #[command(flatten)]
        params: ParamArgs,

        /// Skip malformed lines instead of aborting
        #[arg(long)]
        skip_invalid: bool,

        /// Build directly in the output file instead of in memory
        #[arg(long)]
        direct: bool,
    },

    /// Query a constructed filter for a password
    Query {
        /// File storing the bloom filter to query
        #[arg(short = 'f', long = "file")]
        file: PathBuf,

        /// Password string to query in the filter
        password: String,
    },

    /// Show the metadata for a given filter file
    Show {
        /// File storing the bloom filter
        file: PathBuf,
    },

    /// Tune parameters for building a filter
    ///
    /// Examples:
    ///   tune -n 100k -e 0.01      storage needed for 100k passwords at 1% error
    ///   tune -n 1M -m 5MiB        error rate of 1M passwords in 5 MiB
    ///   tune -m '100 KiB' -e 0.01 passwords a 100 KiB filter holds at 1% error
    #[command(verbatim_doc_comment)]
    Tune {
        #[command(flatten)]
        params: ParamArgs,
    },
}

#[derive(Args, Debug)]
struct ParamArgs {
    /// Number of passwords to be stored in the filter (e.g. 100k)
    #[arg(short = 'n', long = "capacity", value_parser = parse_count)]
    capacity: Option<u64>,

    /// Number of bits to use for the filter (e.g. 5MiB)
    #[arg(short = 'm', long = "size", value_parser = parse_bits)]
    size: Option<u64>,

    /// Number of hash functions to use
    #[arg(short = 'k', long = "hashes")]
    hashes: Option<u32>,

    /// Maximum allowable false positive rate, in (0, 1)
    #[arg(short = 'e', long = "epsilon")]
    epsilon: Option<f64>,
}

impl From<ParamArgs> for BloomOptions {
    fn from(args: ParamArgs) -> Self {
        BloomOptions {
            m: args.size,
            k: args.hashes,
            n: args.capacity,
            epsilon: args.epsilon,
        }
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Command::Build {
            input,
            output,
            params,
            skip_invalid,
            direct,
        } => {
            let file = File::open(&input)
                .with_context(|| format!("cannot open input file {}", input.display()))?;
            let config = BuildConfig {
                options: params.into(),
                target: if direct {
                    BuildTarget::Direct
                } else {
                    BuildTarget::Memory
                },
                skip_invalid,
            };
            let report = commands::build(BufReader::new(file), &output, &config)
                .with_context(|| format!("failed to build {}", output.display()))?;
            println!("{}", report);
        }
        Command::Query { file, password } => {
            let found = commands::query(&file, &password)
                .with_context(|| format!("failed to query {}", file.display()))?;
            println!("{}", found);
        }
        Command::Show { file } => {
            let summary = commands::show(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            println!("{}", summary);
        }
        Command::Tune { params } => {
            println!("{}", commands::tune(&params.into())?);
        }
    }

    Ok(())
}
