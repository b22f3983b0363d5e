//! CLI argument parsing for Minar

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for correlation reports
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "minar")]
#[command(version)]
#[command(about = "Key-value trace miner with category-aware correlation", long_about = None)]
pub struct Cli {
    /// Enable verbose internal tracing on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Progress report interval in trace lines (0 disables)
    #[arg(long, global = true, value_name = "LINES", default_value_t = 100_000)]
    pub progress: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pairwise Pearson correlation of per-category presence vectors
    Pearson {
        /// Trace file to scan
        #[arg(long, value_name = "PATH")]
        trace: PathBuf,

        /// Report output path
        #[arg(short = 'o', long, value_name = "PATH")]
        output: PathBuf,

        /// Block IDs opening each batch (comma separated)
        #[arg(long = "batch-start", value_name = "IDS", value_delimiter = ',')]
        batch_start: Vec<u64>,

        /// Block IDs closing each batch (comma separated, aligned with starts)
        #[arg(long = "batch-end", value_name = "IDS", value_delimiter = ',')]
        batch_end: Vec<u64>,

        /// Partition every N blocks instead of once per batch (0 = per batch)
        #[arg(long = "group-blocks", value_name = "N", default_value_t = 0)]
        group_blocks: u64,

        /// Accumulate squared coefficients instead of raw ones
        #[arg(long)]
        squared: bool,

        /// Track the keys listed in this file instead of schema categories
        #[arg(long = "keys-file", value_name = "PATH")]
        keys_file: Option<PathBuf>,

        /// Report format (text or json)
        #[arg(long = "format", value_enum, default_value = "text")]
        format: ReportFormat,
    },

    /// Co-occurrence frequency of key pairs at fixed distances
    Pairs {
        /// Trace file(s) to scan
        #[arg(long, value_name = "PATH", required = true, num_args = 1..)]
        trace: Vec<PathBuf>,

        /// Directory for per-batch report files
        #[arg(long = "output-dir", value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Pairing distances (comma separated; 0 pairs adjacent events)
        #[arg(long, value_name = "DISTS", value_delimiter = ',', required = true)]
        distance: Vec<usize>,

        /// Block IDs opening each batch (comma separated)
        #[arg(long = "batch-start", value_name = "IDS", value_delimiter = ',')]
        batch_start: Vec<u64>,

        /// Block IDs closing each batch (comma separated, aligned with starts)
        #[arg(long = "batch-end", value_name = "IDS", value_delimiter = ',')]
        batch_end: Vec<u64>,

        /// Keep only pairs seen at least this often per batch
        #[arg(long = "min-freq", value_name = "N", default_value_t = 2)]
        min_freq: u64,
    },

    /// Per-category op-type counts over fixed-size block windows
    Distribution {
        /// Trace file to scan
        #[arg(long, value_name = "PATH")]
        trace: PathBuf,

        /// Directory for per-window report files
        #[arg(long = "output-dir", value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// First block ID of the range
        #[arg(long, value_name = "ID")]
        start: u64,

        /// End of the range (exclusive)
        #[arg(long, value_name = "ID")]
        end: u64,

        /// Window size in blocks
        #[arg(long, value_name = "BLOCKS")]
        step: u64,
    },

    /// Whole-trace per-category op-type counts
    Count {
        /// Trace file to scan
        #[arg(long, value_name = "PATH")]
        trace: PathBuf,

        /// Report output path
        #[arg(short = 'o', long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Merge frequency reports into one sorted report
    Merge {
        /// Input report files
        #[arg(long, value_name = "PATH", required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Merged output path
        #[arg(short = 'o', long, value_name = "PATH")]
        output: PathBuf,
    },
}
