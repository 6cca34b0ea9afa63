//! Command-line interface definitions for dupescan.
//!
//! # Example
//!
//! ```bash
//! # Register roots, then scan all of them
//! dupescan path add ~/Pictures
//! dupescan path add /mnt/backup/photos
//! dupescan scan
//!
//! # Largest duplicate groups among JPEGs over 1 MB, as JSON
//! dupescan duplicates --ext jpg --min-size 1MB --output json
//!
//! # Keep the oldest copy of everything duplicated under a folder
//! dupescan remove-in-path /mnt/backup/photos --keep oldest
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::duplicates::{DuplicateFilter, KeepPolicy, SortBy};

/// Incremental duplicate file scanner.
///
/// dupescan remembers every file it has seen in a local database, so repeated
/// scans only hash files whose size or modification time changed.
#[derive(Debug, Parser)]
#[command(name = "dupescan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH", global = true, env = "DUPESCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database file, overriding the configured one
    #[arg(long, value_name = "PATH", global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage the directories that are scanned
    #[command(subcommand)]
    Path(PathCommand),
    /// Scan all registered directories
    Scan(ScanArgs),
    /// List duplicate groups
    Duplicates(DuplicatesArgs),
    /// Delete one file by record id
    Remove(RemoveArgs),
    /// Delete redundant copies under a directory
    RemoveInPath(RemoveInPathArgs),
    /// Show duplicate statistics
    Stats(StatsArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Subcommand)]
pub enum PathCommand {
    /// Register a directory for scanning
    Add {
        #[arg(value_name = "DIR")]
        path: PathBuf,
    },
    /// List registered directories
    List {
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,
    },
    /// Unregister a directory by id
    Remove {
        #[arg(value_name = "ID")]
        id: i64,
    },
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct DuplicatesArgs {
    /// Only these extensions (repeatable, e.g. --ext jpg --ext png)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Minimum file size (e.g. 1KB, 1MiB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Maximum file size
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Only files under these directories (repeatable)
    #[arg(long = "path", value_name = "DIR")]
    pub paths: Vec<PathBuf>,

    /// Group ordering
    #[arg(short, long, value_enum, default_value = "wasted")]
    pub sort: SortArg,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

impl DuplicatesArgs {
    /// Filter built from the command-line options.
    #[must_use]
    pub fn filter(&self) -> DuplicateFilter {
        DuplicateFilter {
            extensions: self.extensions.clone(),
            min_size: self.min_size,
            max_size: self.max_size,
            paths: self
                .paths
                .iter()
                .map(|p| std::path::absolute(p).unwrap_or_else(|_| p.clone()))
                .collect(),
        }
        .normalized()
    }
}

#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Record id, as shown by `dupescan duplicates`
    #[arg(value_name = "ID")]
    pub id: i64,
}

#[derive(Debug, Args)]
pub struct RemoveInPathArgs {
    #[arg(value_name = "DIR")]
    pub path: PathBuf,

    /// Which copy survives when a whole group lies under DIR
    #[arg(long, value_enum, default_value = "oldest")]
    pub keep: KeepArg,

    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON for scripting
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    /// Most wasted space first
    Wasted,
    /// Largest files first
    Size,
    /// By file name
    Name,
}

impl From<SortArg> for SortBy {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Wasted => Self::WastedSpace,
            SortArg::Size => Self::TotalSize,
            SortArg::Name => Self::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeepArg {
    Oldest,
    Newest,
}

impl From<KeepArg> for KeepPolicy {
    fn from(arg: KeepArg) -> Self {
        match arg {
            KeepArg::Oldest => Self::Oldest,
            KeepArg::Newest => Self::Newest,
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB (case-insensitive).
/// Numbers without suffix are bytes.
///
/// ```
/// use dupescan::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1.5MB").unwrap(), 1_500_000);
/// ```
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("size cannot be empty".to_string());
    }
    if s.starts_with('-') {
        return Err("size cannot be negative".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid number: '{number}'"))?;

    let multiplier: u64 = match suffix.trim().to_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1_000,
        "KIB" => 1 << 10,
        "M" | "MB" => 1_000_000,
        "MIB" => 1 << 20,
        "G" | "GB" => 1_000_000_000,
        "GIB" => 1 << 30,
        "T" | "TB" => 1_000_000_000_000,
        "TIB" => 1 << 40,
        other => return Err(format!("unknown size suffix: '{other}'")),
    };

    Ok((number * multiplier as f64) as u64)
}
