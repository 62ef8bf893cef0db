//! Command-line interface definitions.
//!
//! ```bash
//! # Record a tree, fingerprint likely duplicates, build the folder forest
//! dupecat scan ~/Archive
//! dupecat hash
//! dupecat migrate
//!
//! # Confirm sampled matches with full-content hashes, then report
//! dupecat hash --verify
//! dupecat dupes --by folders --json
//!
//! # Use another catalog file
//! dupecat --database /tmp/test.db scan ./fixtures
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Catalog a directory tree in SQLite and find duplicate files and folders.
#[derive(Debug, Parser)]
#[command(name = "dupecat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Catalog database file
    #[arg(long, value_name = "FILE", global = true)]
    pub database: Option<PathBuf>,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record every file under a directory
    Scan(ScanArgs),
    /// Fingerprint files that may have duplicates
    Hash(HashArgs),
    /// Assign files to folders and link folders to their parents
    Migrate(MigrateArgs),
    /// Set duplicate flags on file records
    Mark(MarkArgs),
    /// List duplicate groups
    Dupes(DupesArgs),
    /// List recent scan sessions
    Sessions(SessionsArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Follow symbolic links
    #[arg(long)]
    pub follow_symlinks: bool,

    /// Deepest directory level (PATH is 0) whose subdirectories are entered
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Skip entries matching this pattern (substring, or glob if it has * ? [)
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Args)]
pub struct HashArgs {
    /// Minimum file size (e.g. 4KB, 1MiB)
    #[arg(long, value_parser = parse_size, value_name = "SIZE")]
    pub min_size: Option<u64>,

    /// Maximum file size (e.g. 1GB)
    #[arg(long, value_parser = parse_size, value_name = "SIZE")]
    pub max_size: Option<u64>,

    /// Hash files even when no other file has the same size
    #[arg(long)]
    pub all_sizes: bool,

    /// Afterwards, replace sampled and quick fingerprints in duplicate groups with full hashes
    #[arg(long)]
    pub verify: bool,
}

#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Only assign files to folders; do not link folder parents
    #[arg(long)]
    pub skip_hierarchy: bool,
}

#[derive(Debug, Args)]
pub struct MarkArgs {
    /// Grouping used to decide which records are duplicates
    #[arg(long, value_enum, default_value = "content")]
    pub by: MarkBy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarkBy {
    /// Same fingerprint and size
    Content,
    /// Same name in the same folder
    FolderName,
}

#[derive(Debug, Args)]
pub struct DupesArgs {
    /// What to compare
    #[arg(long, value_enum, default_value = "hash")]
    pub by: DupesBy,

    /// Ignore files (or folders) smaller than this
    #[arg(long, value_parser = parse_size, value_name = "SIZE", default_value = "0")]
    pub min_size: u64,

    /// Print groups as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SessionsArgs {
    /// Number of sessions to show, newest first
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Print sessions as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DupesBy {
    /// Same fingerprint and size
    Hash,
    /// Same name and size, content not compared
    Name,
    /// Folders with identical direct files
    Folders,
}

/// Parse a human-readable size.
///
/// Decimal suffixes (`KB`, `MB`, `GB`, `TB`, or just `K`/`M`/`G`/`T`) are
/// powers of 1000; binary suffixes (`KiB`, `MiB`, ...) are powers of 1024.
/// Case-insensitive; a bare number is bytes.
///
/// # Errors
///
/// Returns a message suitable for clap if the value cannot be parsed.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let split = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| format!("Invalid number: '{number}'"))?;

    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" => 1_000,
        "KIB" => 1 << 10,
        "M" | "MB" => 1_000_000,
        "MIB" => 1 << 20,
        "G" | "GB" => 1_000_000_000,
        "GIB" => 1 << 30,
        "T" | "TB" => 1_000_000_000_000,
        "TIB" => 1 << 40,
        other => return Err(format!("Unknown size suffix: '{other}'")),
    };

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes > u64::MAX as f64 {
        return Err(format!("Size out of range: '{s}'"));
    }
    Ok(bytes as u64)
}
