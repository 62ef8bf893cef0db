//! Error taxonomy and exit codes.
//!
//! Errors fall into four groups and are handled differently:
//!
//! - **Transient access errors** (permission denied, vanished file) are
//!   reported as [`crate::scanner::ScanError`] / [`crate::scanner::HashError`]
//!   values, logged as warnings and counted. They never abort a scan or pass.
//! - **Conflict errors** (unique violation while inserting a folder) are
//!   absorbed by [`crate::hierarchy::FolderRegistry`] and never surface.
//! - **Systemic errors** (repeated batch failures, malformed configuration)
//!   abort the current operation as [`Error::MigrationAborted`] or
//!   [`Error::Config`].
//! - **Data errors** (unusable timestamps) are sanitized to `NULL` at the
//!   store boundary and never become errors at all.

use std::path::PathBuf;

use serde::Serialize;

/// Errors returned by catalog operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The scan root does not exist.
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// The scan root is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// A path that cannot be turned into a folder (for example an empty string).
    #[error("Invalid folder path: {0:?}")]
    InvalidPath(String),

    /// A folder insert was rejected and no existing row matches its path.
    #[error("Folder {path:?} could not be created: {source}")]
    FolderRejected {
        /// Folder path as given
        path: String,
        /// Error reported by the insert
        #[source]
        source: rusqlite::Error,
    },

    /// Too many consecutive batch failures during migration.
    #[error("Migration aborted after {failures} consecutive batch failures: {last_error}")]
    MigrationAborted {
        /// Number of consecutive failed batches
        failures: usize,
        /// Message of the last failure
        last_error: String,
    },

    /// Configuration could not be loaded.
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] figment::Error),

    /// Configuration loaded but holds unusable values.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The persistent store reported an error.
    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    /// An I/O error outside per-file scanning and hashing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// `true` for errors that should stop the whole run rather than one item.
    #[must_use]
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            Self::MigrationAborted { .. } | Self::Config(_) | Self::ConfigLoad(_)
        )
    }
}

/// Process exit codes for the `dupecat` binary.
///
/// - 0: Success (completed normally)
/// - 1: General error (unexpected failure)
/// - 2: No duplicates found (query commands only)
/// - 3: Partial success (completed with some per-item errors)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed normally.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// A duplicate query completed but found nothing.
    NoDuplicates = 2,
    /// Completed, but some files or folders were skipped because of errors.
    PartialSuccess = 3,
    /// Interrupted by user.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DC000",
            Self::GeneralError => "DC001",
            Self::NoDuplicates => "DC002",
            Self::PartialSuccess => "DC003",
            Self::Interrupted => "DC130",
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DC001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
        }
    }
}
