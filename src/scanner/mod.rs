//! Scanner module for directory traversal and content fingerprinting.
//!
//! This module provides functionality for:
//! - Iterative directory traversal with an explicit work stack
//! - Size-tiered content fingerprints with BLAKE3
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal producing [`ScannedFile`] records
//! - [`hasher`]: Full, sampled, quick and streaming fingerprints
//!
//! The scanner never computes hashes. Records are persisted first and a
//! separate hash pass fingerprints only the files that can still have a
//! duplicate.
//!
//! # Example
//!
//! ```no_run
//! use dupecat::scanner::{DirectoryScanner, ScanOptions};
//! use std::path::Path;
//!
//! let options = ScanOptions {
//!     max_depth: Some(8),
//!     exclude_patterns: vec!["node_modules".to_string(), "*.tmp".to_string()],
//!     ..Default::default()
//! };
//!
//! let scanner = DirectoryScanner::new(Path::new("/data/photos"), options);
//! for entry in scanner.scan() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path, file.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod walker;

use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

pub use hasher::{Fingerprint, Fingerprinter, HashPolicy, HashTier};
pub use walker::{DirectoryScanner, ScanIter};

/// One regular file observed during a scan.
///
/// Timestamps are kept exactly as the platform reported them; turning
/// them into storable values (or `NULL`) happens in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Absolute path, as UTF-8
    pub path: String,
    /// Final path segment
    pub name: String,
    /// Lowercased extension without the dot, if any
    pub extension: Option<String>,
    /// File size in bytes
    pub size: u64,
    /// Last modification time
    pub modified: Option<SystemTime>,
    /// Last access time
    pub accessed: Option<SystemTime>,
    /// Creation time, where the platform tracks it
    pub created: Option<SystemTime>,
}

impl ScannedFile {
    /// Create a record with only a path and size, deriving name and extension.
    ///
    /// # Example
    ///
    /// ```
    /// use dupecat::scanner::ScannedFile;
    ///
    /// let file = ScannedFile::new("/music/Track.MP3", 4096);
    /// assert_eq!(file.name, "Track.MP3");
    /// assert_eq!(file.extension.as_deref(), Some("mp3"));
    /// ```
    #[must_use]
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        let name = crate::paths::leaf_name(&path);
        let extension = extension_of(&name);
        Self {
            path,
            name,
            extension,
            size,
            modified: None,
            accessed: None,
            created: None,
        }
    }
}

/// Lowercased extension of a file name, ignoring leading-dot names like `.bashrc`.
#[must_use]
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Traversal options.
///
/// Supplied by configuration and command line; see [`crate::config::Config`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Follow symbolic links. The depth bound keeps link cycles finite.
    pub follow_symlinks: bool,

    /// Deepest directory level whose subdirectories are still entered
    /// (root is 0). `Some(0)` lists the root and its direct subdirectories.
    /// `None` means unbounded.
    pub max_depth: Option<usize>,

    /// Exclusions. Patterns containing `*`, `?` or `[` are gitignore-style
    /// globs; anything else excludes paths that contain it as a substring.
    pub exclude_patterns: Vec<String>,

    /// Report progress every this many directories.
    pub progress_dir_interval: u64,

    /// Report progress every this many files.
    pub progress_file_interval: u64,

    /// Number of records written to the store per transaction.
    pub insert_batch_size: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            max_depth: Some(64),
            exclude_patterns: Vec::new(),
            progress_dir_interval: 100,
            progress_file_interval: 1000,
            insert_batch_size: 1000,
        }
    }
}

/// Errors reported for individual entries during a scan.
///
/// None of these stop the traversal.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The entry disappeared between listing and inspection.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The path is not valid UTF-8 and cannot be stored.
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// An I/O error occurred while accessing an entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: PathBuf, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io {
                path,
                source: error,
            },
        }
    }
}

/// Errors that can occur while fingerprinting a file.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// Hashing stopped because shutdown was requested.
    #[error("Hashing interrupted: {0}")]
    Interrupted(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Classify an I/O error for `path`.
    #[must_use]
    pub fn from_io(path: PathBuf, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            std::io::ErrorKind::NotFound => Self::NotFound(path),
            _ => Self::Io {
                path,
                source: error,
            },
        }
    }
}
