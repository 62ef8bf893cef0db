//! Iterative directory traversal.
//!
//! # Overview
//!
//! [`DirectoryScanner`] walks a tree with an explicit work stack of
//! `(directory, depth)` pairs instead of recursion, so arbitrarily deep
//! trees cannot exhaust the call stack. Traversal is lazy: [`ScanIter`]
//! holds at most one open directory handle and yields one
//! [`ScannedFile`] at a time in stack-pop order.
//!
//! # Features
//!
//! - Substring and gitignore-style exclusion via the `ignore` crate
//! - Symlinks skipped unless `follow_symlinks`, with a depth bound that
//!   keeps link cycles finite
//! - Per-entry errors are yielded and counted; traversal always continues
//! - Periodic progress callbacks every N directories and M files
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dupecat::scanner::{DirectoryScanner, ScanOptions};
//! use std::path::Path;
//!
//! let mut iter = DirectoryScanner::new(Path::new("/srv/media"), ScanOptions::default()).scan();
//! let files: Vec<_> = iter.by_ref().filter_map(Result::ok).collect();
//! println!("{} files, {} skipped", files.len(), iter.stats().skipped);
//! ```

use std::fs::{self, Metadata, ReadDir};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use super::{ScanError, ScanOptions, ScannedFile};
use crate::progress::{ProgressCallback, ScanProgress};

/// Directory scanner producing flat file records.
///
/// The scanner never reads file content; fingerprints are computed by a
/// separate pass once records are persisted.
pub struct DirectoryScanner {
    /// Root path to walk
    root: PathBuf,
    /// Traversal options
    options: ScanOptions,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress receiver
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DirectoryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryScanner")
            .field("root", &self.root)
            .field("options", &self.options)
            .field("has_progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl DirectoryScanner {
    /// Create a scanner for the given root.
    ///
    /// # Arguments
    ///
    /// * `root` - Directory to scan
    /// * `options` - Traversal options
    #[must_use]
    pub fn new(root: &Path, options: ScanOptions) -> Self {
        Self {
            root: root.to_path_buf(),
            options,
            shutdown_flag: None,
            progress: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag becomes `true` the iterator ends before reading the
    /// next entry.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Receive periodic [`ScanProgress`] snapshots.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Root path being scanned.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a lazy traversal.
    ///
    /// Each item is either a regular file or a per-entry error. Errors do
    /// not end the iteration.
    #[must_use]
    pub fn scan(&self) -> ScanIter {
        ScanIter {
            excluder: Excluder::new(&self.root, &self.options.exclude_patterns),
            stack: vec![(self.root.clone(), 0)],
            current: None,
            options: self.options.clone(),
            shutdown_flag: self.shutdown_flag.clone(),
            progress: self.progress.clone(),
            stats: ScanProgress::default(),
            finished: false,
        }
    }
}

/// Exclusion predicates built once per scan.
struct Excluder {
    root: PathBuf,
    substrings: Vec<String>,
    globs: Option<Gitignore>,
}

impl Excluder {
    fn new(root: &Path, patterns: &[String]) -> Self {
        let mut substrings = Vec::new();
        let mut builder = GitignoreBuilder::new(root);
        let mut has_globs = false;

        for pattern in patterns.iter().filter(|p| !p.is_empty()) {
            if pattern.contains(['*', '?', '[']) {
                match builder.add_line(None, pattern) {
                    Ok(_) => has_globs = true,
                    Err(e) => log::warn!("Invalid exclude pattern '{}': {}", pattern, e),
                }
            } else {
                substrings.push(pattern.clone());
            }
        }

        let globs = if has_globs {
            match builder.build() {
                Ok(gi) => Some(gi),
                Err(e) => {
                    log::warn!("Failed to build exclude patterns: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Self {
            root: root.to_path_buf(),
            substrings,
            globs,
        }
    }

    fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        let full = path.to_string_lossy();
        if self.substrings.iter().any(|s| full.contains(s.as_str())) {
            return true;
        }
        let Some(gi) = &self.globs else {
            return false;
        };
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let relative = if cfg!(windows) {
            relative.to_string_lossy().replace('\\', "/")
        } else {
            relative.to_string_lossy().into_owned()
        };
        gi.matched(relative, is_dir).is_ignore()
    }
}

/// The directory whose entries are currently being read.
struct OpenDir {
    path: PathBuf,
    depth: usize,
    entries: ReadDir,
}

/// What to do with one directory entry.
enum Visit {
    File(ScannedFile),
    Skip,
    Error(ScanError),
}

/// Lazy traversal created by [`DirectoryScanner::scan`].
pub struct ScanIter {
    excluder: Excluder,
    stack: Vec<(PathBuf, usize)>,
    current: Option<OpenDir>,
    options: ScanOptions,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress: Option<Arc<dyn ProgressCallback>>,
    stats: ScanProgress,
    finished: bool,
}

impl ScanIter {
    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> &ScanProgress {
        &self.stats
    }

    /// `true` if the iteration stopped because shutdown was requested.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.is_shutdown_requested() && (self.current.is_some() || !self.stack.is_empty())
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn report(&self) {
        if let Some(cb) = &self.progress {
            cb.on_scan_progress(&self.stats);
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        log::debug!(
            "Traversal finished: {} dirs, {} files, {} skipped, {} errors",
            self.stats.directories,
            self.stats.files,
            self.stats.skipped,
            self.stats.errors
        );
        self.report();
    }

    /// Pop the next directory and open it.
    ///
    /// Returns `Some(err)` if the directory could not be listed.
    fn open_next(&mut self, dir: PathBuf, depth: usize) -> Option<ScanError> {
        match fs::read_dir(&dir) {
            Ok(entries) => {
                self.stats.directories += 1;
                self.stats.current_dir = dir.to_string_lossy().into_owned();
                let interval = self.options.progress_dir_interval;
                if interval > 0 && self.stats.directories % interval == 0 {
                    self.report();
                }
                self.current = Some(OpenDir {
                    path: dir,
                    depth,
                    entries,
                });
                None
            }
            Err(e) => {
                self.stats.errors += 1;
                Some(ScanError::from_io(dir, e))
            }
        }
    }

    fn within_depth(&self, depth: usize) -> bool {
        self.options.max_depth.map_or(true, |max| depth <= max)
    }

    fn visit(&mut self, entry: &fs::DirEntry, depth: usize) -> Visit {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(e) => {
                self.stats.errors += 1;
                return Visit::Error(ScanError::from_io(path, e));
            }
        };

        if self.excluder.is_excluded(&path, file_type.is_dir()) {
            log::trace!("Excluded: {}", path.display());
            self.stats.skipped += 1;
            return Visit::Skip;
        }

        let metadata: std::io::Result<Metadata> = if file_type.is_symlink() {
            if !self.options.follow_symlinks {
                log::trace!("Skipping symlink: {}", path.display());
                self.stats.skipped += 1;
                return Visit::Skip;
            }
            fs::metadata(&path)
        } else {
            entry.metadata()
        };
        let metadata = match metadata {
            Ok(m) => m,
            Err(e) => {
                self.stats.errors += 1;
                return Visit::Error(ScanError::from_io(path, e));
            }
        };

        if metadata.is_dir() {
            if self.within_depth(depth) {
                self.stack.push((path, depth + 1));
            } else {
                log::trace!("Depth limit reached at {}", path.display());
                self.stats.skipped += 1;
            }
            return Visit::Skip;
        }

        if !metadata.is_file() {
            log::trace!("Skipping special file: {}", path.display());
            self.stats.skipped += 1;
            return Visit::Skip;
        }

        let Some(path_str) = path.to_str() else {
            self.stats.errors += 1;
            return Visit::Error(ScanError::NonUtf8Path(path));
        };

        let mut file = ScannedFile::new(path_str, metadata.len());
        file.modified = metadata.modified().ok();
        file.accessed = metadata.accessed().ok();
        file.created = metadata.created().ok();

        self.stats.files += 1;
        self.stats.bytes += file.size;
        let interval = self.options.progress_file_interval;
        if interval > 0 && self.stats.files % interval == 0 {
            self.report();
        }
        Visit::File(file)
    }
}

impl Iterator for ScanIter {
    type Item = Result<ScannedFile, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if self.is_shutdown_requested() {
                log::info!("Scan interrupted, stopping traversal");
                self.finish();
                return None;
            }

            let Some(open) = self.current.as_mut() else {
                let Some((dir, depth)) = self.stack.pop() else {
                    self.finish();
                    return None;
                };
                if let Some(err) = self.open_next(dir, depth) {
                    log::warn!("Cannot list directory: {}", err);
                    return Some(Err(err));
                }
                continue;
            };

            let depth = open.depth;
            match open.entries.next() {
                None => self.current = None,
                Some(Err(e)) => {
                    let dir = open.path.clone();
                    self.stats.errors += 1;
                    return Some(Err(ScanError::from_io(dir, e)));
                }
                Some(Ok(entry)) => match self.visit(&entry, depth) {
                    Visit::File(file) => return Some(Ok(file)),
                    Visit::Skip => {}
                    Visit::Error(err) => {
                        log::warn!("Skipping entry: {}", err);
                        return Some(Err(err));
                    }
                },
            }
        }
    }
}
