//! Progress reporting for scans, hash passes and migrations.
//!
//! The core never prints. It reports through [`ProgressCallback`], and the
//! binary plugs in [`Progress`], which renders `indicatif` spinners and bars.
//! Callbacks run on the calling thread and must return quickly; the
//! scanner only invokes them every N directories and every M files.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Phase names passed to [`ProgressCallback::on_phase_start`].
pub mod phase {
    /// Directory traversal
    pub const SCANNING: &str = "scanning";
    /// Fingerprinting files without a hash
    pub const HASHING: &str = "hashing";
    /// Full-content re-hash of cheap-tier collisions
    pub const VERIFYING: &str = "verifying";
    /// Assigning files to folders
    pub const MIGRATING: &str = "migrating";
    /// Linking folders to their parents
    pub const HIERARCHY: &str = "hierarchy";
}

/// Snapshot of traversal counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanProgress {
    /// Directories listed so far
    pub directories: u64,
    /// Regular files emitted so far
    pub files: u64,
    /// Total size of emitted files
    pub bytes: u64,
    /// Entries skipped by exclusion, symlink or depth rules
    pub skipped: u64,
    /// Entries that could not be read
    pub errors: u64,
    /// Directory currently being listed
    pub current_dir: String,
}

/// Receives progress updates from the catalog engine.
///
/// Every method has a no-op default so implementors only override what
/// they display.
pub trait ProgressCallback: Send + Sync {
    /// Called periodically during traversal.
    ///
    /// # Arguments
    ///
    /// * `progress` - Counters so far and the directory being listed
    fn on_scan_progress(&self, _progress: &ScanProgress) {}

    /// Called when a counted phase starts.
    ///
    /// # Arguments
    ///
    /// * `phase` - One of the names in [`phase`]
    /// * `total` - Number of items the phase will process
    fn on_phase_start(&self, _phase: &str, _total: usize) {}

    /// Called for each processed item.
    ///
    /// # Arguments
    ///
    /// * `current` - Items processed so far (1-based)
    /// * `item` - Path or label of the current item
    fn on_progress(&self, _current: usize, _item: &str) {}

    /// Called when a phase completes, including when it was interrupted.
    fn on_phase_end(&self, _phase: &str) {}
}

/// Terminal progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    scanning: Mutex<Option<ProgressBar>>,
    active: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is drawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use dupecat::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            scanning: Mutex::new(None),
            active: Mutex::new(None),
            quiet,
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {prefix} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn phase_label(phase: &str) -> &str {
        match phase {
            phase::HASHING => "Hashing",
            phase::VERIFYING => "Verifying",
            phase::MIGRATING => "Migrating",
            phase::HIERARCHY => "Linking folders",
            other => other,
        }
    }
}

impl ProgressCallback for Progress {
    fn on_scan_progress(&self, progress: &ScanProgress) {
        if self.quiet {
            return;
        }
        let Ok(mut slot) = self.scanning.lock() else {
            return;
        };
        let pb = slot.get_or_insert_with(|| {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(Self::spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        pb.set_prefix(format!(
            "{} dirs, {} files, {}",
            progress.directories,
            progress.files,
            bytesize::ByteSize::b(progress.bytes)
        ));
        pb.set_message(truncate_path(&progress.current_dir, 40));
    }

    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }
        let pb = self.multi.add(ProgressBar::new(total as u64));
        pb.set_style(Self::bar_style());
        pb.set_message(Self::phase_label(phase).to_string());
        if let Ok(mut active) = self.active.lock() {
            *active = Some(pb);
        }
    }

    fn on_progress(&self, current: usize, item: &str) {
        if self.quiet {
            return;
        }
        if let Ok(active) = self.active.lock() {
            if let Some(ref pb) = *active {
                pb.set_position(current as u64);
                pb.set_message(truncate_path(item, 30));
            }
        }
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if phase == phase::SCANNING {
            if let Some(pb) = self.scanning.lock().ok().and_then(|mut s| s.take()) {
                pb.finish_with_message("Scan complete");
            }
            return;
        }
        if let Some(pb) = self.active.lock().ok().and_then(|mut a| a.take()) {
            pb.finish_with_message(format!("{} complete", Self::phase_label(phase)));
        }
    }
}

/// Truncate a path for display, keeping the final segment.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let leaf = crate::paths::leaf_name(path);
    let leaf_len = leaf.chars().count();
    if leaf_len + 4 > max_len {
        let keep = max_len.saturating_sub(3);
        let tail: String = leaf.chars().skip(leaf_len.saturating_sub(keep)).collect();
        return format!("...{tail}");
    }

    format!(".../{leaf}")
}
