//! Scan and hash passes over one catalog.
//!
//! [`Catalog`] ties the pieces together: it streams
//! [`DirectoryScanner`](crate::scanner::DirectoryScanner) output into the
//! [`Store`], fingerprints candidates chosen by the
//! [`DuplicateDetector`](crate::duplicates::DuplicateDetector), and hands
//! out a configured [`HierarchyMigrator`].
//!
//! # Example
//!
//! ```no_run
//! use dupecat::catalog::Catalog;
//! use dupecat::config::Config;
//! use dupecat::duplicates::SizeFilter;
//! use std::path::Path;
//!
//! let catalog = Catalog::open(Config::default())?;
//! let scan = catalog.scan(Path::new("/data"))?;
//! let hashed = catalog.hash_pass(SizeFilter::default(), true)?;
//! println!("{} files, {} hashed", scan.files_stored, hashed.hashed);
//! # Ok::<(), dupecat::error::Error>(())
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::duplicates::{DuplicateDetector, SizeFilter};
use crate::error::{Error, Result};
use crate::hierarchy::HierarchyMigrator;
use crate::progress::{phase, ProgressCallback};
use crate::scanner::{
    DirectoryScanner, Fingerprint, Fingerprinter, HashError, HashTier, ScannedFile,
};
use crate::store::{SessionStatus, Store, MAX_PATH_CHARS};

/// Outcome of [`Catalog::scan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub session_id: i64,
    pub root: String,
    pub directories: u64,
    /// Records written to the store
    pub files_stored: u64,
    /// Bytes across stored records
    pub bytes_stored: u64,
    /// Entries not stored (excluded, special, too deep, path too long)
    pub skipped: u64,
    /// Entries that could not be read
    pub errors: u64,
    pub interrupted: bool,
}

/// Outcome of [`Catalog::hash_pass`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HashReport {
    pub candidates: usize,
    pub hashed: usize,
    pub full: usize,
    pub sampled: usize,
    pub quick: usize,
    /// Bytes of the files that were fingerprinted
    pub bytes: u64,
    pub errors: usize,
    pub interrupted: bool,
}

/// Outcome of [`Catalog::verify_pass`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Groups that held at least one inexact fingerprint
    pub groups_checked: usize,
    /// Records upgraded to a full-content hash
    pub files_verified: usize,
    pub errors: usize,
    pub interrupted: bool,
}

/// A catalog database plus the configuration used to fill it.
pub struct Catalog {
    store: Store,
    config: Config,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("database", &self.config.database)
            .field("has_shutdown_flag", &self.shutdown_flag.is_some())
            .field("has_progress", &self.progress.is_some())
            .finish()
    }
}

impl Catalog {
    /// Open (or create) the database named by `config.database`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: Config) -> Result<Self> {
        let store = Store::open(&config.database)?;
        Ok(Self::new(store, config))
    }

    /// Wrap an already opened store.
    #[must_use]
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store,
            config,
            shutdown_flag: None,
            progress: None,
        }
    }

    /// Stop passes early when `flag` becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Report scan, hash and migration progress to `callback`.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn fingerprinter(&self) -> Fingerprinter {
        let fingerprinter = Fingerprinter::new(self.config.hashing);
        match &self.shutdown_flag {
            Some(flag) => fingerprinter.with_shutdown_flag(Arc::clone(flag)),
            None => fingerprinter,
        }
    }

    /// Read-only queries over this catalog.
    #[must_use]
    pub fn detector(&self) -> DuplicateDetector<'_> {
        DuplicateDetector::new(&self.store)
    }

    /// A migrator sharing this catalog's settings, shutdown flag and progress.
    #[must_use]
    pub fn migrator(&self) -> HierarchyMigrator<'_> {
        let mut migrator = HierarchyMigrator::new(&self.store, self.config.migration);
        if let Some(flag) = &self.shutdown_flag {
            migrator = migrator.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(cb) = &self.progress {
            migrator = migrator.with_progress_callback(Arc::clone(cb));
        }
        migrator
    }

    /// Walk `root` and record every regular file in a new session.
    ///
    /// Records are written in chunks of `scan.insert_batch_size`. An
    /// interrupted scan keeps what was written and closes its session as
    /// `failed`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathNotFound`] or [`Error::NotADirectory`] for a bad
    /// root, or a store error. Unreadable entries are not errors.
    pub fn scan(&self, root: &Path) -> Result<ScanReport> {
        let root = resolve_root(root)?;
        let root_str = root.to_string_lossy().into_owned();
        let session_id = self.store.create_session(&root_str)?;
        log::info!("Scanning {} (session {})", root_str, session_id);

        let mut scanner = DirectoryScanner::new(&root, self.config.scan.clone());
        if let Some(flag) = &self.shutdown_flag {
            scanner = scanner.with_shutdown_flag(Arc::clone(flag));
        }
        if let Some(cb) = &self.progress {
            scanner = scanner.with_progress_callback(Arc::clone(cb));
        }

        let mut report = ScanReport {
            session_id,
            root: root_str,
            ..ScanReport::default()
        };

        let batch_size = self.config.scan.insert_batch_size.max(1);
        let mut batch: Vec<ScannedFile> = Vec::with_capacity(batch_size);
        let mut iter = scanner.scan();

        let written = loop {
            match iter.next() {
                Some(Ok(file)) => {
                    batch.push(file);
                    if batch.len() >= batch_size {
                        if let Err(e) = self.flush(session_id, &mut batch, &mut report) {
                            break Err(e);
                        }
                    }
                }
                Some(Err(e)) => {
                    log::debug!("Scan error counted: {}", e);
                    report.errors += 1;
                }
                None => break self.flush(session_id, &mut batch, &mut report),
            }
        };

        let stats = iter.stats();
        report.directories = stats.directories;
        report.skipped += stats.skipped;
        report.interrupted = iter.was_interrupted();

        if let Err(e) = written {
            log::error!("Scan of {} failed: {}", report.root, e);
            self.store.close_session(
                session_id,
                SessionStatus::Failed,
                report.files_stored,
                report.bytes_stored,
            )?;
            return Err(e.into());
        }

        let status = if report.interrupted {
            SessionStatus::Failed
        } else {
            SessionStatus::Completed
        };
        self.store
            .close_session(session_id, status, report.files_stored, report.bytes_stored)?;

        log::info!(
            "Scan {}: {} files ({} bytes) in {} directories, {} skipped, {} errors",
            if report.interrupted { "interrupted" } else { "complete" },
            report.files_stored,
            report.bytes_stored,
            report.directories,
            report.skipped,
            report.errors
        );
        Ok(report)
    }

    fn flush(
        &self,
        session_id: i64,
        batch: &mut Vec<ScannedFile>,
        report: &mut ScanReport,
    ) -> rusqlite::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let outcome = self.store.upsert_files(session_id, batch)?;
        report.files_stored += outcome.stored as u64;
        report.skipped += outcome.skipped as u64;
        report.bytes_stored += batch
            .iter()
            .filter(|f| f.path.chars().count() <= MAX_PATH_CHARS)
            .map(|f| f.size)
            .sum::<u64>();
        batch.clear();
        log::debug!("Committed {} records ({} total)", outcome.stored, report.files_stored);
        Ok(())
    }

    /// Fingerprint every unhashed record selected by `filter`.
    ///
    /// With `size_group_only`, records whose size no other record shares
    /// are left alone. Candidates are recomputed from the store on every
    /// call, largest first. A record whose size already has a verified
    /// full-content hash is hashed in full so it can match that group.
    /// Unreadable files are logged and counted.
    ///
    /// # Errors
    ///
    /// Returns a store error if a candidate query or update fails.
    pub fn hash_pass(&self, filter: SizeFilter, size_group_only: bool) -> Result<HashReport> {
        let detector = self.detector();
        let candidates = detector.files_without_hash(filter, size_group_only)?;
        let verified = detector.verified_sizes(self.config.hashing.full_max_size)?;
        let fingerprinter = self.fingerprinter();
        let mut report = HashReport {
            candidates: candidates.len(),
            ..HashReport::default()
        };

        log::info!("Hashing {} candidate files", candidates.len());
        if let Some(cb) = &self.progress {
            cb.on_phase_start(phase::HASHING, candidates.len());
        }

        for (i, record) in candidates.iter().enumerate() {
            if self.is_shutdown_requested() {
                report.interrupted = true;
                break;
            }

            let path = Path::new(&record.path);
            let fingerprint = if verified.contains(&record.size) {
                fingerprinter.full_hash(path, record.size).map(|hex| Fingerprint {
                    hex,
                    tier: HashTier::Full,
                })
            } else {
                fingerprinter.fingerprint(path, record.size)
            };
            match fingerprint {
                Ok(fp) => {
                    let quick = (fp.tier == HashTier::Quick).then_some(fp.hex.as_str());
                    self.store.set_fingerprint(record.id, &fp.hex, fp.tier, quick)?;
                    report.hashed += 1;
                    report.bytes += record.size;
                    match fp.tier {
                        HashTier::Full => report.full += 1,
                        HashTier::Sampled => report.sampled += 1,
                        HashTier::Quick => report.quick += 1,
                    }
                    log::trace!("{} {} {}", fp.tier, fp.hex, record.path);
                }
                Err(HashError::Interrupted(_)) => {
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    log::warn!("Cannot hash: {}", e);
                    report.errors += 1;
                }
            }

            if let Some(cb) = &self.progress {
                cb.on_progress(i + 1, &record.path);
            }
        }

        if let Some(cb) = &self.progress {
            cb.on_phase_end(phase::HASHING);
        }
        log::info!(
            "Hashed {} of {} files ({} full, {} sampled, {} quick), {} errors{}",
            report.hashed,
            report.candidates,
            report.full,
            report.sampled,
            report.quick,
            report.errors,
            if report.interrupted { ", interrupted" } else { "" }
        );
        Ok(report)
    }

    /// Replace inexact fingerprints in duplicate groups with full-content hashes.
    ///
    /// Sampled or quick records that share a size with an already verified
    /// record are upgraded too. The previous digest is kept in `quick_hash`. Groups that turn out to
    /// be false positives split on the next duplicate query.
    ///
    /// # Errors
    ///
    /// Returns a store error if a query or update fails.
    pub fn verify_pass(&self) -> Result<VerifyReport> {
        let detector = self.detector();
        let fingerprinter = self.fingerprinter();
        let mut report = VerifyReport::default();

        let mut pending = Vec::new();
        for group in detector.duplicates_by_hash(0)? {
            let members = detector.group_members(&group)?;
            let inexact: Vec<_> = members
                .into_iter()
                .filter(|m| !m.hash_tier.is_some_and(HashTier::is_exact))
                .collect();
            if !inexact.is_empty() {
                report.groups_checked += 1;
                pending.extend(inexact);
            }
        }
        let mut seen: HashSet<i64> = pending.iter().map(|r| r.id).collect();
        for peer in detector.unverified_size_peers(self.config.hashing.full_max_size)? {
            if seen.insert(peer.id) {
                pending.push(peer);
            }
        }

        log::info!(
            "Verifying {} files in {} groups",
            pending.len(),
            report.groups_checked
        );
        if let Some(cb) = &self.progress {
            cb.on_phase_start(phase::VERIFYING, pending.len());
        }

        for (i, record) in pending.iter().enumerate() {
            if self.is_shutdown_requested() {
                report.interrupted = true;
                break;
            }
            match fingerprinter.full_hash(Path::new(&record.path), record.size) {
                Ok(hex) => {
                    self.store.set_fingerprint(
                        record.id,
                        &hex,
                        HashTier::Full,
                        record.hash.as_deref(),
                    )?;
                    report.files_verified += 1;
                }
                Err(HashError::Interrupted(_)) => {
                    report.interrupted = true;
                    break;
                }
                Err(e) => {
                    log::warn!("Cannot verify: {}", e);
                    report.errors += 1;
                }
            }
            if let Some(cb) = &self.progress {
                cb.on_progress(i + 1, &record.path);
            }
        }

        if let Some(cb) = &self.progress {
            cb.on_phase_end(phase::VERIFYING);
        }
        log::info!(
            "Verified {} files, {} errors",
            report.files_verified,
            report.errors
        );
        Ok(report)
    }
}

/// Absolute form of `root`, which must be an existing directory.
fn resolve_root(root: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(root)?;
    let metadata = match std::fs::metadata(&absolute) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::PathNotFound(absolute))
        }
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_dir() {
        return Err(Error::NotADirectory(absolute));
    }
    Ok(absolute)
}
