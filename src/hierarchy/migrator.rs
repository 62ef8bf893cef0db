//! Batch backfill of the folder hierarchy.
//!
//! # Overview
//!
//! Flat file records arrive from scans without a folder. [`HierarchyMigrator`]
//! assigns them in bounded batches:
//!
//! 1. Fetch up to `batch_size` records with no folder, after an id cursor
//! 2. Group them by containing folder path
//! 3. Resolve each folder once through [`FolderRegistry`], sharing a cache
//!    for the rest of the batch
//! 4. Assign the folder id with chunked `UPDATE ... WHERE id IN (...)`
//!
//! Every write is idempotent, so a run can be interrupted at any point and
//! the next run continues with whatever is still unassigned.
//!
//! [`HierarchyMigrator::establish_hierarchy`] then links every parentless
//! folder to its parent, creating missing intermediate folders, so the
//! result is a forest.
//!
//! # Failure policy
//!
//! A folder-level error is logged and counted; the batch continues. A
//! batch fails when its records cannot be fetched (retried from the same
//! cursor) or when every folder group in it fails (skipped, left for a
//! later run). More than `max_consecutive_failures` failed batches in a
//! row abort the run with [`Error::MigrationAborted`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::registry::FolderRegistry;
use crate::error::{Error, Result};
use crate::paths::{ancestor_chain, depth, folder_of, normalize};
use crate::progress::{phase, ProgressCallback};
use crate::store::{Folder, Store};

/// Batch and chunk bounds for migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Records fetched per batch.
    pub batch_size: usize,
    /// Ids per `UPDATE ... WHERE id IN (...)`.
    pub update_chunk_size: usize,
    /// Paths per existence query in bulk folder creation.
    pub folder_chunk_size: usize,
    /// Consecutive failed batches tolerated before aborting.
    pub max_consecutive_failures: usize,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            update_chunk_size: 500,
            folder_chunk_size: 500,
            max_consecutive_failures: 3,
        }
    }
}

impl MigrationSettings {
    /// Check that every bound is usable.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [
            ("migration.batch_size", self.batch_size),
            ("migration.update_chunk_size", self.update_chunk_size),
            ("migration.folder_chunk_size", self.folder_chunk_size),
        ] {
            if value == 0 {
                return Err(format!("{name} must be at least 1"));
            }
        }
        Ok(())
    }
}

/// Outcome of [`HierarchyMigrator::migrate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Batches completed
    pub batches: usize,
    /// Records that received a folder
    pub files_assigned: usize,
    /// Records with no derivable folder (bare names)
    pub files_skipped: usize,
    /// Folder groups that failed and were left for a later run
    pub folder_errors: usize,
    /// Folder rows created
    pub folders_created: usize,
    /// Folders whose statistics were recomputed
    pub folders_updated: usize,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
}

/// Outcome of [`HierarchyMigrator::establish_hierarchy`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HierarchyReport {
    /// Parentless folders examined
    pub examined: usize,
    /// Folders linked to a parent
    pub linked: usize,
    /// Intermediate folders created
    pub folders_created: usize,
    /// Folders that could not be linked
    pub errors: usize,
    /// Stopped early by a shutdown request
    pub interrupted: bool,
}

/// Shape of the folder graph, from [`HierarchyMigrator::check_forest`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForestCheck {
    /// Total folders
    pub folders: usize,
    /// Folders without a parent
    pub roots: usize,
    /// Longest parent chain, in steps
    pub max_depth: usize,
    /// Folders whose parent chain never reaches a root
    pub cyclic: Vec<i64>,
}

impl ForestCheck {
    /// `true` if every parent chain ends at a root.
    #[must_use]
    pub fn is_forest(&self) -> bool {
        self.cyclic.is_empty()
    }
}

/// One processed migration batch.
struct BatchOutcome {
    /// Highest record id fetched
    last_id: i64,
    /// Last error, set only when every folder group in the batch failed
    failure: Option<Error>,
}

/// Assigns file records to folders and completes the folder tree.
pub struct HierarchyMigrator<'a> {
    store: &'a Store,
    settings: MigrationSettings,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl<'a> HierarchyMigrator<'a> {
    /// Create a migrator over `store`.
    #[must_use]
    pub fn new(store: &'a Store, settings: MigrationSettings) -> Self {
        Self {
            store,
            settings,
            shutdown_flag: None,
            progress: None,
        }
    }

    /// Stop between batches when the flag becomes `true`.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Report progress per batch.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn registry(&self) -> FolderRegistry<'a> {
        FolderRegistry::new(self.store).with_chunk_size(self.settings.folder_chunk_size)
    }

    /// Assign every record without a folder, then recompute folder statistics.
    ///
    /// Running it again on the same catalog changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MigrationAborted`] after too many consecutive batch
    /// failures, or a store error from the initial count or the final
    /// statistics update.
    pub fn migrate(&self) -> Result<MigrationReport> {
        let mut report = MigrationReport::default();
        let mut registry = self.registry();
        let mut cursor = 0_i64;
        let mut consecutive_failures = 0_usize;

        let total = self.store.count_files_missing_folder()?;
        log::info!("Migrating {} file records without a folder", total);
        if let Some(cb) = &self.progress {
            cb.on_phase_start(phase::MIGRATING, usize::try_from(total).unwrap_or(usize::MAX));
        }

        loop {
            if self.is_shutdown_requested() {
                log::info!("Migration interrupted after {} batches", report.batches);
                report.interrupted = true;
                break;
            }

            let failure = match self.migrate_batch(&mut registry, cursor, &mut report) {
                Ok(None) => break,
                Ok(Some(outcome)) => {
                    cursor = outcome.last_id;
                    report.batches += 1;
                    if let Some(cb) = &self.progress {
                        cb.on_progress(report.files_assigned, &format!("batch {}", report.batches));
                    }
                    match outcome.failure {
                        Some(e) => e,
                        None => {
                            consecutive_failures = 0;
                            continue;
                        }
                    }
                }
                Err(e) => e,
            };

            consecutive_failures += 1;
            log::warn!(
                "Migration batch after id {} failed ({}/{}): {}",
                cursor,
                consecutive_failures,
                self.settings.max_consecutive_failures,
                failure
            );
            if consecutive_failures > self.settings.max_consecutive_failures {
                if let Some(cb) = &self.progress {
                    cb.on_phase_end(phase::MIGRATING);
                }
                return Err(Error::MigrationAborted {
                    failures: consecutive_failures,
                    last_error: failure.to_string(),
                });
            }
        }

        if let Some(cb) = &self.progress {
            cb.on_phase_end(phase::MIGRATING);
        }
        report.folders_created = registry.created();

        if !report.interrupted {
            report.folders_updated = registry.update_all_folder_stats()?;
        }

        log::info!(
            "Migration: {} files assigned, {} skipped, {} folder errors, {} folders created",
            report.files_assigned,
            report.files_skipped,
            report.folder_errors,
            report.folders_created
        );
        Ok(report)
    }

    /// Process one batch after `after_id`.
    ///
    /// Returns `None` when nothing is left. A batch whose every folder group
    /// failed is reported through [`BatchOutcome::failure`]; the cursor
    /// still moves past it and its records wait for a later run.
    fn migrate_batch(
        &self,
        registry: &mut FolderRegistry<'_>,
        after_id: i64,
        report: &mut MigrationReport,
    ) -> Result<Option<BatchOutcome>> {
        let batch = self
            .store
            .files_missing_folder(after_id, self.settings.batch_size)?;
        let Some(&(last_id, _)) = batch.last() else {
            return Ok(None);
        };

        let mut groups: BTreeMap<String, Vec<i64>> = BTreeMap::new();
        for (id, path) in batch {
            let folder = folder_of(&path);
            if folder.is_empty() {
                log::warn!("No containing folder for {:?}, leaving unassigned", path);
                report.files_skipped += 1;
                continue;
            }
            groups.entry(folder).or_default().push(id);
        }

        let group_count = groups.len();
        let mut failed = 0_usize;
        let mut last_error = None;
        let mut cache = HashMap::new();
        for (folder_path, ids) in groups {
            match self.assign_group(registry, &mut cache, &folder_path, &ids) {
                Ok(assigned) => report.files_assigned += assigned,
                Err(e) => {
                    log::warn!(
                        "Failed to assign {} files to {}: {}",
                        ids.len(),
                        folder_path,
                        e
                    );
                    report.folder_errors += 1;
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        log::debug!(
            "Migrated batch ending at id {} ({} of {} folders failed)",
            last_id,
            failed,
            group_count
        );
        let failure = if failed == group_count { last_error } else { None };
        Ok(Some(BatchOutcome { last_id, failure }))
    }

    fn assign_group(
        &self,
        registry: &mut FolderRegistry<'_>,
        cache: &mut HashMap<String, i64>,
        folder_path: &str,
        ids: &[i64],
    ) -> Result<usize> {
        let folder_id = registry.find_or_create_folder_cached(folder_path, cache)?;
        Ok(self
            .store
            .assign_folder(folder_id, ids, self.settings.update_chunk_size)?)
    }

    /// Link every parentless folder to its parent, creating any missing
    /// intermediate folders top-down.
    ///
    /// Folders whose path has no parent (`/`, `C:\`, bare names) stay roots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MigrationAborted`] after too many consecutive
    /// folder failures, or a store error if the folder list cannot be read.
    pub fn establish_hierarchy(&self) -> Result<HierarchyReport> {
        let mut report = HierarchyReport::default();
        let mut registry = self.registry();
        let mut cache: HashMap<String, i64> = HashMap::new();
        let mut consecutive_failures = 0_usize;

        let mut parentless = self.store.parentless_folders()?;
        // Shallow folders first, so deeper chains hit the cache.
        parentless.sort_by_key(|f| depth(&f.full_path));
        if let Some(cb) = &self.progress {
            cb.on_phase_start(phase::HIERARCHY, parentless.len());
        }

        for (index, folder) in parentless.iter().enumerate() {
            if self.is_shutdown_requested() {
                report.interrupted = true;
                break;
            }
            report.examined += 1;

            if folder_of(&folder.full_path).is_empty() {
                continue;
            }

            match self.link_to_parent(&mut registry, &mut cache, folder) {
                Ok(linked) => {
                    consecutive_failures = 0;
                    if linked {
                        report.linked += 1;
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    report.errors += 1;
                    log::warn!("Failed to link folder {}: {}", folder.full_path, e);
                    if consecutive_failures > self.settings.max_consecutive_failures {
                        if let Some(cb) = &self.progress {
                            cb.on_phase_end(phase::HIERARCHY);
                        }
                        return Err(Error::MigrationAborted {
                            failures: consecutive_failures,
                            last_error: e.to_string(),
                        });
                    }
                }
            }

            if let Some(cb) = &self.progress {
                cb.on_progress(index + 1, &folder.full_path);
            }
        }

        if let Some(cb) = &self.progress {
            cb.on_phase_end(phase::HIERARCHY);
        }
        report.folders_created = registry.created();
        log::info!(
            "Hierarchy: {} folders linked, {} created, {} errors",
            report.linked,
            report.folders_created,
            report.errors
        );
        Ok(report)
    }

    /// Resolve the ancestor chain of `folder` top-down and link it to its
    /// immediate parent. Parentless ancestors found on the way are linked
    /// too.
    fn link_to_parent(
        &self,
        registry: &mut FolderRegistry<'_>,
        cache: &mut HashMap<String, i64>,
        folder: &Folder,
    ) -> Result<bool> {
        let mut parent: Option<i64> = None;

        for ancestor in ancestor_chain(&folder.full_path) {
            let id = match cache.get(&ancestor) {
                Some(&id) => id,
                None => {
                    let id = match self.store.find_folder(&ancestor, &normalize(&ancestor))? {
                        Some(existing) => {
                            if let (None, Some(p)) = (existing.parent_folder_id, parent) {
                                self.store.set_folder_parent(existing.id, p)?;
                            }
                            existing.id
                        }
                        None => registry.insert_or_fetch(parent, &ancestor)?,
                    };
                    cache.insert(ancestor, id);
                    id
                }
            };
            parent = Some(id);
        }

        match parent {
            Some(p) if p != folder.id => Ok(self.store.set_folder_parent(folder.id, p)?),
            _ => Ok(false),
        }
    }

    /// Walk every parent chain and describe the folder graph.
    ///
    /// # Errors
    ///
    /// Returns a store error if the links cannot be read.
    pub fn check_forest(&self) -> Result<ForestCheck> {
        let links = self.store.parent_links()?;
        // Depth of each resolved folder; `None` marks a chain that cycles.
        let mut depths: HashMap<i64, Option<usize>> = HashMap::with_capacity(links.len());

        for &start in links.keys() {
            if depths.contains_key(&start) {
                continue;
            }
            let mut path = Vec::new();
            let mut on_path = HashSet::new();
            let mut current = start;

            let mut base = loop {
                if let Some(&known) = depths.get(&current) {
                    break known;
                }
                if !on_path.insert(current) {
                    break None;
                }
                match links.get(&current).copied().flatten() {
                    Some(parent) => {
                        path.push(current);
                        current = parent;
                    }
                    None => {
                        depths.insert(current, Some(0));
                        break Some(0);
                    }
                }
            };

            for &id in path.iter().rev() {
                base = base.map(|d| d + 1);
                depths.insert(id, base);
            }
        }

        let mut check = ForestCheck {
            folders: links.len(),
            roots: links.values().filter(|p| p.is_none()).count(),
            ..Default::default()
        };
        for (&id, depth) in &depths {
            match depth {
                Some(d) => check.max_depth = check.max_depth.max(*d),
                None => check.cyclic.push(id),
            }
        }
        check.cyclic.sort_unstable();

        if !check.is_forest() {
            log::warn!("{} folders have a cyclic parent chain", check.cyclic.len());
        }
        Ok(check)
    }
}
