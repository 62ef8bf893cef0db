//! Find-or-create operations over the folder hierarchy.
//!
//! # Concurrency
//!
//! No lock is taken. Creation is an optimistic insert: if another writer
//! inserted the same `full_path` first, the unique constraint rejects ours
//! and the registry re-queries and returns the winner's row. Callers never
//! see the conflict.
//!
//! # Ordering
//!
//! A folder is never created before its ancestors. The registry walks up
//! to the deepest existing ancestor, then inserts the missing ones top-down
//! so each row is linked to its parent at insert time.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::paths::{folder_of, leaf_name, normalize, trim_trailing_separators};
use crate::store::{is_constraint_violation, Store};

/// Default number of paths checked per existence query in bulk creation.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Folder lookup and race-safe creation.
pub struct FolderRegistry<'a> {
    store: &'a Store,
    chunk_size: usize,
    created: usize,
}

impl<'a> FolderRegistry<'a> {
    /// Create a registry over `store`.
    #[must_use]
    pub fn new(store: &'a Store) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
            created: 0,
        }
    }

    /// Set the number of paths per existence query in
    /// [`bulk_create_folders`](Self::bulk_create_folders).
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Number of folder rows this registry inserted.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created
    }

    /// Return the id of the folder at `path`, creating it and any missing
    /// ancestors first.
    ///
    /// Lookup matches the exact path first and then its canonical form, so
    /// `C:\Users\me` finds a folder first recorded as `/Users/me`. Roots
    /// such as `/` or `C:\` are created without a parent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for an empty path, or a store error.
    ///
    /// # Example
    ///
    /// ```
    /// use dupecat::hierarchy::FolderRegistry;
    /// use dupecat::store::Store;
    ///
    /// let store = Store::open_in_memory().unwrap();
    /// let mut registry = FolderRegistry::new(&store);
    ///
    /// let docs = registry.find_or_create_folder("/Users/me/Docs").unwrap();
    /// assert_eq!(registry.find_or_create_folder(r"C:\Users\me\Docs").unwrap(), docs);
    /// assert_eq!(registry.created(), 4); // "/", "/Users", "/Users/me", "/Users/me/Docs"
    /// ```
    pub fn find_or_create_folder(&mut self, path: &str) -> Result<i64> {
        self.find_or_create_folder_cached(path, &mut HashMap::new())
    }

    /// [`find_or_create_folder`](Self::find_or_create_folder) that consults
    /// and fills a caller-owned `path -> id` cache for the folder and every
    /// ancestor it touches.
    ///
    /// The cache belongs to one batch or run; entries are only valid while
    /// no folder is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for an empty path, or a store error.
    pub fn find_or_create_folder_cached(
        &mut self,
        path: &str,
        cache: &mut HashMap<String, i64>,
    ) -> Result<i64> {
        let full = trim_trailing_separators(path);
        if full.is_empty() {
            return Err(Error::InvalidPath(path.to_string()));
        }
        if let Some(&id) = cache.get(full) {
            return Ok(id);
        }

        // Walk up to the deepest folder that already exists.
        let mut missing = Vec::new();
        let mut parent_id = None;
        let mut cursor = full.to_string();
        while !cursor.is_empty() {
            if let Some(&id) = cache.get(&cursor) {
                parent_id = Some(id);
                break;
            }
            if let Some(folder) = self.store.find_folder(&cursor, &normalize(&cursor))? {
                cache.insert(cursor, folder.id);
                parent_id = Some(folder.id);
                break;
            }
            let next = folder_of(&cursor);
            missing.push(cursor);
            cursor = next;
        }

        // Create the rest top-down.
        for folder_path in missing.into_iter().rev() {
            let id = self.insert_or_fetch(parent_id, &folder_path)?;
            cache.insert(folder_path, id);
            parent_id = Some(id);
        }

        parent_id.ok_or_else(|| Error::InvalidPath(path.to_string()))
    }

    /// Insert one folder row under `parent_id`, or return the existing row
    /// if the insert lost a race.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FolderRejected`] if the insert failed on a
    /// constraint and no matching row exists, or a store error.
    pub(crate) fn insert_or_fetch(&mut self, parent_id: Option<i64>, full_path: &str) -> Result<i64> {
        let normalized = normalize(full_path);
        let name = leaf_name(full_path);

        match self
            .store
            .insert_folder(parent_id, &name, full_path, &normalized)
        {
            Ok(id) => {
                self.created += 1;
                log::trace!("Created folder {} ({})", id, full_path);
                Ok(id)
            }
            Err(e) if is_constraint_violation(&e) => {
                log::debug!("Folder {} already exists, re-querying", full_path);
                match self.store.find_folder(full_path, &normalized)? {
                    Some(folder) => Ok(folder.id),
                    None => Err(Error::FolderRejected {
                        path: full_path.to_string(),
                        source: e,
                    }),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve many folder paths, creating the missing ones.
    ///
    /// Paths are processed `chunk_size` at a time. Each chunk is checked
    /// for existing rows in one query and only the remainder goes through
    /// [`find_or_create_folder`](Self::find_or_create_folder). Empty paths
    /// are ignored. The returned map is keyed by the paths as given.
    ///
    /// # Errors
    ///
    /// Returns the first store error; folders created before it remain.
    pub fn bulk_create_folders(&mut self, paths: &[String]) -> Result<HashMap<String, i64>> {
        let mut result = HashMap::with_capacity(paths.len());
        let mut cache = HashMap::new();

        let mut seen = HashSet::with_capacity(paths.len());
        let mut pending: Vec<&String> = Vec::with_capacity(paths.len());
        for path in paths {
            if trim_trailing_separators(path).is_empty() {
                log::debug!("Ignoring empty folder path");
                continue;
            }
            if seen.insert(path.as_str()) {
                pending.push(path);
            }
        }

        for chunk in pending.chunks(self.chunk_size) {
            let lookup: Vec<String> = chunk
                .iter()
                .map(|p| trim_trailing_separators(p).to_string())
                .collect();
            let existing = self.store.folder_ids_by_path(&lookup)?;

            for (path, trimmed) in chunk.iter().zip(&lookup) {
                let id = match existing.get(trimmed) {
                    Some(&id) => id,
                    None => self.find_or_create_folder_cached(path, &mut cache)?,
                };
                result.insert((*path).clone(), id);
            }
        }

        log::debug!(
            "Resolved {} folder paths ({} created so far)",
            result.len(),
            self.created
        );
        Ok(result)
    }

    /// Recompute cached statistics for one folder.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn update_folder_stats(&self, folder_id: i64) -> Result<bool> {
        Ok(self.store.update_folder_stats(folder_id)?)
    }

    /// Recompute cached statistics for every folder.
    ///
    /// # Errors
    ///
    /// Returns a store error.
    pub fn update_all_folder_stats(&self) -> Result<usize> {
        Ok(self.store.update_all_folder_stats()?)
    }
}
