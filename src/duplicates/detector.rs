//! Read-only duplicate queries over the catalog.
//!
//! # Overview
//!
//! [`DuplicateDetector`] never writes. It answers four questions:
//!
//! 1. Which files still need a fingerprint, and which of those can
//!    possibly have a duplicate ([`DuplicateDetector::files_without_hash`])
//! 2. Which files share a fingerprint and size
//!    ([`DuplicateDetector::duplicates_by_hash`])
//! 3. Which files share a name and size
//!    ([`DuplicateDetector::duplicates_by_name_and_size`])
//! 4. Which folders hold identical direct children
//!    ([`DuplicateDetector::duplicate_folders`])
//!
//! Every query is computed from current rows on each call; nothing is
//! cached between passes.

use std::collections::{HashMap, HashSet};

use rusqlite::params;

use super::groups::{
    wasted_space, CatalogSummary, DuplicateGroup, FolderDuplicateGroup, FolderRef, NameSizeGroup,
};
use crate::store::files::{file_from_row, FILE_COLUMNS};
use crate::store::{from_db_size, placeholders, to_db_size, FileRecord, Store};

/// Inclusive size bounds for candidate selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeFilter {
    /// Smallest size to include
    pub min_size: Option<u64>,
    /// Largest size to include
    pub max_size: Option<u64>,
}

impl SizeFilter {
    /// `true` if `size` is within the bounds.
    #[must_use]
    pub fn contains(&self, size: u64) -> bool {
        self.min_size.map_or(true, |min| size >= min) && self.max_size.map_or(true, |max| size <= max)
    }
}

/// Read-only duplicate queries.
#[derive(Clone, Copy)]
pub struct DuplicateDetector<'a> {
    store: &'a Store,
}

impl<'a> DuplicateDetector<'a> {
    /// Create a detector over `store`.
    #[must_use]
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Files lacking a fingerprint, largest first.
    ///
    /// With `size_group_only`, a file is returned only if at least one
    /// other catalogued file has the same size. A file with a unique size
    /// cannot have a duplicate, so hashing it is wasted work. The size
    /// groups are recomputed on every call because new same-size files may
    /// have arrived since the last pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn files_without_hash(
        &self,
        filter: SizeFilter,
        size_group_only: bool,
    ) -> rusqlite::Result<Vec<FileRecord>> {
        let group_clause = if size_group_only {
            "AND size IN (SELECT size FROM files GROUP BY size HAVING COUNT(*) > 1)"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files \
             WHERE hash IS NULL \
               AND (?1 IS NULL OR size >= ?1) \
               AND (?2 IS NULL OR size <= ?2) \
               {group_clause} \
             ORDER BY size DESC, id"
        );
        let mut stmt = self.store.connection().prepare(&sql)?;
        let rows = stmt.query_map(
            params![filter.min_size.map(to_db_size), filter.max_size.map(to_db_size)],
            file_from_row,
        )?;
        rows.collect()
    }

    /// Sizes above `full_max_size` that already carry a full-content hash.
    ///
    /// Files of these sizes were upgraded by a verify pass. Any other file
    /// of the same size has to be hashed in full as well, or its cheap
    /// digest would never match the upgraded ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn verified_sizes(&self, full_max_size: u64) -> rusqlite::Result<HashSet<u64>> {
        let mut stmt = self.store.connection().prepare(
            "SELECT DISTINCT size FROM files WHERE hash_tier = 'full' AND size > ?1",
        )?;
        let rows = stmt.query_map([to_db_size(full_max_size)], |row| {
            Ok(from_db_size(row.get(0)?))
        })?;
        rows.collect()
    }

    /// Files with a sampled or quick hash whose size has a verified member.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn unverified_size_peers(&self, full_max_size: u64) -> rusqlite::Result<Vec<FileRecord>> {
        let mut stmt = self.store.connection().prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files \
             WHERE hash IS NOT NULL AND hash_tier <> 'full' \
               AND size IN (SELECT size FROM files WHERE hash_tier = 'full' AND size > ?1) \
             ORDER BY size DESC, id"
        ))?;
        let rows = stmt.query_map([to_db_size(full_max_size)], file_from_row)?;
        rows.collect()
    }

    /// Groups of two or more files sharing `(hash, size)`, largest size first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn duplicates_by_hash(&self, min_size: u64) -> rusqlite::Result<Vec<DuplicateGroup>> {
        let mut stmt = self.store.connection().prepare(
            "SELECT hash, size, COUNT(*) FROM files \
             WHERE hash IS NOT NULL AND size >= ?1 \
             GROUP BY hash, size HAVING COUNT(*) > 1 \
             ORDER BY size DESC, hash",
        )?;
        let rows = stmt.query_map([to_db_size(min_size)], |row| {
            Ok(DuplicateGroup::new(
                row.get(0)?,
                from_db_size(row.get(1)?),
                from_db_size(row.get(2)?),
            ))
        })?;
        rows.collect()
    }

    /// Groups of two or more files sharing `(name, size)`, ignoring content.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn duplicates_by_name_and_size(
        &self,
        min_size: u64,
    ) -> rusqlite::Result<Vec<NameSizeGroup>> {
        let mut stmt = self.store.connection().prepare(
            "SELECT name, size, COUNT(*) FROM files \
             WHERE size >= ?1 \
             GROUP BY name, size HAVING COUNT(*) > 1 \
             ORDER BY size DESC, name",
        )?;
        let rows = stmt.query_map([to_db_size(min_size)], |row| {
            Ok(NameSizeGroup::new(
                row.get(0)?,
                from_db_size(row.get(1)?),
                from_db_size(row.get(2)?),
            ))
        })?;
        rows.collect()
    }

    /// Member records of a hash group, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn group_members(&self, group: &DuplicateGroup) -> rusqlite::Result<Vec<FileRecord>> {
        let mut stmt = self.store.connection().prepare(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE hash = ?1 AND size = ?2 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![group.hash, to_db_size(group.size)], file_from_row)?;
        rows.collect()
    }

    /// Folders with identical direct file children.
    ///
    /// Each folder's signature digests its children's `(name, size, hash)`
    /// triples sorted by name, so listing order never matters. Folders are
    /// grouped by `(file_count, total_size, signature)`. Folders with no
    /// direct files, or with any unhashed child, are left out because their
    /// signature would not reflect their content. Groups are ordered by
    /// wasted space, largest first.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn duplicate_folders(&self, min_size: u64) -> rusqlite::Result<Vec<FolderDuplicateGroup>> {
        let signatures = self.folder_signatures()?;

        let mut buckets: HashMap<(u64, u64, String), Vec<i64>> = HashMap::new();
        for (folder_id, sig) in signatures {
            if sig.total_size < min_size {
                continue;
            }
            buckets
                .entry((sig.file_count, sig.total_size, sig.digest))
                .or_default()
                .push(folder_id);
        }
        buckets.retain(|_, members| members.len() > 1);

        let member_ids: Vec<i64> = buckets.values().flatten().copied().collect();
        let paths = self.folder_paths(&member_ids)?;

        let mut groups: Vec<FolderDuplicateGroup> = buckets
            .into_iter()
            .map(|((file_count, total_size, signature), mut ids)| {
                ids.sort_unstable();
                let folders = ids
                    .into_iter()
                    .map(|id| FolderRef {
                        id,
                        full_path: paths.get(&id).cloned().unwrap_or_default(),
                    })
                    .collect::<Vec<_>>();
                FolderDuplicateGroup {
                    file_count,
                    total_size,
                    wasted_space: wasted_space(folders.len() as u64, total_size),
                    signature,
                    folders,
                }
            })
            .collect();

        groups.sort_by(|a, b| {
            b.wasted_space
                .cmp(&a.wasted_space)
                .then_with(|| a.signature.cmp(&b.signature))
        });
        log::debug!("Found {} duplicate folder groups", groups.len());
        Ok(groups)
    }

    /// Signatures of every folder with at least one file and no unhashed files.
    fn folder_signatures(&self) -> rusqlite::Result<HashMap<i64, FolderSignature>> {
        let mut stmt = self.store.connection().prepare(
            "SELECT folder_id, name, size, hash FROM files \
             WHERE folder_id IS NOT NULL \
             ORDER BY folder_id, name, id",
        )?;
        let mut rows = stmt.query([])?;

        let mut done = HashMap::new();
        let mut current: Option<(i64, FolderSignatureBuilder)> = None;

        while let Some(row) = rows.next()? {
            let folder_id: i64 = row.get(0)?;
            let name: String = row.get(1)?;
            let size = from_db_size(row.get(2)?);
            let hash: Option<String> = row.get(3)?;

            if current.as_ref().map(|(id, _)| *id) != Some(folder_id) {
                if let Some((id, builder)) = current.take() {
                    if let Some(sig) = builder.finish() {
                        done.insert(id, sig);
                    }
                }
                current = Some((folder_id, FolderSignatureBuilder::new()));
            }
            if let Some((_, builder)) = current.as_mut() {
                builder.push(&name, size, hash.as_deref());
            }
        }
        if let Some((id, builder)) = current {
            if let Some(sig) = builder.finish() {
                done.insert(id, sig);
            }
        }
        Ok(done)
    }

    fn folder_paths(&self, ids: &[i64]) -> rusqlite::Result<HashMap<i64, String>> {
        let mut paths = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(500) {
            let sql = format!(
                "SELECT id, full_path FROM folders WHERE id IN ({})",
                placeholders(chunk.len())
            );
            let mut stmt = self.store.connection().prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(chunk), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            for row in rows {
                let (id, path) = row?;
                paths.insert(id, path);
            }
        }
        Ok(paths)
    }

    /// Catalog-wide totals.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn summary(&self) -> rusqlite::Result<CatalogSummary> {
        let conn = self.store.connection();
        let (files, total_size, hashed_files, without_folder): (i64, i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size), 0), COUNT(hash), \
                        COALESCE(SUM(folder_id IS NULL), 0) \
                 FROM files",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        let (groups, duplicate_files, reclaimable): (i64, i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(n), 0), COALESCE(SUM((n - 1) * size), 0) FROM ( \
                 SELECT size, COUNT(*) AS n FROM files WHERE hash IS NOT NULL \
                 GROUP BY hash, size HAVING COUNT(*) > 1)",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(CatalogSummary {
            files: from_db_size(files),
            total_size: from_db_size(total_size),
            hashed_files: from_db_size(hashed_files),
            folders: self.store.count_folders()?,
            files_without_folder: from_db_size(without_folder),
            duplicate_groups: from_db_size(groups),
            duplicate_files: from_db_size(duplicate_files),
            reclaimable_bytes: from_db_size(reclaimable),
        })
    }
}

struct FolderSignature {
    file_count: u64,
    total_size: u64,
    digest: String,
}

/// Incremental folder signature over name-sorted children.
struct FolderSignatureBuilder {
    hasher: blake3::Hasher,
    file_count: u64,
    total_size: u64,
    complete: bool,
}

impl FolderSignatureBuilder {
    fn new() -> Self {
        Self {
            hasher: blake3::Hasher::new(),
            file_count: 0,
            total_size: 0,
            complete: true,
        }
    }

    fn push(&mut self, name: &str, size: u64, hash: Option<&str>) {
        let Some(hash) = hash else {
            self.complete = false;
            return;
        };
        // NUL cannot occur in file names, so the encoding is unambiguous.
        self.hasher.update(name.as_bytes());
        self.hasher.update(&[0]);
        self.hasher.update(&size.to_le_bytes());
        self.hasher.update(hash.as_bytes());
        self.hasher.update(&[0]);
        self.file_count += 1;
        self.total_size = self.total_size.saturating_add(size);
    }

    fn finish(self) -> Option<FolderSignature> {
        if !self.complete || self.file_count == 0 {
            return None;
        }
        Some(FolderSignature {
            file_count: self.file_count,
            total_size: self.total_size,
            digest: self.hasher.finalize().to_hex().to_string(),
        })
    }
}
