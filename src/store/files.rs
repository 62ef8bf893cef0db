//! File record persistence.

use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::models::{epoch_seconds, from_epoch_seconds, FileRecord};
use super::{from_db_size, placeholders, to_db_size, Store, MAX_PATH_CHARS};
use crate::scanner::{HashTier, ScannedFile};

/// Column list matching [`file_from_row`].
pub(crate) const FILE_COLUMNS: &str = "id, path, name, size, hash, quick_hash, hash_tier, \
     extension, mtime, atime, ctime, scan_session_id, folder_id, is_duplicate, duplicate_group_id";

pub(crate) fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let tier: Option<String> = row.get(6)?;
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        name: row.get(2)?,
        size: from_db_size(row.get(3)?),
        hash: row.get(4)?,
        quick_hash: row.get(5)?,
        hash_tier: tier.as_deref().and_then(HashTier::parse),
        extension: row.get(7)?,
        mtime: from_epoch_seconds(row.get(8)?),
        atime: from_epoch_seconds(row.get(9)?),
        ctime: from_epoch_seconds(row.get(10)?),
        scan_session_id: row.get(11)?,
        folder_id: row.get(12)?,
        is_duplicate: row.get(13)?,
        duplicate_group_id: row.get(14)?,
    })
}

/// Result of [`Store::upsert_files`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Records inserted or refreshed
    pub stored: usize,
    /// Records rejected before reaching the database
    pub skipped: usize,
}

// A re-observed path keeps its fingerprint and duplicate marks only when
// size and mtime are unchanged. SET expressions see the old row.
const UPSERT_FILE: &str = "\
INSERT INTO files (path, name, size, extension, mtime, atime, ctime, scan_session_id)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(path) DO UPDATE SET
    hash = CASE WHEN files.size = excluded.size AND files.mtime IS excluded.mtime
                THEN files.hash ELSE NULL END,
    quick_hash = CASE WHEN files.size = excluded.size AND files.mtime IS excluded.mtime
                THEN files.quick_hash ELSE NULL END,
    hash_tier = CASE WHEN files.size = excluded.size AND files.mtime IS excluded.mtime
                THEN files.hash_tier ELSE NULL END,
    is_duplicate = CASE WHEN files.size = excluded.size AND files.mtime IS excluded.mtime
                THEN files.is_duplicate ELSE 0 END,
    duplicate_group_id = CASE WHEN files.size = excluded.size AND files.mtime IS excluded.mtime
                THEN files.duplicate_group_id ELSE NULL END,
    name = excluded.name,
    size = excluded.size,
    extension = excluded.extension,
    mtime = excluded.mtime,
    atime = excluded.atime,
    ctime = excluded.ctime,
    scan_session_id = excluded.scan_session_id";

impl Store {
    /// Insert new records and refresh known paths in one short transaction.
    ///
    /// Paths longer than [`MAX_PATH_CHARS`] are skipped with a warning.
    /// Timestamps that cannot be represented are stored as `NULL`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; nothing from `files` is
    /// stored in that case.
    pub fn upsert_files(
        &self,
        session_id: i64,
        files: &[ScannedFile],
    ) -> rusqlite::Result<UpsertOutcome> {
        let mut outcome = UpsertOutcome::default();
        let tx = self.connection().unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_FILE)?;
            for file in files {
                if file.path.chars().count() > MAX_PATH_CHARS {
                    log::warn!(
                        "Skipping path longer than {} characters: {}...",
                        MAX_PATH_CHARS,
                        file.path.chars().take(80).collect::<String>()
                    );
                    outcome.skipped += 1;
                    continue;
                }
                stmt.execute(params![
                    file.path,
                    file.name,
                    to_db_size(file.size),
                    file.extension,
                    file.modified.and_then(epoch_seconds),
                    file.accessed.and_then(epoch_seconds),
                    file.created.and_then(epoch_seconds),
                    session_id,
                ])?;
                outcome.stored += 1;
            }
        }
        tx.commit()?;
        log::trace!(
            "Upserted {} file records ({} skipped)",
            outcome.stored,
            outcome.skipped
        );
        Ok(outcome)
    }

    /// Look up a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn file(&self, id: i64) -> rusqlite::Result<Option<FileRecord>> {
        self.connection()
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
                [id],
                file_from_row,
            )
            .optional()
    }

    /// Look up a record by its exact path.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn file_by_path(&self, path: &str) -> rusqlite::Result<Option<FileRecord>> {
        self.connection()
            .query_row(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?1"),
                [path],
                file_from_row,
            )
            .optional()
    }

    /// Records without a folder, in id order, starting after `after_id`.
    ///
    /// Returns `(id, path)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn files_missing_folder(
        &self,
        after_id: i64,
        limit: usize,
    ) -> rusqlite::Result<Vec<(i64, String)>> {
        let mut stmt = self.connection().prepare_cached(
            "SELECT id, path FROM files WHERE folder_id IS NULL AND id > ?1 ORDER BY id LIMIT ?2",
        )?;
        let rows = stmt.query_map(
            params![after_id, i64::try_from(limit).unwrap_or(i64::MAX)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        rows.collect()
    }

    /// Number of records without a folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_files_missing_folder(&self) -> rusqlite::Result<u64> {
        let n: i64 = self.connection().query_row(
            "SELECT COUNT(*) FROM files WHERE folder_id IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(from_db_size(n))
    }

    /// Assign `folder_id` to every record in `ids` that has no folder yet.
    ///
    /// Runs one `UPDATE ... WHERE id IN (...)` per `chunk_size` ids and
    /// returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns an error if an update fails. Earlier chunks stay applied.
    pub fn assign_folder(
        &self,
        folder_id: i64,
        ids: &[i64],
        chunk_size: usize,
    ) -> rusqlite::Result<usize> {
        let mut changed = 0;
        for chunk in ids.chunks(chunk_size.max(1)) {
            let sql = format!(
                "UPDATE files SET folder_id = ? WHERE folder_id IS NULL AND id IN ({})",
                placeholders(chunk.len())
            );
            let values = std::iter::once(folder_id).chain(chunk.iter().copied());
            changed += self.connection().execute(&sql, params_from_iter(values))?;
        }
        Ok(changed)
    }

    /// Store a computed fingerprint.
    ///
    /// `quick_hash` is written as given; pass the previous cheap digest when
    /// replacing it with a full-content hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn set_fingerprint(
        &self,
        id: i64,
        hash: &str,
        tier: HashTier,
        quick_hash: Option<&str>,
    ) -> rusqlite::Result<bool> {
        let changed = self.connection().execute(
            "UPDATE files SET hash = ?2, hash_tier = ?3, quick_hash = ?4 WHERE id = ?1",
            params![id, hash, tier.as_str(), quick_hash],
        )?;
        Ok(changed == 1)
    }

    /// Total number of file records.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_files(&self) -> rusqlite::Result<u64> {
        let n: i64 = self
            .connection()
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
        Ok(from_db_size(n))
    }
}
