//! Folder persistence.
//!
//! These are raw row operations. Path normalization, parent resolution
//! and conflict handling live in [`crate::hierarchy::FolderRegistry`].

use std::collections::HashMap;

use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::models::Folder;
use super::{from_db_size, placeholders, Store};

const FOLDER_COLUMNS: &str =
    "id, parent_folder_id, folder_name, full_path, normalized_path, file_count, total_size";

fn folder_from_row(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: row.get(0)?,
        parent_folder_id: row.get(1)?,
        folder_name: row.get(2)?,
        full_path: row.get(3)?,
        normalized_path: row.get(4)?,
        file_count: from_db_size(row.get(5)?),
        total_size: from_db_size(row.get(6)?),
    })
}

impl Store {
    /// Find a folder by exact `full_path`, falling back to `normalized_path`.
    ///
    /// When several folders share the normalized path, the oldest wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn find_folder(
        &self,
        full_path: &str,
        normalized_path: &str,
    ) -> rusqlite::Result<Option<Folder>> {
        self.connection()
            .query_row(
                &format!(
                    "SELECT {FOLDER_COLUMNS} FROM folders \
                     WHERE full_path = ?1 OR normalized_path = ?2 \
                     ORDER BY (full_path = ?1) DESC, id LIMIT 1"
                ),
                params![full_path, normalized_path],
                folder_from_row,
            )
            .optional()
    }

    /// Look up a folder by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn folder(&self, id: i64) -> rusqlite::Result<Option<Folder>> {
        self.connection()
            .query_row(
                &format!("SELECT {FOLDER_COLUMNS} FROM folders WHERE id = ?1"),
                [id],
                folder_from_row,
            )
            .optional()
    }

    /// Ids of the folders whose `full_path` is in `paths`, in one query.
    ///
    /// Callers bound the size of `paths`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn folder_ids_by_path(&self, paths: &[String]) -> rusqlite::Result<HashMap<String, i64>> {
        if paths.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT full_path, id FROM folders WHERE full_path IN ({})",
            placeholders(paths.len())
        );
        let mut stmt = self.connection().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(paths), |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    /// Insert one folder row and return its id.
    ///
    /// A `full_path` that already exists yields a constraint violation;
    /// see [`super::is_constraint_violation`].
    ///
    /// # Errors
    ///
    /// Returns the raw SQLite error, including conflicts.
    pub fn insert_folder(
        &self,
        parent_folder_id: Option<i64>,
        folder_name: &str,
        full_path: &str,
        normalized_path: &str,
    ) -> rusqlite::Result<i64> {
        self.connection().execute(
            "INSERT INTO folders (parent_folder_id, folder_name, full_path, normalized_path) \
             VALUES (?1, ?2, ?3, ?4)",
            params![parent_folder_id, folder_name, full_path, normalized_path],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    /// Link a folder to its parent. A folder is never linked to itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn set_folder_parent(&self, id: i64, parent_id: i64) -> rusqlite::Result<bool> {
        let changed = self.connection().execute(
            "UPDATE folders SET parent_folder_id = ?2 WHERE id = ?1 AND ?1 <> ?2",
            params![id, parent_id],
        )?;
        Ok(changed == 1)
    }

    /// Folders with no parent, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn parentless_folders(&self) -> rusqlite::Result<Vec<Folder>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE parent_folder_id IS NULL ORDER BY id"
        ))?;
        let rows = stmt.query_map([], folder_from_row)?;
        rows.collect()
    }

    /// Every `(id, parent_folder_id)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn parent_links(&self) -> rusqlite::Result<HashMap<i64, Option<i64>>> {
        let mut stmt = self
            .connection()
            .prepare("SELECT id, parent_folder_id FROM folders")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    /// Direct child folders, by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn child_folders(&self, parent_id: i64) -> rusqlite::Result<Vec<Folder>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {FOLDER_COLUMNS} FROM folders WHERE parent_folder_id = ?1 \
             ORDER BY folder_name, id"
        ))?;
        let rows = stmt.query_map([parent_id], folder_from_row)?;
        rows.collect()
    }

    /// Recompute cached file count and total size for one folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_folder_stats(&self, id: i64) -> rusqlite::Result<bool> {
        let changed = self.connection().execute(
            "UPDATE folders SET \
                 file_count = (SELECT COUNT(*) FROM files WHERE folder_id = ?1), \
                 total_size = (SELECT COALESCE(SUM(size), 0) FROM files WHERE folder_id = ?1) \
             WHERE id = ?1",
            [id],
        )?;
        Ok(changed == 1)
    }

    /// Recompute cached statistics for every folder in one statement.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_all_folder_stats(&self) -> rusqlite::Result<usize> {
        self.connection().execute(
            "UPDATE folders SET \
                 file_count = (SELECT COUNT(*) FROM files WHERE files.folder_id = folders.id), \
                 total_size = (SELECT COALESCE(SUM(size), 0) FROM files \
                               WHERE files.folder_id = folders.id)",
            [],
        )
    }

    /// Total number of folders.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_folders(&self) -> rusqlite::Result<u64> {
        let n: i64 = self
            .connection()
            .query_row("SELECT COUNT(*) FROM folders", [], |row| row.get(0))?;
        Ok(from_db_size(n))
    }
}
