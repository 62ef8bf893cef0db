//! Duplicate flag marking.
//!
//! Both passes reset every flag, then mark every member of a group except
//! the one with the smallest id, pointing `duplicate_group_id` at that
//! canonical member. The smallest-id rule makes re-runs idempotent.
//!
//! Two groupings are available and they answer different questions:
//!
//! - [`DuplicateMarker::mark_content_duplicates`] groups by
//!   `(hash, size)`. This is the authoritative definition of a duplicate.
//! - [`DuplicateMarker::mark_duplicates`] groups by `(folder, name)`. Within
//!   one scan root this never matches, because paths are unique; it only
//!   fires when the same folder was catalogued under several spellings
//!   (for example `C:\Docs` and `/Docs`), which share one folder row.
//!   Same name in the same folder says nothing about content, so treat it
//!   as a weaker heuristic.

use crate::store::Store;

const RESET_FLAGS: &str = "UPDATE files SET is_duplicate = 0, duplicate_group_id = NULL \
     WHERE is_duplicate <> 0 OR duplicate_group_id IS NOT NULL";

const MARK_BY_FOLDER_NAME: &str = "\
WITH canon AS (
    SELECT folder_id, name, MIN(id) AS keep_id FROM files
    WHERE folder_id IS NOT NULL
    GROUP BY folder_id, name HAVING COUNT(*) > 1
)
UPDATE files SET
    is_duplicate = 1,
    duplicate_group_id = (SELECT keep_id FROM canon
                          WHERE canon.folder_id = files.folder_id AND canon.name = files.name)
WHERE folder_id IS NOT NULL
  AND id NOT IN (SELECT keep_id FROM canon)
  AND EXISTS (SELECT 1 FROM canon
              WHERE canon.folder_id = files.folder_id AND canon.name = files.name)";

const MARK_BY_CONTENT: &str = "\
WITH canon AS (
    SELECT hash, size, MIN(id) AS keep_id FROM files
    WHERE hash IS NOT NULL
    GROUP BY hash, size HAVING COUNT(*) > 1
)
UPDATE files SET
    is_duplicate = 1,
    duplicate_group_id = (SELECT keep_id FROM canon
                          WHERE canon.hash = files.hash AND canon.size = files.size)
WHERE hash IS NOT NULL
  AND id NOT IN (SELECT keep_id FROM canon)
  AND EXISTS (SELECT 1 FROM canon
              WHERE canon.hash = files.hash AND canon.size = files.size)";

/// Writes duplicate flags. Separate from [`super::DuplicateDetector`], which is read-only.
pub struct DuplicateMarker<'a> {
    store: &'a Store,
}

impl<'a> DuplicateMarker<'a> {
    /// Create a marker over `store`.
    #[must_use]
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Mark same-name files within the same folder.
    ///
    /// Returns the number of records flagged.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; flags are unchanged then.
    pub fn mark_duplicates(&self) -> rusqlite::Result<usize> {
        let marked = self.run(MARK_BY_FOLDER_NAME)?;
        log::info!("Marked {} same-name duplicates", marked);
        Ok(marked)
    }

    /// Mark files sharing a content fingerprint and size.
    ///
    /// Returns the number of records flagged.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; flags are unchanged then.
    pub fn mark_content_duplicates(&self) -> rusqlite::Result<usize> {
        let marked = self.run(MARK_BY_CONTENT)?;
        log::info!("Marked {} content duplicates", marked);
        Ok(marked)
    }

    fn run(&self, mark_sql: &str) -> rusqlite::Result<usize> {
        let tx = self.store.connection().unchecked_transaction()?;
        let reset = tx.execute(RESET_FLAGS, [])?;
        let marked = tx.execute(mark_sql, [])?;
        tx.commit()?;
        log::debug!("Reset {} duplicate flags before marking", reset);
        Ok(marked)
    }
}
