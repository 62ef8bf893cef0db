//! Scan session bookkeeping.

use rusqlite::{params, OptionalExtension, Row};

use super::models::{ScanSession, SessionStatus};
use super::{from_db_size, to_db_size, Store};

const SESSION_COLUMNS: &str =
    "id, scan_path, total_files, total_size, start_time, end_time, status";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<ScanSession> {
    let status: String = row.get(6)?;
    Ok(ScanSession {
        id: row.get(0)?,
        scan_path: row.get(1)?,
        total_files: from_db_size(row.get(2)?),
        total_size: from_db_size(row.get(3)?),
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        status: SessionStatus::parse(&status).unwrap_or(SessionStatus::Failed),
    })
}

impl Store {
    /// Open a `running` session for `scan_path` and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn create_session(&self, scan_path: &str) -> rusqlite::Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO scan_sessions (scan_path, start_time, status) VALUES (?1, ?2, 'running')",
            params![scan_path, now],
        )?;
        let id = self.connection().last_insert_rowid();
        log::debug!("Created scan session {} for {}", id, scan_path);
        Ok(id)
    }

    /// Close a running session with its final totals.
    ///
    /// Closed sessions are immutable: returns `false` without changing
    /// anything if the session is unknown, already closed, or `status`
    /// is [`SessionStatus::Running`].
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn close_session(
        &self,
        id: i64,
        status: SessionStatus,
        total_files: u64,
        total_size: u64,
    ) -> rusqlite::Result<bool> {
        if status == SessionStatus::Running {
            return Ok(false);
        }
        let now = chrono::Utc::now().to_rfc3339();
        let changed = self.connection().execute(
            "UPDATE scan_sessions \
             SET status = ?2, end_time = ?3, total_files = ?4, total_size = ?5 \
             WHERE id = ?1 AND status = 'running'",
            params![
                id,
                status.as_str(),
                now,
                to_db_size(total_files),
                to_db_size(total_size)
            ],
        )?;
        Ok(changed == 1)
    }

    /// Look up a session by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn session(&self, id: i64) -> rusqlite::Result<Option<ScanSession>> {
        self.connection()
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM scan_sessions WHERE id = ?1"),
                [id],
                session_from_row,
            )
            .optional()
    }

    /// Most recent sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_sessions(&self, limit: usize) -> rusqlite::Result<Vec<ScanSession>> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM scan_sessions ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map([i64::try_from(limit).unwrap_or(i64::MAX)], session_from_row)?;
        rows.collect()
    }
}
