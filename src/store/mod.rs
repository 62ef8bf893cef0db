//! Persistent catalog store backed by SQLite.
//!
//! # Architecture
//!
//! * [`models`]: row types ([`FileRecord`], [`Folder`], [`ScanSession`])
//!   and the timestamp sanitizing applied at the store boundary.
//! * [`sessions`], [`files`], [`folders`]: `impl Store` blocks with the
//!   narrow operations each component needs.
//!
//! Every write is a single-row statement, a chunked upsert inside a short
//! transaction, or a chunked `UPDATE ... WHERE id IN (...)`. No long-lived
//! transaction is ever held, so any operation can be interrupted and
//! re-run.

pub mod files;
pub mod folders;
pub mod models;
pub mod sessions;

use std::path::Path;

use rusqlite::{Connection, ErrorCode};

pub use files::UpsertOutcome;
pub use models::{FileRecord, Folder, ScanSession, SessionStatus};

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// Longest path, in characters, the catalog accepts.
pub const MAX_PATH_CHARS: usize = 2048;

/// SQLite-backed catalog.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a catalog file, creating its parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the schema cannot
    /// be applied.
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.configure_pragmas()?;
        store.apply_schema()?;
        log::debug!(
            "Opened catalog at {} (schema version {})",
            path.display(),
            store.schema_version()?
        );
        Ok(store)
    }

    /// Open a private in-memory catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.configure_pragmas()?;
        store.apply_schema()?;
        Ok(store)
    }

    fn configure_pragmas(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        log::trace!("SQLite pragmas configured (WAL, foreign keys, busy timeout)");
        Ok(())
    }

    fn apply_schema(&self) -> rusqlite::Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            log::warn!(
                "Catalog schema version {} is newer than this build ({})",
                version,
                SCHEMA_VERSION
            );
        }

        self.conn.execute_batch(include_str!("schema.sql"))?;
        if version < SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
            log::debug!("Catalog schema initialized (version {})", SCHEMA_VERSION);
        }
        Ok(())
    }

    /// Underlying connection, for read-only queries in other modules.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Schema version recorded in the database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be read.
    pub fn schema_version(&self) -> rusqlite::Result<i64> {
        self.conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
    }
}

/// `true` if `err` is a UNIQUE, CHECK or foreign key violation.
#[must_use]
pub fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

/// `?, ?, ?` with `n` placeholders, for `IN (...)` lists.
pub(crate) fn placeholders(n: usize) -> String {
    let mut out = String::with_capacity(n * 3);
    for i in 0..n {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}

/// Sizes are unsigned in the catalog but SQLite integers are signed.
pub(crate) fn to_db_size(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

pub(crate) fn from_db_size(size: i64) -> u64 {
    u64::try_from(size).unwrap_or(0)
}
