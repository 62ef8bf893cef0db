//! Row types and boundary conversions.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scanner::HashTier;

/// Lifecycle state of a [`ScanSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Traversal in progress
    Running,
    /// Traversal finished normally
    Completed,
    /// Traversal was interrupted or aborted
    Failed,
}

impl SessionStatus {
    /// Name stored in the catalog.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One traversal run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSession {
    /// Row id
    pub id: i64,
    /// Root directory as given to the scan
    pub scan_path: String,
    /// Records written by the scan
    pub total_files: u64,
    /// Bytes covered by those records
    pub total_size: u64,
    /// RFC 3339
    pub start_time: String,
    /// RFC 3339, set when the session is closed
    pub end_time: Option<String>,
    /// Lifecycle state
    pub status: SessionStatus,
}

/// One physical file observed during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Row id
    pub id: i64,
    /// Absolute path as scanned, at most 2048 characters
    pub path: String,
    /// Final path component
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Content fingerprint, 64 hex characters
    pub hash: Option<String>,
    /// Cheap-tier digest kept after a full verification
    pub quick_hash: Option<String>,
    /// Tier that produced `hash`
    pub hash_tier: Option<HashTier>,
    /// Lowercase extension without the dot
    pub extension: Option<String>,
    /// Last modification
    pub mtime: Option<DateTime<Utc>>,
    /// Last access
    pub atime: Option<DateTime<Utc>>,
    /// Creation, where the platform reports it
    pub ctime: Option<DateTime<Utc>>,
    /// Session that last wrote the record
    pub scan_session_id: Option<i64>,
    /// Containing folder, `None` until migrated
    pub folder_id: Option<i64>,
    /// Set by duplicate marking on every non-canonical member
    pub is_duplicate: bool,
    /// Canonical member this record duplicates
    pub duplicate_group_id: Option<i64>,
}

/// One directory node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    /// Row id
    pub id: i64,
    /// `None` marks a root of the forest
    pub parent_folder_id: Option<i64>,
    /// Last path segment, `Root` for a root
    pub folder_name: String,
    /// Path as first observed
    pub full_path: String,
    /// Canonical form of `full_path`
    pub normalized_path: String,
    /// Cached, recomputed on request
    pub file_count: u64,
    /// Cached, recomputed on request
    pub total_size: u64,
}

impl Folder {
    /// `true` if the folder has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_folder_id.is_none()
    }
}

/// Convert a platform timestamp into storable Unix seconds.
///
/// Times that cannot be represented (beyond `i64` seconds, or outside the
/// range `chrono` can express) become `None` and are stored as `NULL`
/// rather than failing the record.
#[must_use]
pub fn epoch_seconds(time: SystemTime) -> Option<i64> {
    let secs = match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).ok()?,
        Err(e) => i64::try_from(e.duration().as_secs()).ok()?.checked_neg()?,
    };
    DateTime::from_timestamp(secs, 0).map(|_| secs)
}

/// Convert stored Unix seconds back into a UTC timestamp.
#[must_use]
pub fn from_epoch_seconds(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}
