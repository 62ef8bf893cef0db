//! Duplicate group result types.
//!
//! # Overview
//!
//! Groups are query results computed from the catalog, never stored state.
//! Each one carries its reclaimable space so consumers can rank groups
//! without recomputing it.
//!
//! # Example
//!
//! ```
//! use dupecat::duplicates::{wasted_space, DuplicateGroup};
//!
//! let group = DuplicateGroup::new("ab".repeat(32), 100, 3);
//! assert_eq!(group.wasted_space, 200);
//! assert_eq!(wasted_space(1, 100), 0);
//! ```

use serde::Serialize;

/// Bytes reclaimable by keeping one member of `count` identical items of
/// `size` bytes each.
///
/// Saturates instead of overflowing.
#[must_use]
pub fn wasted_space(count: u64, size: u64) -> u64 {
    count.saturating_sub(1).saturating_mul(size)
}

/// Files sharing a content fingerprint and size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Shared fingerprint
    pub hash: String,
    /// Size of each member in bytes
    pub size: u64,
    /// Number of members
    pub count: u64,
    /// `(count - 1) * size`
    pub wasted_space: u64,
}

impl DuplicateGroup {
    /// Create a group and compute its wasted space.
    #[must_use]
    pub fn new(hash: String, size: u64, count: u64) -> Self {
        Self {
            hash,
            size,
            count,
            wasted_space: wasted_space(count, size),
        }
    }
}

/// Files sharing a name and size, regardless of content.
///
/// A cheap "likely copy" signal available before hashing finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameSizeGroup {
    /// Shared file name
    pub name: String,
    /// Size of each member in bytes
    pub size: u64,
    /// Number of members
    pub count: u64,
    /// `(count - 1) * size`, assuming the members really are copies
    pub wasted_space: u64,
}

impl NameSizeGroup {
    /// Create a group and compute its wasted space.
    #[must_use]
    pub fn new(name: String, size: u64, count: u64) -> Self {
        Self {
            name,
            size,
            count,
            wasted_space: wasted_space(count, size),
        }
    }
}

/// One member folder of a [`FolderDuplicateGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderRef {
    /// Folder row id
    pub id: i64,
    /// Path as first observed
    pub full_path: String,
}

/// Folders whose direct file children are identical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderDuplicateGroup {
    /// Direct files in each member folder
    pub file_count: u64,
    /// Combined size of those files
    pub total_size: u64,
    /// Hex digest of the name-sorted `(name, size, hash)` children
    pub signature: String,
    /// Member folders, by id
    pub folders: Vec<FolderRef>,
    /// `(members - 1) * total_size`
    pub wasted_space: u64,
}

impl FolderDuplicateGroup {
    /// Number of member folders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    /// `true` if the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Catalog-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    /// File records
    pub files: u64,
    /// Bytes across all records
    pub total_size: u64,
    /// Records with a fingerprint
    pub hashed_files: u64,
    /// Folder rows
    pub folders: u64,
    /// Records not yet assigned to a folder
    pub files_without_folder: u64,
    /// `(hash, size)` groups with more than one member
    pub duplicate_groups: u64,
    /// Records in those groups
    pub duplicate_files: u64,
    /// Sum of the groups' wasted space
    pub reclaimable_bytes: u64,
}
