//! Duplicate detection and marking.
//!
//! This module provides:
//! - Read-only duplicate queries over the catalog ([`detector`])
//! - Result types with wasted-space accounting ([`groups`])
//! - Duplicate flag marking passes ([`marker`])

pub mod detector;
pub mod groups;
pub mod marker;

pub use detector::{DuplicateDetector, SizeFilter};
pub use groups::{
    wasted_space, CatalogSummary, DuplicateGroup, FolderDuplicateGroup, FolderRef, NameSizeGroup,
};
pub use marker::DuplicateMarker;
