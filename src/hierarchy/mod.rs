//! Normalized folder hierarchy.
//!
//! - [`registry`]: find-or-create and bulk creation of folder rows
//! - [`migrator`]: batch assignment of file records to folders, parent
//!   linking, and forest checks

pub mod migrator;
pub mod registry;

pub use migrator::{
    ForestCheck, HierarchyMigrator, HierarchyReport, MigrationReport, MigrationSettings,
};
pub use registry::FolderRegistry;
