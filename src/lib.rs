//! dupecat - a persistent file catalog with duplicate detection
//!
//! Walks directory trees into a SQLite catalog, fingerprints files with
//! tiered BLAKE3 hashing, reports duplicate files and duplicate folders,
//! and organizes catalogued files into a folder forest.

pub mod app;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod hierarchy;
pub mod logging;
pub mod paths;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod store;

pub use app::run_app;
