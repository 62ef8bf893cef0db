use dupecat::hierarchy::{HierarchyMigrator, MigrationSettings};
use dupecat::paths::folder_of;
use dupecat::progress::ProgressCallback;
use dupecat::scanner::ScannedFile;
use dupecat::store::Store;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn store_with(paths: &[&str]) -> Store {
    let store = Store::open_in_memory().unwrap();
    let session = store.create_session("/").unwrap();
    let files: Vec<_> = paths.iter().map(|p| ScannedFile::new(*p, 100)).collect();
    store.upsert_files(session, &files).unwrap();
    store
}

fn settings(batch_size: usize) -> MigrationSettings {
    MigrationSettings {
        batch_size,
        update_chunk_size: 2,
        folder_chunk_size: 2,
        max_consecutive_failures: 3,
    }
}

fn assignments(store: &Store, paths: &[&str]) -> Vec<Option<i64>> {
    paths
        .iter()
        .map(|p| store.file_by_path(p).unwrap().unwrap().folder_id)
        .collect()
}

/// Requests shutdown once the first batch reports progress.
struct StopAfterFirstBatch(Arc<AtomicBool>);

impl ProgressCallback for StopAfterFirstBatch {
    fn on_progress(&self, _done: usize, _message: &str) {
        self.0.store(true, Ordering::SeqCst);
    }
}

const PATHS: &[&str] = &[
    "/music/a.mp3",
    "/music/b.mp3",
    "/music/live/c.mp3",
    "/photos/2020/d.jpg",
    "/photos/2020/e.jpg",
    "/photos/f.jpg",
    "/g.txt",
];

#[test]
fn test_every_record_gets_its_containing_folder() {
    let store = store_with(PATHS);
    let report = HierarchyMigrator::new(&store, settings(3)).migrate().unwrap();

    assert_eq!(report.files_assigned, PATHS.len());
    assert_eq!(report.batches, 3);
    for path in PATHS {
        let record = store.file_by_path(path).unwrap().unwrap();
        let folder = store.folder(record.folder_id.unwrap()).unwrap().unwrap();
        assert_eq!(folder.full_path, folder_of(path));
    }
}

#[test]
fn test_migration_is_idempotent() {
    let store = store_with(PATHS);
    let migrator = HierarchyMigrator::new(&store, settings(2));

    migrator.migrate().unwrap();
    let first = (assignments(&store, PATHS), store.parent_links().unwrap());

    let again = migrator.migrate().unwrap();
    let second = (assignments(&store, PATHS), store.parent_links().unwrap());

    assert_eq!(again.files_assigned, 0);
    assert_eq!(again.folders_created, 0);
    assert_eq!(first, second);
}

#[test]
fn test_interrupted_migration_resumes() {
    let store = store_with(PATHS);
    let flag = Arc::new(AtomicBool::new(false));
    let interrupted = HierarchyMigrator::new(&store, settings(2))
        .with_shutdown_flag(Arc::clone(&flag))
        .with_progress_callback(Arc::new(StopAfterFirstBatch(Arc::clone(&flag))))
        .migrate()
        .unwrap();

    assert!(interrupted.interrupted);
    assert_eq!(interrupted.batches, 1);
    assert_eq!(interrupted.folders_updated, 0);
    assert_eq!(
        store.count_files_missing_folder().unwrap(),
        (PATHS.len() - interrupted.files_assigned) as u64
    );

    let resumed = HierarchyMigrator::new(&store, settings(2)).migrate().unwrap();
    assert!(!resumed.interrupted);
    assert_eq!(
        interrupted.files_assigned + resumed.files_assigned,
        PATHS.len()
    );
    assert_eq!(store.count_files_missing_folder().unwrap(), 0);
}

#[test]
fn test_folder_stats_recomputed_after_migration() {
    let store = store_with(PATHS);
    HierarchyMigrator::new(&store, settings(100)).migrate().unwrap();

    let music = store.find_folder("/music", "/music").unwrap().unwrap();
    assert_eq!(music.file_count, 2);
    assert_eq!(music.total_size, 200);

    // Stats count direct files only.
    let root = store.find_folder("/", "/").unwrap().unwrap();
    assert_eq!(root.file_count, 1);
}

#[test]
fn test_cross_spelling_records_share_folders() {
    let paths = [r"C:\Docs\x.txt", "/Docs/y.txt"];
    let store = store_with(&paths);
    let migrator = HierarchyMigrator::new(&store, settings(10));

    let report = migrator.migrate().unwrap();

    assert_eq!(report.files_assigned, 2);
    let ids = assignments(&store, &paths);
    assert_eq!(ids[0], ids[1]);
    assert!(migrator.check_forest().unwrap().is_forest());
}

#[test]
fn test_forest_after_migration_and_hierarchy() {
    let store = store_with(PATHS);
    let migrator = HierarchyMigrator::new(&store, settings(3));
    migrator.migrate().unwrap();
    migrator.establish_hierarchy().unwrap();

    let check = migrator.check_forest().unwrap();
    assert!(check.is_forest());
    assert_eq!(check.roots, 1);
    assert_eq!(check.max_depth, 2);
    assert!(store
        .parentless_folders()
        .unwrap()
        .iter()
        .all(|f| f.full_path == "/"));
}
