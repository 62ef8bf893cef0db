use dupecat::catalog::Catalog;
use dupecat::config::Config;
use dupecat::duplicates::SizeFilter;
use dupecat::error::Error;
use dupecat::hierarchy::{HierarchyMigrator, MigrationSettings};
use dupecat::scanner::{ScanError, ScannedFile};
use dupecat::store::Store;
use std::fs;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

fn store_with(paths: &[&str]) -> Store {
    let store = Store::open_in_memory().unwrap();
    let session = store.create_session("/").unwrap();
    let files: Vec<_> = paths.iter().map(|p| ScannedFile::new(*p, 1)).collect();
    store.upsert_files(session, &files).unwrap();
    store
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_does_not_abort_scan() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("visible.txt"), "ok").unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("hidden.txt"), "secret").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    if fs::read_dir(&locked).is_ok() {
        // Running with privileges that bypass permission bits.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let scanned: Vec<_> = dupecat::scanner::DirectoryScanner::new(dir.path(), Default::default())
        .scan()
        .collect();
    let catalog = Catalog::new(Store::open_in_memory().unwrap(), Config::default());
    let report = catalog.scan(dir.path()).unwrap();

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    assert!(scanned
        .iter()
        .any(|r| matches!(r, Err(ScanError::PermissionDenied(_)))));
    assert_eq!(report.files_stored, 1);
    assert_eq!(report.errors, 1);
    assert!(!report.interrupted);
}

#[test]
fn test_vanished_files_are_counted_not_fatal() {
    let dir = TempDir::new().unwrap();
    for name in ["a", "b", "c"] {
        fs::write(dir.path().join(name), "same").unwrap();
    }
    let catalog = Catalog::new(Store::open_in_memory().unwrap(), Config::default());
    catalog.scan(dir.path()).unwrap();
    fs::remove_file(dir.path().join("b")).unwrap();

    let report = catalog.hash_pass(SizeFilter::default(), true).unwrap();

    assert_eq!(report.candidates, 3);
    assert_eq!(report.hashed, 2);
    assert_eq!(report.errors, 1);
    let groups = catalog.detector().duplicates_by_hash(0).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count, 2);
}

#[test]
fn test_overlong_paths_are_skipped() {
    let store = Store::open_in_memory().unwrap();
    let session = store.create_session("/").unwrap();
    let long = format!("/{}", "x".repeat(2100));

    let outcome = store
        .upsert_files(
            session,
            &[ScannedFile::new("/ok.txt", 1), ScannedFile::new(long.as_str(), 1)],
        )
        .unwrap();

    assert_eq!(outcome.stored, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(store.count_files().unwrap(), 1);
}

#[test]
fn test_unrepresentable_timestamps_become_null() {
    let store = Store::open_in_memory().unwrap();
    let session = store.create_session("/").unwrap();
    let mut file = ScannedFile::new("/odd.bin", 5);
    file.modified = UNIX_EPOCH.checked_add(Duration::from_secs(1 << 60));
    file.accessed = Some(SystemTime::now());

    store.upsert_files(session, &[file]).unwrap();

    let record = store.file_by_path("/odd.bin").unwrap().unwrap();
    assert!(record.mtime.is_none());
    assert!(record.atime.is_some());
    assert!(record.ctime.is_none());
}

#[test]
fn test_failing_folder_is_isolated() {
    let store = store_with(&["/good/a.txt", "/bad/b.txt", "/other/c.txt"]);
    store
        .connection()
        .execute_batch(
            "CREATE TRIGGER reject_bad BEFORE INSERT ON folders \
             WHEN NEW.full_path = '/bad' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

    let report = HierarchyMigrator::new(&store, MigrationSettings::default())
        .migrate()
        .unwrap();

    assert_eq!(report.files_assigned, 2);
    assert_eq!(report.folder_errors, 1);
    assert_eq!(store.count_files_missing_folder().unwrap(), 1);
    assert!(store
        .file_by_path("/bad/b.txt")
        .unwrap()
        .unwrap()
        .folder_id
        .is_none());
}

#[test]
fn test_repeated_batch_failures_abort_migration() {
    let store = store_with(&["/a/1.txt"]);
    store
        .connection()
        .execute_batch("ALTER TABLE files RENAME TO files_moved;")
        .unwrap();

    let err = HierarchyMigrator::new(&store, MigrationSettings::default())
        .migrate()
        .unwrap_err();

    match &err {
        Error::MigrationAborted { failures, .. } => assert_eq!(*failures, 4),
        other => panic!("expected MigrationAborted, got {other:?}"),
    }
    assert!(err.is_systemic());
}

fn tight_settings(max_consecutive_failures: usize) -> MigrationSettings {
    MigrationSettings {
        batch_size: 2,
        update_chunk_size: 10,
        folder_chunk_size: 10,
        max_consecutive_failures,
    }
}

#[test]
fn test_every_folder_write_failing_aborts_migration() {
    let paths: Vec<String> = (0..20).map(|i| format!("/dir{i}/f.txt")).collect();
    let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let store = store_with(&refs);
    store
        .connection()
        .execute_batch(
            "CREATE TRIGGER disk_full BEFORE INSERT ON folders \
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();

    let err = HierarchyMigrator::new(&store, tight_settings(2))
        .migrate()
        .unwrap_err();

    match &err {
        Error::MigrationAborted { failures, last_error } => {
            assert_eq!(*failures, 3);
            assert!(last_error.contains("disk full"));
        }
        other => panic!("expected MigrationAborted, got {other:?}"),
    }
    assert_eq!(store.count_files_missing_folder().unwrap(), 20);
}

#[test]
fn test_scattered_failed_batches_do_not_abort() {
    let store = store_with(&["/bad/1.txt", "/ok/2.txt", "/bad/3.txt", "/ok/4.txt"]);
    store
        .connection()
        .execute_batch(
            "CREATE TRIGGER reject_bad BEFORE INSERT ON folders \
             WHEN NEW.full_path = '/bad' \
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();
    let settings = MigrationSettings {
        batch_size: 1,
        ..tight_settings(1)
    };

    let report = HierarchyMigrator::new(&store, settings).migrate().unwrap();

    assert_eq!(report.batches, 4);
    assert_eq!(report.files_assigned, 2);
    assert_eq!(report.folder_errors, 2);
    assert_eq!(store.count_files_missing_folder().unwrap(), 2);
}

#[cfg(unix)]
#[test]
fn test_non_utf8_name_is_reported_and_skipped() {
    use std::os::unix::ffi::OsStrExt;

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("fine.txt"), "ok").unwrap();
    let invalid = dir.path().join(std::ffi::OsStr::from_bytes(&[0xff, 0xfe, 0xfd]));
    // Some filesystems refuse such names.
    if fs::write(&invalid, "bytes").is_err() {
        return;
    }

    let catalog = Catalog::new(Store::open_in_memory().unwrap(), Config::default());
    let report = catalog.scan(dir.path()).unwrap();

    assert_eq!(report.files_stored, 1);
    assert_eq!(report.errors, 1);
}
