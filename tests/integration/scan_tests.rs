use dupecat::catalog::Catalog;
use dupecat::config::Config;
use dupecat::duplicates::SizeFilter;
use dupecat::scanner::{DirectoryScanner, ScanOptions};
use dupecat::store::{SessionStatus, Store};
use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn catalog_with(options: ScanOptions) -> Catalog {
    let config = Config {
        scan: options,
        ..Config::default()
    };
    Catalog::new(Store::open_in_memory().unwrap(), config)
}

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_scan_empty_directory() {
    let dir = TempDir::new().unwrap();
    let catalog = catalog_with(ScanOptions::default());

    let report = catalog.scan(dir.path()).unwrap();

    assert_eq!(report.files_stored, 0);
    assert_eq!(report.directories, 1);
    assert_eq!(catalog.store().count_files().unwrap(), 0);
}

#[test]
fn test_scan_records_metadata() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "docs/report.PDF", b"0123456789");
    let catalog = catalog_with(ScanOptions::default());

    catalog.scan(dir.path()).unwrap();

    let path = dir.path().join("docs/report.PDF");
    let record = catalog
        .store()
        .file_by_path(path.to_str().unwrap())
        .unwrap()
        .expect("record stored");
    assert_eq!(record.name, "report.PDF");
    assert_eq!(record.size, 10);
    assert_eq!(record.extension.as_deref(), Some("pdf"));
    assert!(record.mtime.is_some());
    assert!(record.hash.is_none());
    assert!(record.folder_id.is_none());
}

#[test]
fn test_scan_excludes_substring_and_glob_patterns() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "keep/a.txt", b"a");
    write(dir.path(), "node_modules/pkg/index.js", b"js");
    write(dir.path(), "keep/build.tmp", b"tmp");

    let options = ScanOptions {
        exclude_patterns: vec!["node_modules".to_string(), "*.tmp".to_string()],
        ..ScanOptions::default()
    };
    let catalog = catalog_with(options);
    let report = catalog.scan(dir.path()).unwrap();

    assert_eq!(report.files_stored, 1);
    assert!(report.skipped >= 2);
}

#[test]
fn test_scan_respects_max_depth() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "top.txt", b"0");
    write(dir.path(), "d1/one.txt", b"1");
    write(dir.path(), "d1/d2/two.txt", b"2");
    write(dir.path(), "d1/d2/d3/three.txt", b"3");

    let options = ScanOptions {
        max_depth: Some(0),
        ..ScanOptions::default()
    };
    let report = catalog_with(options).scan(dir.path()).unwrap();
    assert_eq!(report.files_stored, 2);

    let options = ScanOptions {
        max_depth: Some(1),
        ..ScanOptions::default()
    };
    let report = catalog_with(options).scan(dir.path()).unwrap();
    assert_eq!(report.files_stored, 3);
}

#[test]
fn test_scan_very_deep_tree() {
    let dir = TempDir::new().unwrap();
    let mut rel = String::new();
    for i in 0..200 {
        rel.push_str(&format!("d{i}/"));
    }
    write(dir.path(), &format!("{rel}leaf.txt"), b"deep");

    let options = ScanOptions {
        max_depth: None,
        ..ScanOptions::default()
    };
    let scanner = DirectoryScanner::new(dir.path(), options);
    let files: Vec<_> = scanner.scan().filter_map(Result::ok).collect();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "leaf.txt");
}

#[test]
fn test_each_scan_opens_and_closes_a_session() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"a");
    let catalog = catalog_with(ScanOptions::default());

    let first = catalog.scan(dir.path()).unwrap();
    let second = catalog.scan(dir.path()).unwrap();

    assert_ne!(first.session_id, second.session_id);
    let sessions = catalog.store().recent_sessions(10).unwrap();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.status == SessionStatus::Completed));
    assert!(sessions.iter().all(|s| s.end_time.is_some()));
    // Same path, one record.
    assert_eq!(catalog.store().count_files().unwrap(), 1);
}

#[test]
fn test_rescan_keeps_fingerprint_of_unchanged_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"same");
    write(dir.path(), "b.txt", b"same");
    let catalog = catalog_with(ScanOptions::default());
    catalog.scan(dir.path()).unwrap();
    catalog.hash_pass(SizeFilter::default(), true).unwrap();

    catalog.scan(dir.path()).unwrap();

    let path = dir.path().join("a.txt");
    let record = catalog
        .store()
        .file_by_path(path.to_str().unwrap())
        .unwrap()
        .unwrap();
    assert!(record.hash.is_some());
    assert_eq!(
        catalog
            .hash_pass(SizeFilter::default(), true)
            .unwrap()
            .candidates,
        0
    );
}

#[test]
fn test_rescan_clears_fingerprint_of_modified_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.txt", b"same");
    write(dir.path(), "b.txt", b"same");
    let catalog = catalog_with(ScanOptions::default());
    catalog.scan(dir.path()).unwrap();
    catalog.hash_pass(SizeFilter::default(), true).unwrap();

    let path = dir.path().join("a.txt");
    fs::write(&path, b"diff").unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(1_000_000_000, 0)).unwrap();
    catalog.scan(dir.path()).unwrap();

    let record = catalog
        .store()
        .file_by_path(path.to_str().unwrap())
        .unwrap()
        .unwrap();
    assert!(record.hash.is_none());
    assert!(record.hash_tier.is_none());

    let report = catalog.hash_pass(SizeFilter::default(), true).unwrap();
    assert_eq!(report.hashed, 1);
    assert!(catalog.detector().duplicates_by_hash(0).unwrap().is_empty());
}

#[test]
fn test_unusual_file_names_round_trip() {
    let dir = TempDir::new().unwrap();
    let names = [
        "file with spaces.txt",
        "café_🦀.txt",
        "special_!@#$%^&()_+.txt",
        ".hidden",
    ];
    for name in names {
        write(dir.path(), name, name.as_bytes());
    }
    let catalog = catalog_with(ScanOptions::default());

    let report = catalog.scan(dir.path()).unwrap();

    assert_eq!(report.files_stored, names.len() as u64);
    for name in names {
        let path = dir.path().join(name);
        let record = catalog
            .store()
            .file_by_path(path.to_str().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(record.name, name);
    }
    let hidden = dir.path().join(".hidden");
    let hidden = catalog
        .store()
        .file_by_path(hidden.to_str().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(hidden.extension, None);
}
