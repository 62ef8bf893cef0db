use dupecat::catalog::Catalog;
use dupecat::config::Config;
use dupecat::duplicates::{DuplicateDetector, DuplicateMarker, SizeFilter};
use dupecat::hierarchy::FolderRegistry;
use dupecat::scanner::{HashTier, ScannedFile};
use dupecat::store::Store;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn store_with(files: &[(&str, u64, Option<&str>)]) -> Store {
    let store = Store::open_in_memory().unwrap();
    let session = store.create_session("/").unwrap();
    let scanned: Vec<_> = files.iter().map(|(p, s, _)| ScannedFile::new(*p, *s)).collect();
    store.upsert_files(session, &scanned).unwrap();
    for (path, _, hash) in files {
        if let Some(hash) = hash {
            let id = store.file_by_path(path).unwrap().unwrap().id;
            store.set_fingerprint(id, hash, HashTier::Full, None).unwrap();
        }
    }
    store
}

fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_duplicates_by_hash_example() {
    let store = store_with(&[
        ("/a/x.txt", 100, Some("H1")),
        ("/b/x.txt", 100, Some("H1")),
        ("/c/y.txt", 200, Some("H2")),
    ]);

    let groups = DuplicateDetector::new(&store).duplicates_by_hash(0).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].hash, "H1");
    assert_eq!(groups[0].count, 2);
    assert_eq!(groups[0].size, 100);
    assert_eq!(groups[0].wasted_space, 100);
}

#[test]
fn test_duplicates_by_hash_ordered_by_size_and_filtered() {
    let store = store_with(&[
        ("/s1", 10, Some("S")),
        ("/s2", 10, Some("S")),
        ("/l1", 5000, Some("L")),
        ("/l2", 5000, Some("L")),
        ("/l3", 5000, Some("L")),
    ]);
    let detector = DuplicateDetector::new(&store);

    let groups = detector.duplicates_by_hash(0).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].hash, "L");
    assert_eq!(groups[0].wasted_space, 10_000);

    let big_only = detector.duplicates_by_hash(100).unwrap();
    assert_eq!(big_only.len(), 1);
    assert_eq!(detector.group_members(&big_only[0]).unwrap().len(), 3);
}

#[test]
fn test_same_hash_different_size_is_not_a_group() {
    let store = store_with(&[("/a", 10, Some("H")), ("/b", 11, Some("H"))]);
    assert!(DuplicateDetector::new(&store)
        .duplicates_by_hash(0)
        .unwrap()
        .is_empty());
}

#[test]
fn test_duplicates_by_name_and_size_ignores_hash() {
    let store = store_with(&[
        ("/a/song.mp3", 300, None),
        ("/b/song.mp3", 300, Some("X")),
        ("/c/song.mp3", 301, None),
    ]);

    let groups = DuplicateDetector::new(&store)
        .duplicates_by_name_and_size(0)
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].name, "song.mp3");
    assert_eq!(groups[0].count, 2);
}

#[test]
fn test_size_unique_files_are_never_candidates() {
    let store = store_with(&[("/a", 1, None), ("/b", 2, None), ("/c", 2, None)]);
    let detector = DuplicateDetector::new(&store);

    let grouped = detector.files_without_hash(SizeFilter::default(), true).unwrap();
    let paths: Vec<_> = grouped.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["/b", "/c"]);

    let all = detector.files_without_hash(SizeFilter::default(), false).unwrap();
    assert_eq!(all.len(), 3);

    let bounded = detector
        .files_without_hash(
            SizeFilter {
                min_size: Some(2),
                max_size: Some(2),
            },
            false,
        )
        .unwrap();
    assert_eq!(bounded.len(), 2);
}

#[test]
fn test_new_copy_of_hashed_file_becomes_candidate() {
    let store = store_with(&[("/old", 50, Some("H"))]);
    let detector = DuplicateDetector::new(&store);
    assert!(detector
        .files_without_hash(SizeFilter::default(), true)
        .unwrap()
        .is_empty());

    let session = store.create_session("/").unwrap();
    store
        .upsert_files(session, &[ScannedFile::new("/new", 50)])
        .unwrap();

    let candidates = detector.files_without_hash(SizeFilter::default(), true).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].path, "/new");
}

#[test]
fn test_duplicate_folders_example() {
    let store = store_with(&[
        ("/m/a.txt", 10, Some("Ha")),
        ("/m/b.txt", 20, Some("Hb")),
        ("/n/b.txt", 20, Some("Hb")),
        ("/n/a.txt", 10, Some("Ha")),
        ("/o/a.txt", 10, Some("Ha")),
    ]);
    let mut registry = FolderRegistry::new(&store);
    for folder in ["/m", "/n", "/o"] {
        let id = registry.find_or_create_folder(folder).unwrap();
        let ids: Vec<i64> = ["a.txt", "b.txt"]
            .iter()
            .filter_map(|name| store.file_by_path(&format!("{folder}/{name}")).unwrap())
            .map(|f| f.id)
            .collect();
        store.assign_folder(id, &ids, 100).unwrap();
    }

    let groups = DuplicateDetector::new(&store).duplicate_folders(0).unwrap();

    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.len(), 2);
    assert_eq!(group.file_count, 2);
    assert_eq!(group.total_size, 30);
    assert_eq!(group.wasted_space, 30);
    let paths: Vec<_> = group.folders.iter().map(|f| f.full_path.as_str()).collect();
    assert_eq!(paths, vec!["/m", "/n"]);
}

#[test]
fn test_full_pipeline_finds_file_and_folder_duplicates() {
    let dir = TempDir::new().unwrap();
    for copy in ["backup1", "backup2"] {
        write(dir.path(), &format!("{copy}/photo.jpg"), b"jpeg bytes");
        write(dir.path(), &format!("{copy}/notes.txt"), b"some notes");
    }
    write(dir.path(), "other/notes.txt", b"other note");

    let catalog = Catalog::new(Store::open_in_memory().unwrap(), Config::default());
    catalog.scan(dir.path()).unwrap();
    catalog.hash_pass(SizeFilter::default(), true).unwrap();
    catalog.migrator().migrate().unwrap();

    let detector = catalog.detector();
    let files = detector.duplicates_by_hash(0).unwrap();
    assert_eq!(files.len(), 2);

    let folders = detector.duplicate_folders(0).unwrap();
    assert_eq!(folders.len(), 1);
    assert!(folders[0].folders[0].full_path.ends_with("backup1"));
    assert!(folders[0].folders[1].full_path.ends_with("backup2"));

    let marked = DuplicateMarker::new(catalog.store())
        .mark_content_duplicates()
        .unwrap();
    assert_eq!(marked, 2);

    let summary = detector.summary().unwrap();
    assert_eq!(summary.files, 5);
    assert_eq!(summary.duplicate_groups, 2);
    assert_eq!(summary.duplicate_files, 4);
    assert_eq!(summary.reclaimable_bytes, 20);
    assert_eq!(summary.files_without_folder, 0);
}
