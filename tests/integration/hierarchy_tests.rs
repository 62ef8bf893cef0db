use dupecat::hierarchy::{FolderRegistry, HierarchyMigrator, MigrationSettings};
use dupecat::paths::{ancestor_chain, folder_of, normalize};
use dupecat::store::Store;

#[test]
fn test_cross_platform_spellings_share_one_folder() {
    let store = Store::open_in_memory().unwrap();
    let mut registry = FolderRegistry::new(&store);

    let unix = registry.find_or_create_folder("/Users/me/Docs").unwrap();
    let created = registry.created();
    let windows = registry
        .find_or_create_folder(&folder_of(r"C:\Users\me\Docs\f.txt"))
        .unwrap();

    assert_eq!(unix, windows);
    assert_eq!(registry.created(), created);
    assert_eq!(normalize(r"C:\Users\me\Docs"), "/Users/me/Docs");
}

#[test]
fn test_folders_are_created_top_down_with_parents() {
    let store = Store::open_in_memory().unwrap();
    let mut registry = FolderRegistry::new(&store);

    let leaf = registry.find_or_create_folder("/a/b/c").unwrap();

    let mut chain = Vec::new();
    let mut current = store.folder(leaf).unwrap();
    while let Some(folder) = current {
        chain.push(folder.full_path.clone());
        current = match folder.parent_folder_id {
            Some(parent) => {
                assert!(parent < folder.id, "parent created after child");
                store.folder(parent).unwrap()
            }
            None => None,
        };
    }
    assert_eq!(chain, vec!["/a/b/c", "/a/b", "/a", "/"]);
}

#[test]
fn test_bulk_create_reuses_existing_rows() {
    let store = Store::open_in_memory().unwrap();
    let mut registry = FolderRegistry::new(&store).with_chunk_size(2);
    let existing = registry.find_or_create_folder("/x/y").unwrap();

    let paths: Vec<String> = ["/x/y", "/x/z", "/w", "/x/z"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let ids = registry.bulk_create_folders(&paths).unwrap();

    assert_eq!(ids.len(), 3);
    assert_eq!(ids["/x/y"], existing);
    assert_eq!(store.count_folders().unwrap(), 5); // "/", "/x", "/x/y", "/x/z", "/w"
}

#[test]
fn test_establish_hierarchy_backfills_missing_ancestors() {
    let store = Store::open_in_memory().unwrap();
    // Folders recorded without any ancestors, as an older importer would.
    let deep = store
        .insert_folder(None, "deep", "/data/projects/deep", "/data/projects/deep")
        .unwrap();
    let other = store
        .insert_folder(None, "other", "/data/other", "/data/other")
        .unwrap();

    let migrator = HierarchyMigrator::new(&store, MigrationSettings::default());
    let report = migrator.establish_hierarchy().unwrap();

    assert_eq!(report.linked, 2);
    // "/", "/data", "/data/projects"
    assert_eq!(report.folders_created, 3);

    let check = migrator.check_forest().unwrap();
    assert!(check.is_forest());
    assert_eq!(check.folders, 5);
    assert_eq!(check.roots, 1);
    assert_eq!(check.max_depth, 3);

    let deep = store.folder(deep).unwrap().unwrap();
    let projects = store.folder(deep.parent_folder_id.unwrap()).unwrap().unwrap();
    assert_eq!(projects.full_path, "/data/projects");
    let other = store.folder(other).unwrap().unwrap();
    assert_eq!(other.parent_folder_id, projects.parent_folder_id);
}

#[test]
fn test_establish_hierarchy_is_idempotent() {
    let store = Store::open_in_memory().unwrap();
    store.insert_folder(None, "c", "/a/b/c", "/a/b/c").unwrap();
    let migrator = HierarchyMigrator::new(&store, MigrationSettings::default());

    migrator.establish_hierarchy().unwrap();
    let links = store.parent_links().unwrap();
    let second = migrator.establish_hierarchy().unwrap();

    assert_eq!(second.linked, 0);
    assert_eq!(second.folders_created, 0);
    assert_eq!(store.parent_links().unwrap(), links);
}

#[test]
fn test_windows_drive_roots_are_roots() {
    let store = Store::open_in_memory().unwrap();
    let mut registry = FolderRegistry::new(&store);

    let id = registry.find_or_create_folder(r"D:\Media\Music").unwrap();
    let music = store.folder(id).unwrap().unwrap();
    assert_eq!(music.normalized_path, "/Media/Music");
    assert_eq!(music.folder_name, "Music");

    let chain = ancestor_chain(r"D:\Media\Music");
    assert_eq!(chain.first().map(String::as_str), Some(r"D:\"));
    let root = store.folder(
        store
            .folder(music.parent_folder_id.unwrap())
            .unwrap()
            .unwrap()
            .parent_folder_id
            .unwrap(),
    )
    .unwrap()
    .unwrap();
    assert!(root.is_root());
    assert_eq!(root.folder_name, "Root");
}
