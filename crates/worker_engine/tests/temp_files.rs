use std::fs;

use tempfile::TempDir;
use worker_engine::{TempFileError, TempFileStore};

#[test]
fn attach_creates_missing_root() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("session");
    assert!(!root.exists());
    TempFileStore::attach(&root).unwrap();
    assert!(root.is_dir());
}

#[test]
fn attach_rejects_a_file_as_root() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let result = TempFileStore::attach(&file_path);
    assert!(matches!(result, Err(TempFileError::Root(_))));
}

#[test]
fn files_are_attributed_to_their_analysis() {
    let temp = TempDir::new().unwrap();
    let store = TempFileStore::attach(temp.path()).unwrap();

    let plot = store.create("png", 4).unwrap();
    let state = store.create_specific("state", 4).unwrap();
    fs::write(plot.path(), "png").unwrap();
    fs::write(state.path(), "{}").unwrap();
    store.create("png", 5).unwrap();

    assert!(plot.relative.starts_with("resources/4/_"));
    assert!(plot.relative.ends_with(".png"));
    assert_eq!(state.relative, "resources/4/state");
    assert_eq!(store.retrieve_list(4).len(), 2);
    assert_eq!(store.retrieve_list(5).len(), 1);
    assert!(store.retrieve_list(6).is_empty());
}

#[test]
fn specific_names_map_to_the_same_file() {
    let temp = TempDir::new().unwrap();
    let store = TempFileStore::attach(temp.path()).unwrap();
    assert_eq!(
        store.create_specific("jaspResults.json", 1).unwrap(),
        store.create_specific("jaspResults.json", 1).unwrap()
    );
    assert!(matches!(
        store.create_specific("../escape", 1),
        Err(TempFileError::InvalidName(_))
    ));
}

#[test]
fn prune_keeps_only_listed_files() {
    let temp = TempDir::new().unwrap();
    let store = TempFileStore::attach(temp.path()).unwrap();
    let keep = store.create("svg", 2).unwrap();
    let drop = store.create("svg", 2).unwrap();

    store.prune(2, &[keep.relative.clone()]);

    assert!(keep.path().exists());
    assert!(!drop.path().exists());
    assert_eq!(store.retrieve_list(2), vec![keep.relative]);
}

#[test]
fn delete_all_clears_every_analysis() {
    let temp = TempDir::new().unwrap();
    let store = TempFileStore::attach(temp.path()).unwrap();
    store.create("png", 1).unwrap();
    store.create("png", 2).unwrap();

    store.delete_all().unwrap();
    assert!(store.retrieve_list(1).is_empty());
    assert!(store.retrieve_list(2).is_empty());
    // Deleting an already empty session is fine.
    store.delete_all().unwrap();
}
