use std::fs;
use std::path::Path;
use std::sync::Arc;

use dupescan::config::Config;
use dupescan::duplicates::{DuplicateFilter, SortBy};
use dupescan::engine::Engine;
use dupescan::progress::NoopObserver;
use dupescan::store::{Database, FileQuery, ScanPathStatus, SessionStatus};
use filetime::{set_file_mtime, FileTime};
use tempfile::tempdir;

fn engine_at(db_path: &Path) -> Engine {
    let config = Config {
        database_path: Some(db_path.to_path_buf()),
        ..Config::default()
    };
    Engine::open(&config, Arc::new(NoopObserver)).unwrap()
}

fn write(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_three_identical_files_form_one_group() {
    let root = tempdir().unwrap();
    let state = tempdir().unwrap();
    write(&root.path().join("a"), b"aaa");
    write(&root.path().join("b"), b"aaa");
    write(&root.path().join("c"), b"aaa");

    let engine = engine_at(&state.path().join("dupescan.db"));
    engine.add_scan_path(root.path()).unwrap();
    engine.start_scan().unwrap();

    let groups = engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 3);
    assert_eq!(groups[0].total_size(), 3);
    assert_eq!(groups[0].wasted_space(), 6);
    assert_eq!(groups[0].digest.len(), 64);
}

#[test]
fn test_nested_directories_and_skip_list() {
    let root = tempdir().unwrap();
    write(&root.path().join("photos/2023/x.txt"), b"dup");
    write(&root.path().join("backup/x.txt"), b"dup");
    write(&root.path().join("node_modules/pkg/x.txt"), b"dup");
    write(&root.path().join("unique.txt"), b"only me");

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(root.path()).unwrap();
    let summary = engine.start_scan().unwrap();

    assert_eq!(summary.progress.files_scanned, 3);
    assert_eq!(summary.progress.duplicates_found, 1);

    let groups = engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap();
    assert!(groups[0]
        .paths()
        .iter()
        .all(|p| !p.to_string_lossy().contains("node_modules")));

    let path = &engine.list_scan_paths().unwrap()[0];
    assert_eq!(path.status, ScanPathStatus::Completed);
    assert_eq!(path.files_found, 3);
    assert!(path.folders_found >= 3);
    assert!(path.last_scan_started.is_some());
    assert!(path.last_scan_completed.is_some());
}

#[test]
fn test_rescan_of_unchanged_tree_is_idempotent() {
    let root = tempdir().unwrap();
    let state = tempdir().unwrap();
    write(&root.path().join("one.bin"), b"same bytes");
    write(&root.path().join("two.bin"), b"same bytes");
    write(&root.path().join("three.bin"), b"different");

    let db_path = state.path().join("dupescan.db");
    let first = {
        let engine = engine_at(&db_path);
        engine.add_scan_path(root.path()).unwrap();
        let summary = engine.start_scan().unwrap();
        assert_eq!(summary.progress.files_hashed, 3);
        engine.database().query_files(&FileQuery::default()).unwrap()
    };

    // A new process over the same database
    let engine = engine_at(&db_path);
    let summary = engine.start_scan().unwrap();
    assert_eq!(summary.progress.files_scanned, 3);
    assert_eq!(summary.progress.files_hashed, 0);
    assert_eq!(summary.progress.duplicates_found, 1);

    let second = engine.database().query_files(&FileQuery::default()).unwrap();
    assert_eq!(first.len(), second.len());
    for (before, after) in first.iter().zip(&second) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.digest, after.digest);
        assert!(after.digest_valid);
    }
}

#[test]
fn test_changed_mtime_triggers_rehash() {
    let root = tempdir().unwrap();
    let a = root.path().join("a.txt");
    let b = root.path().join("b.txt");
    write(&a, b"abc");
    write(&b, b"abc");

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(root.path()).unwrap();
    assert_eq!(engine.start_scan().unwrap().progress.duplicates_found, 1);

    // Same size, new content, new mtime
    write(&b, b"xyz");
    set_file_mtime(&b, FileTime::from_unix_time(2_000_000_000, 0)).unwrap();

    let summary = engine.start_scan().unwrap();
    assert_eq!(summary.progress.files_hashed, 1);
    assert_eq!(summary.progress.duplicates_found, 0);

    let record = engine.database().find_file_by_path(&b).unwrap().unwrap();
    assert!(record.digest_valid);
    assert_eq!(
        record.modified_at.timestamp(),
        2_000_000_000,
        "stored mtime follows the file"
    );
}

#[test]
fn test_same_size_and_mtime_is_trusted() {
    let root = tempdir().unwrap();
    let a = root.path().join("a.txt");
    let b = root.path().join("b.txt");
    write(&a, b"abc");
    write(&b, b"abc");
    let pinned = FileTime::from_unix_time(1_600_000_000, 0);
    set_file_mtime(&b, pinned).unwrap();

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(root.path()).unwrap();
    engine.start_scan().unwrap();

    // Content changes but size and mtime are restored
    write(&b, b"xyz");
    set_file_mtime(&b, pinned).unwrap();

    let summary = engine.start_scan().unwrap();
    assert_eq!(summary.progress.files_hashed, 0);
    assert_eq!(summary.progress.duplicates_found, 1);
}

#[test]
fn test_unhashed_record_is_picked_up_by_next_run() {
    let root = tempdir().unwrap();
    let a = root.path().join("a.txt");
    let b = root.path().join("b.txt");
    write(&a, b"left over");
    write(&b, b"left over");

    let db = Arc::new(Database::open_in_memory().unwrap());
    // As if an earlier run had recorded the file but stopped before hashing it
    let observed = dupescan::store::FileRecord::observed(&a, &fs::metadata(&a).unwrap());
    db.create_file(&observed).unwrap();

    let engine =
        Engine::with_database(Arc::clone(&db), &Config::default(), Arc::new(NoopObserver))
            .unwrap();
    engine.add_scan_path(root.path()).unwrap();
    let summary = engine.start_scan().unwrap();

    assert_eq!(summary.progress.files_hashed, 2);
    assert_eq!(summary.progress.duplicates_found, 1);
    assert!(db.find_file_by_path(&a).unwrap().unwrap().digest_valid);
}

#[test]
fn test_missing_root_marks_error_and_continues() {
    let root = tempdir().unwrap();
    let gone = root.path().join("gone");
    fs::create_dir(&gone).unwrap();
    let present = root.path().join("present");
    write(&present.join("a"), b"1");
    write(&present.join("b"), b"1");

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(&gone).unwrap();
    engine.add_scan_path(&present).unwrap();
    fs::remove_dir(&gone).unwrap();

    let summary = engine.start_scan().unwrap();
    assert_eq!(summary.progress.files_scanned, 2);
    assert_eq!(summary.progress.duplicates_found, 1);

    let paths = engine.list_scan_paths().unwrap();
    let status_of = |p: &Path| paths.iter().find(|r| r.path == p).unwrap().status;
    assert_eq!(status_of(&gone), ScanPathStatus::Error);
    assert_eq!(status_of(&present), ScanPathStatus::Completed);

    let session = engine.last_session().unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
}

#[test]
fn test_duplicates_filters() {
    let root = tempdir().unwrap();
    write(&root.path().join("pics/a.jpg"), &[7u8; 2048]);
    write(&root.path().join("pics/b.JPG"), &[7u8; 2048]);
    write(&root.path().join("docs/a.txt"), b"tiny");
    write(&root.path().join("docs/b.txt"), b"tiny");

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(root.path()).unwrap();
    engine.start_scan().unwrap();

    let all = engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].total_size(), 2048, "largest waste first");

    let jpg_only = DuplicateFilter {
        extensions: vec!["jpg".to_string()],
        ..DuplicateFilter::default()
    };
    let groups = engine.duplicates(&jpg_only, SortBy::WastedSpace).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);

    let small = DuplicateFilter {
        max_size: Some(100),
        ..DuplicateFilter::default()
    };
    let groups = engine.duplicates(&small, SortBy::WastedSpace).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].total_size(), 4);

    let under_docs = DuplicateFilter {
        paths: vec![root.path().join("docs")],
        ..DuplicateFilter::default()
    };
    let groups = engine.duplicates(&under_docs, SortBy::Name).unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups[0].paths().iter().all(|p| p.starts_with(root.path().join("docs"))));
}

#[test]
fn test_png_dimensions_and_fingerprint_are_stored() {
    let root = tempdir().unwrap();
    let path = root.path().join("gradient.png");
    image::RgbImage::from_fn(40, 30, |x, y| image::Rgb([(x * 6) as u8, (y * 8) as u8, 90]))
        .save(&path)
        .unwrap();

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(root.path()).unwrap();
    engine.start_scan().unwrap();

    let record = engine
        .database()
        .find_file_by_path(&path)
        .unwrap()
        .unwrap();
    assert_eq!(record.media.width, Some(40));
    assert_eq!(record.media.height, Some(30));
    assert!(record.media.perceptual_hash.is_some());
    assert!(record.digest_valid);
}
