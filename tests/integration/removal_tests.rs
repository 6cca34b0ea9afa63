use std::fs;
use std::path::Path;

use chrono::{Duration, TimeZone, Utc};
use dupescan::duplicates::{DuplicateError, DuplicateFilter, KeepPolicy, SortBy};
use dupescan::engine::Engine;
use dupescan::store::FileQuery;
use tempfile::tempdir;

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Scan `root` and pin the creation times of `ordered` to t1 < t2 < ...
fn scan_with_creation_order(engine: &Engine, root: &Path, ordered: &[&Path]) {
    engine.add_scan_path(root).unwrap();
    engine.start_scan().unwrap();

    let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    for (i, path) in ordered.iter().enumerate() {
        let mut record = engine.database().find_file_by_path(path).unwrap().unwrap();
        record.created_at = base + Duration::hours(i as i64);
        engine.database().save_file(&record).unwrap();
    }
}

#[test]
fn test_remove_in_path_keeps_oldest() {
    let root = tempdir().unwrap();
    let data = root.path().join("data");
    let (t1, t2, t3) = (data.join("first"), data.join("second"), data.join("third"));
    for p in [&t1, &t2, &t3] {
        write(p, b"aaa");
    }

    let engine = Engine::in_memory().unwrap();
    scan_with_creation_order(&engine, root.path(), &[&t1, &t2, &t3]);

    let result = engine
        .remove_duplicates_in_path(&data, KeepPolicy::Oldest)
        .unwrap();

    assert_eq!(result.success_count(), 2);
    assert!(result.all_succeeded());
    assert_eq!(result.bytes_freed, 6);
    assert!(t1.exists());
    assert!(!t2.exists());
    assert!(!t3.exists());

    let live = engine.database().query_files(&FileQuery::default()).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].path, t1);
    assert!(engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap()
        .is_empty());
}

#[test]
fn test_remove_in_path_keeps_newest() {
    let root = tempdir().unwrap();
    let data = root.path().join("data");
    let (t1, t2, t3) = (data.join("first"), data.join("second"), data.join("third"));
    for p in [&t1, &t2, &t3] {
        write(p, b"bbb");
    }

    let engine = Engine::in_memory().unwrap();
    scan_with_creation_order(&engine, root.path(), &[&t1, &t2, &t3]);

    let result = engine
        .remove_duplicates_in_path(&data, KeepPolicy::Newest)
        .unwrap();
    assert_eq!(result.success_count(), 2);
    assert!(!t1.exists());
    assert!(!t2.exists());
    assert!(t3.exists());
}

#[test]
fn test_remove_in_path_spanning_group_removes_inside_copies() {
    let root = tempdir().unwrap();
    let archive = root.path().join("archive");
    let keep = root.path().join("library/song.mp3");
    let copy_a = archive.join("song.mp3");
    let copy_b = archive.join("old/song (1).mp3");
    for p in [&keep, &copy_a, &copy_b] {
        write(p, b"not really audio");
    }

    let engine = Engine::in_memory().unwrap();
    scan_with_creation_order(&engine, root.path(), &[&copy_a, &copy_b, &keep]);

    let result = engine
        .remove_duplicates_in_path(&archive, KeepPolicy::Oldest)
        .unwrap();

    // The copy outside the prefix survives even though it is the newest
    assert_eq!(result.success_count(), 2);
    assert!(keep.exists());
    assert!(!copy_a.exists());
    assert!(!copy_b.exists());
}

#[test]
fn test_remove_in_path_prefix_is_component_wise() {
    let root = tempdir().unwrap();
    let data = root.path().join("data");
    let database = root.path().join("database");
    write(&data.join("x"), b"zzz");
    write(&database.join("x"), b"zzz");

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(root.path()).unwrap();
    engine.start_scan().unwrap();

    let result = engine
        .remove_duplicates_in_path(&data, KeepPolicy::Oldest)
        .unwrap();
    assert_eq!(result.success_count(), 1);
    assert!(!data.join("x").exists());
    assert!(database.join("x").exists());
}

#[test]
fn test_remove_in_path_reports_failures_and_continues() {
    let root = tempdir().unwrap();
    let data = root.path().join("data");
    let (t1, t2, t3) = (data.join("a"), data.join("b"), data.join("c"));
    for p in [&t1, &t2, &t3] {
        write(p, b"ccc");
    }

    let engine = Engine::in_memory().unwrap();
    scan_with_creation_order(&engine, root.path(), &[&t1, &t2, &t3]);
    // Vanishes behind the store's back
    fs::remove_file(&t2).unwrap();

    let result = engine
        .remove_duplicates_in_path(&data, KeepPolicy::Oldest)
        .unwrap();
    assert_eq!(result.success_count(), 1);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(result.failures[0].0, t2);
    assert!(!t3.exists());

    let failed = engine.database().find_file_by_path(&t2).unwrap().unwrap();
    assert!(!failed.is_deleted, "failed removals leave the record live");
}

#[test]
fn test_remove_file_soft_deletes_record() {
    let root = tempdir().unwrap();
    let a = root.path().join("a.txt");
    let b = root.path().join("b.txt");
    write(&a, b"dup");
    write(&b, b"dup");

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(root.path()).unwrap();
    engine.start_scan().unwrap();

    let id = engine.database().find_file_by_path(&b).unwrap().unwrap().id;
    let result = engine.remove_file(id).unwrap();
    assert_eq!(result.id, Some(id));
    assert_eq!(result.size, 3);
    assert!(!b.exists());

    let record = engine.database().get_file(id).unwrap().unwrap();
    assert!(record.is_deleted);
    assert!(engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap()
        .is_empty());

    let stats = engine.statistics().unwrap();
    assert_eq!(stats.total_files, 1);
    assert_eq!(stats.total_duplicates, 0);
}

#[test]
fn test_remove_unknown_file() {
    let engine = Engine::in_memory().unwrap();
    assert!(matches!(
        engine.remove_file(999),
        Err(DuplicateError::NotFound(999))
    ));
}

#[test]
fn test_remove_file_failure_keeps_record() {
    let root = tempdir().unwrap();
    let a = root.path().join("a.txt");
    let b = root.path().join("b.txt");
    write(&a, b"dup");
    write(&b, b"dup");

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(root.path()).unwrap();
    engine.start_scan().unwrap();

    let id = engine.database().find_file_by_path(&a).unwrap().unwrap().id;
    fs::remove_file(&a).unwrap();

    assert!(matches!(
        engine.remove_file(id),
        Err(DuplicateError::Delete(_))
    ));
    assert!(!engine.database().get_file(id).unwrap().unwrap().is_deleted);
}

#[test]
fn test_statistics_aggregate() {
    let root = tempdir().unwrap();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        write(&root.path().join(name), &[1u8; 100]);
    }
    write(&root.path().join("x.txt"), b"hello");
    write(&root.path().join("y.txt"), b"hello");
    write(&root.path().join("z.txt"), b"unique");

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(root.path()).unwrap();
    engine.start_scan().unwrap();

    let stats = engine.statistics().unwrap();
    assert_eq!(stats.total_files, 6);
    assert_eq!(stats.total_duplicates, 3);
    assert_eq!(stats.total_wasted_space, 200 + 5);
    assert_eq!(stats.duplicates_by_extension.get("jpg"), Some(&2));
    assert_eq!(stats.duplicates_by_extension.get("txt"), Some(&1));
}
