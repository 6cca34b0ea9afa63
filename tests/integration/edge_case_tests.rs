use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use dupescan::duplicates::{DuplicateFilter, SortBy};
use dupescan::engine::Engine;
use dupescan::store::ScanPathStatus;
use tempfile::tempdir;

fn scan(root: &Path) -> Engine {
    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(root).unwrap();
    engine.start_scan().unwrap();
    engine
}

#[test]
fn test_empty_files_group_without_wasted_space() {
    let dir = tempdir().unwrap();
    File::create(dir.path().join("empty1.txt")).unwrap();
    File::create(dir.path().join("empty2.txt")).unwrap();

    let engine = scan(dir.path());
    let groups = engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].total_size(), 0);
    assert_eq!(groups[0].wasted_space(), 0);
}

#[test]
fn test_single_byte_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("small1.txt"), b"a").unwrap();
    fs::write(dir.path().join("small2.txt"), b"a").unwrap();
    fs::write(dir.path().join("small3.txt"), b"b").unwrap();

    let engine = scan(dir.path());
    let groups = engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
    assert_eq!(groups[0].wasted_space(), 1);
}

#[test]
fn test_large_files_differing_in_last_byte() {
    let dir = tempdir().unwrap();
    let mut content = vec![b'x'; 256 * 1024];
    fs::write(dir.path().join("big1.bin"), &content).unwrap();
    fs::write(dir.path().join("big2.bin"), &content).unwrap();
    if let Some(last) = content.last_mut() {
        *last = b'y';
    }
    fs::write(dir.path().join("big3.bin"), &content).unwrap();

    let engine = scan(dir.path());
    let groups = engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert!(groups[0]
        .paths()
        .iter()
        .all(|p| !p.ends_with("big3.bin")));
}

#[test]
fn test_special_character_names() {
    let dir = tempdir().unwrap();
    let names = [
        "file with spaces.txt",
        "file_ünïcödé.txt",
        "文件.txt",
        "quote's.txt",
        "bracket[1].txt",
        "#hash.txt",
    ];
    for name in names {
        File::create(dir.path().join(name))
            .unwrap()
            .write_all(b"shared content")
            .unwrap();
    }

    let engine = scan(dir.path());
    let groups = engine
        .duplicates(&DuplicateFilter::default(), SortBy::Name)
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), names.len());
    for name in names {
        assert!(groups[0].paths().iter().any(|p| p.ends_with(name)));
    }
}

#[test]
fn test_deeply_nested_duplicate() {
    let dir = tempdir().unwrap();
    let mut deep = dir.path().to_path_buf();
    for level in 0..15 {
        deep = deep.join(format!("level{level}"));
    }
    fs::create_dir_all(&deep).unwrap();
    fs::write(deep.join("deep.txt"), b"buried").unwrap();
    fs::write(dir.path().join("shallow.txt"), b"buried").unwrap();

    let engine = scan(dir.path());
    let path = &engine.list_scan_paths().unwrap()[0];
    assert_eq!(path.files_found, 2);
    assert_eq!(path.folders_found, 15);

    let groups = engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert!(groups[0].paths().contains(&deep.join("deep.txt").as_path()));
}

#[test]
fn test_overlapping_roots_record_each_file_once() {
    let dir = tempdir().unwrap();
    let inner = dir.path().join("inner");
    fs::create_dir(&inner).unwrap();
    fs::write(inner.join("a.txt"), b"same").unwrap();
    fs::write(dir.path().join("b.txt"), b"same").unwrap();

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(dir.path()).unwrap();
    engine.add_scan_path(&inner).unwrap();
    engine.start_scan().unwrap();

    let groups = engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2, "a path is one record however often it is seen");
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_does_not_abort_scan() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let locked = dir.path().join("locked");
    fs::create_dir(&locked).unwrap();
    fs::write(locked.join("hidden.txt"), b"dup").unwrap();
    fs::write(dir.path().join("a.txt"), b"dup").unwrap();
    fs::write(dir.path().join("b.txt"), b"dup").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

    // Root ignores permission bits, nothing to observe there
    let readable = fs::read_dir(&locked).is_ok();

    let engine = scan(dir.path());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

    let path = &engine.list_scan_paths().unwrap()[0];
    assert_eq!(path.status, ScanPathStatus::Completed);

    let groups = engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap();
    assert_eq!(groups.len(), 1);
    if !readable {
        assert_eq!(groups[0].len(), 2);
    }
}

#[cfg(unix)]
#[test]
fn test_symlinked_file_is_not_a_duplicate() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("real.txt"), b"only once").unwrap();
    std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))
        .unwrap();

    let engine = scan(dir.path());
    let groups = engine
        .duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)
        .unwrap();
    assert!(groups.is_empty());
}

#[cfg(target_os = "linux")]
#[test]
fn test_names_differing_in_non_utf8_bytes_are_distinct_records() {
    use dupescan::store::FileQuery;
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let ff = dir.path().join(OsStr::from_bytes(b"a\xff.bin"));
    let fe = dir.path().join(OsStr::from_bytes(b"a\xfe.bin"));
    fs::write(&ff, b"same bytes").unwrap();
    fs::write(&fe, b"same bytes").unwrap();

    let engine = Engine::in_memory().unwrap();
    engine.add_scan_path(dir.path()).unwrap();
    let summary = engine.start_scan().unwrap();
    assert_eq!(summary.progress.files_scanned, 2);
    assert_eq!(summary.progress.files_hashed, 2);
    assert_eq!(summary.progress.duplicates_found, 1);

    let records = engine
        .database()
        .query_files(&FileQuery::default())
        .unwrap();
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(record.path.exists(), "{:?} must name a real file", record.path);
    }
    assert!(records.iter().any(|r| r.path == ff));
    assert!(records.iter().any(|r| r.path == fe));
}
