use std::fs;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use dupescan::pipeline::{PipelineError, PipelineSettings, ScanPipeline};
use dupescan::progress::{ProgressSnapshot, ScanEvent, ScanObserver};
use dupescan::store::{Database, FileQuery, ScanPathStatus, SessionStatus};
use tempfile::{tempdir, TempDir};

/// Pauses the run as soon as it starts and records every event.
#[derive(Default)]
struct PauseOnStart {
    pipeline: OnceLock<Weak<ScanPipeline>>,
    events: Mutex<Vec<&'static str>>,
}

impl ScanObserver for PauseOnStart {
    fn on_event(&self, event: &ScanEvent) {
        let name = match event {
            ScanEvent::Started(_) => "started",
            ScanEvent::Progress(_) => return,
            ScanEvent::Paused => "paused",
            ScanEvent::Resumed => "resumed",
            ScanEvent::Stopped => "stopped",
            ScanEvent::Completed(_) => "completed",
            ScanEvent::Error(_) => "error",
        };
        self.events.lock().unwrap().push(name);

        if matches!(event, ScanEvent::Started(_)) {
            if let Some(pipeline) = self.pipeline.get().and_then(Weak::upgrade) {
                assert!(pipeline.pause());
            }
        }
    }
}

/// Pauses the run once, at the first progress event that has walked at least
/// `threshold` files, and records every progress snapshot.
struct PauseAtScanned {
    pipeline: OnceLock<Weak<ScanPipeline>>,
    threshold: u64,
    fired: AtomicBool,
    progress: Mutex<Vec<ProgressSnapshot>>,
}

impl PauseAtScanned {
    fn new(threshold: u64) -> Self {
        Self {
            pipeline: OnceLock::new(),
            threshold,
            fired: AtomicBool::new(false),
            progress: Mutex::new(Vec::new()),
        }
    }
}

impl ScanObserver for PauseAtScanned {
    fn on_event(&self, event: &ScanEvent) {
        let ScanEvent::Progress(snapshot) = event else {
            return;
        };
        self.progress.lock().unwrap().push(snapshot.clone());
        if snapshot.files_scanned >= self.threshold && !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(pipeline) = self.pipeline.get().and_then(Weak::upgrade) {
                pipeline.pause();
            }
        }
    }
}

fn bound_pipeline<O: ScanObserver + 'static>(
    db: &Arc<Database>,
    settings: PipelineSettings,
    observer: &Arc<O>,
    slot: &OnceLock<Weak<ScanPipeline>>,
) -> Arc<ScanPipeline> {
    let pipeline = Arc::new(
        ScanPipeline::new(Arc::clone(db), settings)
            .unwrap()
            .with_observer(observer.clone()),
    );
    slot.set(Arc::downgrade(&pipeline))
        .unwrap_or_else(|_| panic!("observer already bound"));
    pipeline
}

fn distinct_files(root: &std::path::Path, count: usize) {
    for i in 0..count {
        fs::write(root.join(format!("file_{i:03}.txt")), format!("content {i}")).unwrap();
    }
}

struct Fixture {
    _root: TempDir,
    roots: Vec<PathBuf>,
    db: Arc<Database>,
    pipeline: Arc<ScanPipeline>,
    observer: Arc<PauseOnStart>,
}

fn fixture(files: usize) -> Fixture {
    fixture_on(files, Arc::new(Database::open_in_memory().unwrap()))
}

fn fixture_on(files: usize, db: Arc<Database>) -> Fixture {
    let root = tempdir().unwrap();
    for i in 0..files {
        fs::write(root.path().join(format!("file_{i}.txt")), b"identical").unwrap();
    }
    db.add_scan_path(root.path()).unwrap();

    let observer = Arc::new(PauseOnStart::default());
    let settings = PipelineSettings {
        hash_batch_size: 2,
        ..PipelineSettings::default()
    };
    let pipeline = bound_pipeline(&db, settings, &observer, &observer.pipeline);

    Fixture {
        roots: vec![root.path().to_path_buf()],
        _root: root,
        db,
        pipeline,
        observer,
    }
}

fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for pipeline");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_pause_holds_progress_until_resume() {
    let fx = fixture(6);
    let runner = {
        let pipeline = Arc::clone(&fx.pipeline);
        let roots = fx.roots.clone();
        thread::spawn(move || pipeline.start(&roots))
    };

    wait_until(|| fx.pipeline.is_paused());
    thread::sleep(Duration::from_millis(100));
    let held = fx.pipeline.progress();
    assert_eq!(held.files_scanned, 0);
    assert_eq!(held.files_hashed, 0);

    // Pausing twice is a no-op
    assert!(!fx.pipeline.pause());
    assert!(fx.pipeline.resume());

    let summary = runner.join().unwrap().unwrap();
    assert!(!summary.stopped);
    assert_eq!(summary.progress.files_scanned, 6);
    assert_eq!(summary.progress.files_hashed, 6);
    assert_eq!(summary.progress.duplicates_found, 1);

    let events = fx.observer.events.lock().unwrap().clone();
    assert_eq!(events, vec!["started", "paused", "resumed", "completed"]);
}

#[test]
fn test_second_start_while_running_is_rejected() {
    let fx = fixture(2);
    let runner = {
        let pipeline = Arc::clone(&fx.pipeline);
        let roots = fx.roots.clone();
        thread::spawn(move || pipeline.start(&roots))
    };
    wait_until(|| fx.pipeline.is_paused());

    let err = fx.pipeline.start(&fx.roots).unwrap_err();
    assert!(matches!(err, PipelineError::AlreadyRunning));
    // The active run and its session are untouched
    assert!(fx.pipeline.is_running());
    assert_eq!(fx.db.running_session_count().unwrap(), 1);

    fx.pipeline.resume();
    runner.join().unwrap().unwrap();
    assert_eq!(fx.db.running_session_count().unwrap(), 0);
}

#[test]
fn test_stop_then_restart_hashes_everything() {
    let fx = fixture(5);
    let runner = {
        let pipeline = Arc::clone(&fx.pipeline);
        let roots = fx.roots.clone();
        thread::spawn(move || pipeline.start(&roots))
    };
    wait_until(|| fx.pipeline.is_paused());

    assert!(fx.pipeline.stop());
    let stopped = runner.join().unwrap().unwrap();
    assert!(stopped.stopped);
    assert_eq!(stopped.progress.files_hashed, 0);
    assert!(!fx.pipeline.is_running());
    assert!(!fx.pipeline.stop(), "nothing left to stop");

    let session = fx.db.get_session(stopped.session_id).unwrap().unwrap();
    assert_eq!(session.status, SessionStatus::Completed);
    assert!(session.ended_at.is_some());

    let path = &fx.db.list_scan_paths(true).unwrap()[0];
    assert_eq!(path.status, ScanPathStatus::Idle);

    // Restart without the pausing observer
    let plain = ScanPipeline::new(Arc::clone(&fx.db), PipelineSettings::default()).unwrap();
    let summary = plain.start(&fx.roots).unwrap();
    assert!(!summary.stopped);
    assert_eq!(summary.progress.files_scanned, 5);
    assert_eq!(summary.progress.duplicates_found, 1);

    let records = fx.db.query_files(&FileQuery::default()).unwrap();
    assert_eq!(records.len(), 5);
    assert!(records.iter().all(|r| r.digest_valid));
}

#[test]
fn test_second_database_handle_leaves_live_scan_alone() {
    let state = tempdir().unwrap();
    let db_path = state.path().join("dupescan.db");
    let fx = fixture_on(3, Arc::new(Database::open(&db_path).unwrap()));
    let runner = {
        let pipeline = Arc::clone(&fx.pipeline);
        let roots = fx.roots.clone();
        thread::spawn(move || pipeline.start(&roots))
    };
    wait_until(|| fx.pipeline.is_paused());
    let live = fx.db.latest_session().unwrap().unwrap();

    // A second handle, as another process would open it
    let other_db = Arc::new(Database::open(&db_path).unwrap());
    let other = ScanPipeline::new(Arc::clone(&other_db), PipelineSettings::default()).unwrap();
    assert_eq!(
        other_db.get_session(live.id).unwrap().unwrap().status,
        SessionStatus::Running
    );
    assert!(matches!(
        other.start(&fx.roots),
        Err(PipelineError::AlreadyRunning)
    ));
    assert_eq!(
        fx.db.get_session(live.id).unwrap().unwrap().status,
        SessionStatus::Running
    );

    assert!(fx.pipeline.resume());
    let summary = runner.join().unwrap().unwrap();
    assert_eq!(summary.session_id, live.id);
    assert_eq!(
        fx.db.get_session(live.id).unwrap().unwrap().status,
        SessionStatus::Completed
    );

    // Released with the run
    let next = other.start(&fx.roots).unwrap();
    assert_eq!(next.progress.files_scanned, 3);
}

#[test]
fn test_pause_mid_walk_scans_every_file_once() {
    let root = tempdir().unwrap();
    distinct_files(root.path(), 30);
    let db = Arc::new(Database::open_in_memory().unwrap());
    let observer = Arc::new(PauseAtScanned::new(5));
    let settings = PipelineSettings {
        walk_progress_interval: 5,
        hash_progress_interval: 1_000,
        ..PipelineSettings::default()
    };
    let pipeline = bound_pipeline(&db, settings, &observer, &observer.pipeline);

    let runner = {
        let pipeline = Arc::clone(&pipeline);
        let roots = vec![root.path().to_path_buf()];
        thread::spawn(move || pipeline.start(&roots))
    };
    wait_until(|| pipeline.is_paused());
    thread::sleep(Duration::from_millis(100));
    let before = pipeline.progress().files_scanned;
    assert_eq!(before, 5, "the walker holds at the entry after the pause");

    assert!(pipeline.resume());
    let summary = runner.join().unwrap().unwrap();
    let after = summary.progress.files_scanned - before;
    assert_eq!(before + after, 30);
    assert_eq!(summary.progress.files_hashed, 30);

    let records = db.query_files(&FileQuery::default()).unwrap();
    let paths: HashSet<_> = records.iter().map(|r| r.path.clone()).collect();
    assert_eq!(records.len(), 30);
    assert_eq!(paths.len(), 30);
    assert!(records.iter().all(|r| r.digest_valid));

    let session = db.get_session(summary.session_id).unwrap().unwrap();
    assert_eq!(session.files_scanned, 30);
}

#[test]
fn test_progress_events_are_throttled_and_persisted() {
    let root = tempdir().unwrap();
    distinct_files(root.path(), 250);
    let db = Arc::new(Database::open_in_memory().unwrap());
    let observer = Arc::new(PauseAtScanned::new(200));
    let pipeline = bound_pipeline(&db, PipelineSettings::default(), &observer, &observer.pipeline);

    let runner = {
        let pipeline = Arc::clone(&pipeline);
        let roots = vec![root.path().to_path_buf()];
        thread::spawn(move || pipeline.start(&roots))
    };
    wait_until(|| pipeline.is_paused());
    // The walker writes its counters right after the event that paused it
    wait_until(|| db.latest_session().unwrap().unwrap().files_scanned == 200);
    let mid_run = db.latest_session().unwrap().unwrap();
    assert_eq!(mid_run.status, SessionStatus::Running);
    assert_eq!(mid_run.files_hashed % 10, 0);
    assert!(mid_run.current_path.is_some());

    assert!(pipeline.resume());
    let summary = runner.join().unwrap().unwrap();
    assert_eq!(summary.progress.files_scanned, 250);

    // One event per root, one per 100 walked, one per 10 hashed
    let progress = observer.progress.lock().unwrap().clone();
    assert_eq!(progress.len(), 1 + 2 + 25);
    assert!(progress
        .iter()
        .all(|p| p.files_scanned % 100 == 0 || p.files_hashed % 10 == 0));
    assert_eq!(
        progress.iter().filter(|p| p.files_hashed == 0 && p.files_scanned == 0).count(),
        1
    );

    let session = db.get_session(summary.session_id).unwrap().unwrap();
    assert_eq!(session.files_scanned, 250);
    assert_eq!(session.files_hashed, 250);
}
