//! Scan progress tracking and reporting.
//!
//! The pipeline keeps its live counters in a [`ProgressTracker`] and reports
//! lifecycle transitions as [`ScanEvent`]s to a [`ScanObserver`]. Progress
//! events are throttled by the phases (every N files walked, every N files
//! hashed), never emitted per file.
//!
//! [`ConsoleProgress`] renders those events as an indicatif spinner for the
//! command line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Immutable copy of the live scan counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub files_scanned: u64,
    pub folders_scanned: u64,
    pub current_path: String,
    pub files_hashed: u64,
    pub duplicates_found: u64,
}

/// Lifecycle and progress notifications of a scan run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Started(ProgressSnapshot),
    Progress(ProgressSnapshot),
    Paused,
    Resumed,
    Stopped,
    Completed(ProgressSnapshot),
    Error(String),
}

/// Receiver of scan events.
///
/// Called from the pipeline's phase threads; implementations must not block
/// for long.
pub trait ScanObserver: Send + Sync {
    fn on_event(&self, event: &ScanEvent);
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {
    fn on_event(&self, _event: &ScanEvent) {}
}

/// Live counters shared by the pipeline phases.
///
/// Counters are atomics and the current path sits behind a mutex, so
/// [`ProgressTracker::snapshot`] is safe to call while a run is in flight.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    files_scanned: AtomicU64,
    folders_scanned: AtomicU64,
    files_hashed: AtomicU64,
    duplicates_found: AtomicU64,
    current_path: Mutex<String>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every counter for a new run.
    pub fn reset(&self) {
        self.files_scanned.store(0, Ordering::SeqCst);
        self.folders_scanned.store(0, Ordering::SeqCst);
        self.files_hashed.store(0, Ordering::SeqCst);
        self.duplicates_found.store(0, Ordering::SeqCst);
        self.set_current_path(String::new());
    }

    /// Count one walked file; returns the new total.
    pub fn add_file_scanned(&self) -> u64 {
        self.files_scanned.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count one walked directory.
    pub fn add_folder_scanned(&self) -> u64 {
        self.folders_scanned.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count one hashed file; returns the new total.
    pub fn add_file_hashed(&self) -> u64 {
        self.files_hashed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn set_duplicates_found(&self, count: u64) {
        self.duplicates_found.store(count, Ordering::SeqCst);
    }

    pub fn set_current_path(&self, path: String) {
        *self
            .current_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = path;
    }

    #[must_use]
    pub fn files_scanned(&self) -> u64 {
        self.files_scanned.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn files_hashed(&self) -> u64 {
        self.files_hashed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            files_scanned: self.files_scanned.load(Ordering::SeqCst),
            folders_scanned: self.folders_scanned.load(Ordering::SeqCst),
            current_path: self
                .current_path
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            files_hashed: self.files_hashed.load(Ordering::SeqCst),
            duplicates_found: self.duplicates_found.load(Ordering::SeqCst),
        }
    }
}

/// Spinner-based progress reporter using indicatif.
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl ConsoleProgress {
    /// Create a new progress reporter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - If true, nothing is displayed.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn message(snapshot: &ProgressSnapshot) -> String {
        format!(
            "{} files, {} folders scanned, {} hashed",
            snapshot.files_scanned, snapshot.folders_scanned, snapshot.files_hashed
        )
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Some(bar) = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            f(bar);
        }
    }

    fn finish(&self, message: String) {
        if let Some(bar) = self
            .bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            bar.finish_with_message(message);
        }
    }
}

impl ScanObserver for ConsoleProgress {
    fn on_event(&self, event: &ScanEvent) {
        if self.quiet {
            return;
        }

        match event {
            ScanEvent::Started(_) => {
                let bar = ProgressBar::new_spinner();
                bar.set_style(Self::style());
                bar.set_message("Scanning");
                bar.enable_steady_tick(Duration::from_millis(100));
                *self.bar.lock().unwrap_or_else(PoisonError::into_inner) = Some(bar);
            }
            ScanEvent::Progress(snapshot) => {
                let message = Self::message(snapshot);
                self.with_bar(|bar| bar.set_message(message));
            }
            ScanEvent::Paused => self.with_bar(|bar| bar.set_message("Paused")),
            ScanEvent::Resumed => self.with_bar(|bar| bar.set_message("Resuming")),
            ScanEvent::Stopped => self.finish("Stopped".to_string()),
            ScanEvent::Completed(snapshot) => self.finish(format!(
                "{}, {} duplicate groups",
                Self::message(snapshot),
                snapshot.duplicates_found
            )),
            ScanEvent::Error(message) => self.finish(format!("Failed: {message}")),
        }
    }
}
