//! Scan pipeline coordinator.
//!
//! A run walks the given roots, hashes new and changed files, extracts media
//! metadata, counts duplicate groups and records all of it in a
//! [`ScanSession`](crate::store::ScanSession).
//!
//! # Concurrency
//!
//! The walk, hash and extract phases run on three threads inside
//! [`std::thread::scope`]. The walker feeds two [`WorkQueue`]s; hashing and
//! extraction claim batches from them and process each batch on a rayon pool
//! sized to the batch. Consumers block on the queue rather than polling.
//!
//! # Control
//!
//! - [`ScanPipeline::pause`] holds every phase at its next boundary (walked
//!   entry or claimed batch) without discarding queued work. A file already
//!   being hashed finishes first, so batch sizes bound the pause latency.
//! - [`ScanPipeline::resume`] lets the phases continue where they stopped.
//! - [`ScanPipeline::stop`] discards both queues and makes every phase exit.
//!   Files not yet hashed keep `digest_valid = false` and are picked up by the
//!   next run.
//!
//! A run is visible to the control calls only once its control flags and
//! queues are fresh, so a stop or pause accepted at any point of a run is
//! never undone by that run's own setup.
//!
//! # Ownership
//!
//! A run holds the database's scan lock from before its session is created
//! until it is finalized. Sessions still `running` once the lock is held
//! belong to a process that exited, and only then are they finalized as
//! errors. Creating a pipeline touches no session state.

pub mod control;
mod phases;
pub mod queue;

use std::any::Any;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::Serialize;

pub use control::ScanControl;
pub use queue::WorkQueue;

use crate::duplicates::DuplicateService;
use crate::metadata::MetadataExtractor;
use crate::progress::{NoopObserver, ProgressSnapshot, ProgressTracker, ScanEvent, ScanObserver};
use crate::scanner::{PerceptualAlgorithm, WalkerConfig};
use crate::store::database::SessionCounters;
use crate::store::{Database, FileRecord, SessionStatus, StoreError};
use phases::RunContext;

/// Errors surfaced by [`ScanPipeline::start`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A run is already in progress.
    #[error("a scan is already running")]
    AlreadyRunning,

    /// No root paths were supplied.
    #[error("no paths to scan")]
    NoPathsToScan,

    /// A phase thread panicked.
    #[error("{phase} phase failed: {message}")]
    PhasePanicked {
        /// Name of the phase
        phase: &'static str,
        /// Panic payload, if it was a string
        message: String,
    },

    /// A batch thread pool could not be created.
    #[error("failed to create worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Tunables of a run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Files hashed concurrently per batch
    pub hash_batch_size: usize,
    /// Files extracted concurrently per batch
    pub metadata_batch_size: usize,
    /// Walked files between progress events
    pub walk_progress_interval: u64,
    /// Hashed files between progress events
    pub hash_progress_interval: u64,
    /// Directory pruning rules
    pub walker: WalkerConfig,
    /// Image fingerprint algorithm
    pub perceptual_algorithm: PerceptualAlgorithm,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            hash_batch_size: 10,
            metadata_batch_size: 5,
            walk_progress_interval: 100,
            hash_progress_interval: 10,
            walker: WalkerConfig::default(),
            perceptual_algorithm: PerceptualAlgorithm::default(),
        }
    }
}

impl PipelineSettings {
    fn normalized(mut self) -> Self {
        self.hash_batch_size = self.hash_batch_size.max(1);
        self.metadata_batch_size = self.metadata_batch_size.max(1);
        self.walk_progress_interval = self.walk_progress_interval.max(1);
        self.hash_progress_interval = self.hash_progress_interval.max(1);
        self
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    /// Session recorded for this run
    pub session_id: i64,
    /// Counters at the end of the run
    pub progress: ProgressSnapshot,
    /// Whether the run ended because of [`ScanPipeline::stop`]
    pub stopped: bool,
}

struct RunQueues {
    hash: WorkQueue<FileRecord>,
    metadata: WorkQueue<FileRecord>,
}

/// Owner of the scan state machine.
///
/// Share it as `Arc<ScanPipeline>`: [`start`](Self::start) blocks for the
/// whole run while [`pause`](Self::pause), [`resume`](Self::resume),
/// [`stop`](Self::stop) and [`progress`](Self::progress) are called from other
/// threads.
pub struct ScanPipeline {
    db: Arc<Database>,
    settings: PipelineSettings,
    observer: Arc<dyn ScanObserver>,
    extractor: MetadataExtractor,
    hash_pool: ThreadPool,
    metadata_pool: ThreadPool,
    control: ScanControl,
    tracker: ProgressTracker,
    running: Mutex<bool>,
    queues: Mutex<Option<Arc<RunQueues>>>,
}

impl std::fmt::Debug for ScanPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanPipeline")
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Clears the running flag and the queue handle when a run returns.
struct RunGuard<'a>(&'a ScanPipeline);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.0.queues) = None;
        *lock(&self.0.running) = false;
    }
}

impl ScanPipeline {
    /// Create a pipeline over `db` with its batch worker pools.
    pub fn new(db: Arc<Database>, settings: PipelineSettings) -> Result<Self, PipelineError> {
        let settings = settings.normalized();
        Ok(Self {
            extractor: MetadataExtractor::new(settings.perceptual_algorithm),
            hash_pool: build_pool("hash", settings.hash_batch_size)?,
            metadata_pool: build_pool("metadata", settings.metadata_batch_size)?,
            db,
            settings,
            observer: Arc::new(NoopObserver),
            control: ScanControl::new(),
            tracker: ProgressTracker::new(),
            running: Mutex::new(false),
            queues: Mutex::new(None),
        })
    }

    /// Deliver run events to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run a full scan of `roots` and block until it finishes.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::AlreadyRunning`] if another run is active on this
    ///   pipeline or on any other handle to the same database; that run and
    ///   its session are left untouched.
    /// - [`PipelineError::NoPathsToScan`] if `roots` is empty.
    /// - Any run-fatal failure, after the session has been finalized as
    ///   `error`.
    pub fn start(&self, roots: &[PathBuf]) -> Result<ScanSummary, PipelineError> {
        let queues = {
            let mut running = lock(&self.running);
            if *running {
                return Err(PipelineError::AlreadyRunning);
            }
            if roots.is_empty() {
                return Err(PipelineError::NoPathsToScan);
            }
            self.control.reset();
            self.tracker.reset();
            let queues = Arc::new(RunQueues {
                hash: WorkQueue::new(),
                metadata: WorkQueue::new(),
            });
            *lock(&self.queues) = Some(Arc::clone(&queues));
            *running = true;
            queues
        };
        let _guard = RunGuard(self);

        let _scan_lock = match self.db.try_lock_scan() {
            Ok(scan_lock) => scan_lock,
            Err(StoreError::ScanInProgress(path)) => {
                log::warn!("Another scan holds {}", path.display());
                return Err(PipelineError::AlreadyRunning);
            }
            Err(e) => return Err(e.into()),
        };
        self.db.recover_stale_sessions()?;

        let session = self.db.create_session()?;
        log::info!(
            "Scan session {} started over {} path(s)",
            session.id,
            roots.len()
        );
        self.observer
            .on_event(&ScanEvent::Started(self.tracker.snapshot()));

        match self.run(session.id, roots, &queues) {
            Ok(()) => {
                let (stopped, progress) = self.close_run();
                self.db.finalize_session(
                    session.id,
                    SessionStatus::Completed,
                    counters_of(&progress),
                    None,
                )?;
                log::info!(
                    "Scan session {} {}: {} files scanned, {} hashed, {} duplicate groups",
                    session.id,
                    if stopped { "stopped" } else { "completed" },
                    progress.files_scanned,
                    progress.files_hashed,
                    progress.duplicates_found
                );
                self.observer
                    .on_event(&ScanEvent::Completed(progress.clone()));
                Ok(ScanSummary {
                    session_id: session.id,
                    progress,
                    stopped,
                })
            }
            Err(e) => {
                let message = e.to_string();
                log::error!("Scan session {} failed: {}", session.id, message);
                if let Err(finalize_error) = self.db.finalize_session(
                    session.id,
                    SessionStatus::Error,
                    self.counters(),
                    Some(&message),
                ) {
                    log::error!("Failed to finalize session {}: {}", session.id, finalize_error);
                }
                self.observer.on_event(&ScanEvent::Error(message));
                Err(e)
            }
        }
    }

    fn run(
        &self,
        session_id: i64,
        roots: &[PathBuf],
        queues: &RunQueues,
    ) -> Result<(), PipelineError> {
        let ctx = RunContext {
            db: &self.db,
            control: &self.control,
            tracker: &self.tracker,
            observer: self.observer.as_ref(),
            settings: &self.settings,
            session_id,
            hash_queue: &queues.hash,
            metadata_queue: &queues.metadata,
        };

        let (walked, hashed, extracted) = thread::scope(|scope| {
            let walker = scope.spawn(|| phases::walk(&ctx, roots));
            let hasher = scope.spawn(|| phases::hash(&ctx, &self.hash_pool));
            let extractor =
                scope.spawn(|| phases::extract(&ctx, &self.metadata_pool, &self.extractor));
            (walker.join(), hasher.join(), extractor.join())
        });

        joined("walk", walked)?;
        joined("hash", hashed)?;
        joined("metadata", extracted)?;

        let groups = DuplicateService::new(Arc::clone(&self.db)).count_groups()?;
        self.tracker.set_duplicates_found(groups);
        self.db.update_session_duplicates(session_id, groups)?;
        Ok(())
    }

    /// Hide the run from the control calls and capture its outcome in the
    /// same step, so no stop can be accepted after `stopped` was read.
    fn close_run(&self) -> (bool, ProgressSnapshot) {
        let mut running = lock(&self.running);
        *lock(&self.queues) = None;
        *running = false;
        (self.control.is_stopped(), self.tracker.snapshot())
    }

    fn counters(&self) -> SessionCounters {
        counters_of(&self.tracker.snapshot())
    }

    /// Hold every phase at its next boundary. Returns `false` if no run is
    /// active or it is already paused.
    pub fn pause(&self) -> bool {
        {
            let running = lock(&self.running);
            if !*running || !self.control.pause() {
                return false;
            }
        }
        log::info!("Scan paused");
        self.observer.on_event(&ScanEvent::Paused);
        true
    }

    /// Continue a paused run. Returns `false` if it was not paused.
    pub fn resume(&self) -> bool {
        if !self.control.resume() {
            return false;
        }
        log::info!("Scan resumed");
        self.observer.on_event(&ScanEvent::Resumed);
        true
    }

    /// Cancel the active run, discarding all queued work. Returns `false` if
    /// no run is active.
    pub fn stop(&self) -> bool {
        {
            let running = lock(&self.running);
            if !*running || !self.control.stop() {
                return false;
            }
            if let Some(queues) = lock(&self.queues).as_ref() {
                let discarded = queues.hash.clear_and_close() + queues.metadata.clear_and_close();
                log::debug!("Discarded {discarded} queued items");
            }
        }
        log::info!("Scan stopped");
        self.observer.on_event(&ScanEvent::Stopped);
        true
    }

    /// Whether a run is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *lock(&self.running)
    }

    /// Whether the active run is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.is_running() && self.control.is_paused()
    }

    /// Current counters; safe to call while a run is in flight.
    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    /// The store this pipeline writes to.
    #[must_use]
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn counters_of(progress: &ProgressSnapshot) -> SessionCounters {
    SessionCounters {
        files_scanned: progress.files_scanned,
        files_hashed: progress.files_hashed,
        duplicates_found: progress.duplicates_found,
    }
}

fn build_pool(phase: &'static str, threads: usize) -> Result<ThreadPool, PipelineError> {
    Ok(ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(move |i| format!("dupescan-{phase}-{i}"))
        .build()?)
}

fn joined(phase: &'static str, result: thread::Result<()>) -> Result<(), PipelineError> {
    result.map_err(|payload| PipelineError::PhasePanicked {
        phase,
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
