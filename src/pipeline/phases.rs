//! The three concurrent phases of a scan run.
//!
//! Each function runs on its own thread for the lifetime of a run. The walker
//! is the only producer; it closes both queues when it returns, which is what
//! lets the consumers terminate.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPool;

use super::control::ScanControl;
use super::queue::WorkQueue;
use super::PipelineSettings;
use crate::metadata::MetadataExtractor;
use crate::progress::{ProgressTracker, ScanEvent, ScanObserver};
use crate::scanner::walker::WalkEntry;
use crate::scanner::{HashError, Hasher, WalkStats, Walker};
use crate::store::{Database, FileRecord, ScanPathStatus, StoreResult};

/// Shared state of one run, borrowed by every phase thread.
pub(crate) struct RunContext<'a> {
    pub db: &'a Database,
    pub control: &'a ScanControl,
    pub tracker: &'a ProgressTracker,
    pub observer: &'a dyn ScanObserver,
    pub settings: &'a PipelineSettings,
    pub session_id: i64,
    pub hash_queue: &'a WorkQueue<FileRecord>,
    pub metadata_queue: &'a WorkQueue<FileRecord>,
}

impl RunContext<'_> {
    fn emit_progress(&self) {
        self.observer
            .on_event(&ScanEvent::Progress(self.tracker.snapshot()));
    }

    fn enqueue(&self, record: FileRecord) {
        if MetadataExtractor::is_media_file(&record.path) {
            self.metadata_queue.push(record.clone());
        }
        self.hash_queue.push(record);
    }
}

/// Closes both queues when the walker exits, including by panic.
struct CloseQueues<'a, 'b>(&'a RunContext<'b>);

impl Drop for CloseQueues<'_, '_> {
    fn drop(&mut self) {
        self.0.hash_queue.close();
        self.0.metadata_queue.close();
    }
}

/// Walk every root in order, recording changes and feeding the queues.
pub(crate) fn walk(ctx: &RunContext<'_>, roots: &[PathBuf]) {
    let _close = CloseQueues(ctx);

    for root in roots {
        if ctx.control.is_stopped() {
            break;
        }

        ctx.tracker.set_current_path(root.display().to_string());
        ctx.emit_progress();

        let scan_path_id = match ctx.db.find_scan_path(root) {
            Ok(record) => record.map(|r| r.id),
            Err(e) => {
                log::warn!("Cannot load scan path {}: {}", root.display(), e);
                None
            }
        };
        if let Some(id) = scan_path_id {
            log_store_error(ctx.db.mark_scan_path_started(id, Utc::now()));
        }

        if !root.is_dir() {
            log::warn!("Scan root is missing or not a directory: {}", root.display());
            if let Some(id) = scan_path_id {
                log_store_error(ctx.db.set_scan_path_status(id, ScanPathStatus::Error));
            }
            continue;
        }

        log::info!("Walking {}", root.display());
        match walk_root(ctx, root) {
            Some(stats) => {
                log::debug!(
                    "Finished {}: {} files, {} folders",
                    root.display(),
                    stats.files,
                    stats.folders
                );
                if let Some(id) = scan_path_id {
                    log_store_error(ctx.db.complete_scan_path(
                        id,
                        stats.files,
                        stats.folders,
                        Utc::now(),
                    ));
                }
            }
            None => {
                if let Some(id) = scan_path_id {
                    log_store_error(ctx.db.set_scan_path_status(id, ScanPathStatus::Idle));
                }
                break;
            }
        }
    }

    log::debug!(
        "Walk complete: {} files scanned",
        ctx.tracker.files_scanned()
    );
}

/// Walk one root; `None` means the run was stopped part way.
fn walk_root(ctx: &RunContext<'_>, root: &Path) -> Option<WalkStats> {
    let walker = Walker::new(root, ctx.settings.walker.clone());
    let mut stats = WalkStats::default();

    for entry in walker.walk() {
        if !ctx.control.wait_while_paused() {
            log::debug!("Walker: stop requested, abandoning {}", root.display());
            return None;
        }

        match entry {
            Ok(WalkEntry::Directory(_)) => {
                stats.folders += 1;
                ctx.tracker.add_folder_scanned();
            }
            Ok(WalkEntry::File { path, metadata }) => {
                if let Err(e) = observe_file(ctx, &path, &metadata) {
                    log::warn!("Failed to record {}: {}", path.display(), e);
                }
                stats.files += 1;
                let scanned = ctx.tracker.add_file_scanned();
                let current = path.display().to_string();
                ctx.tracker.set_current_path(current.clone());

                if scanned % ctx.settings.walk_progress_interval == 0 {
                    ctx.emit_progress();
                    log_store_error(ctx.db.update_session_walk(
                        ctx.session_id,
                        scanned,
                        &current,
                    ));
                }
            }
            // Already logged by the walker; the directory counts as empty
            Err(_) => {}
        }
    }

    Some(stats)
}

/// Compare a discovered file with its stored record and enqueue it if needed.
fn observe_file(
    ctx: &RunContext<'_>,
    path: &Path,
    metadata: &std::fs::Metadata,
) -> StoreResult<()> {
    let observed = FileRecord::observed(path, metadata);

    match ctx.db.find_file_by_path(path)? {
        None => {
            log::trace!("New file: {}", path.display());
            let created = ctx.db.create_file(&observed)?;
            ctx.enqueue(created);
        }
        Some(existing) if existing.is_unchanged(observed.size, observed.modified_at) => {
            // A previous run stopped before hashing it
            if !existing.digest_valid && !existing.is_deleted {
                log::trace!("Unchanged but never hashed: {}", path.display());
                ctx.enqueue(existing);
            }
        }
        Some(mut existing) => {
            log::trace!("Changed file: {}", path.display());
            existing.size = observed.size;
            existing.modified_at = observed.modified_at;
            existing.digest = None;
            existing.digest_valid = false;
            existing.is_deleted = false;
            existing.last_observed = observed.last_observed;
            let saved = ctx.db.save_file(&existing)?;
            ctx.enqueue(saved);
        }
    }
    Ok(())
}

/// Drain the hash queue in batches until it is closed and empty.
pub(crate) fn hash(ctx: &RunContext<'_>, pool: &ThreadPool) {
    let hasher = Hasher::new();
    let batch_size = ctx.settings.hash_batch_size;

    while let Some(batch) = ctx.hash_queue.next_batch(batch_size) {
        if !ctx.control.wait_while_paused() {
            log::debug!("Hasher: stop requested, dropping {} files", batch.len());
            break;
        }

        let results: Vec<(FileRecord, Result<String, HashError>)> = pool.install(|| {
            batch
                .into_par_iter()
                .map(|record| {
                    let digest = hasher.full_hash_hex(&record.path);
                    (record, digest)
                })
                .collect()
        });

        for (record, result) in results {
            match result {
                Ok(digest) => {
                    if let Err(e) = ctx.db.set_digest(record.id, &digest) {
                        log::warn!("Failed to store digest of {}: {}", record.path.display(), e);
                        continue;
                    }
                    let hashed = ctx.tracker.add_file_hashed();
                    if hashed % ctx.settings.hash_progress_interval == 0 {
                        ctx.emit_progress();
                        log_store_error(ctx.db.update_session_hashed(ctx.session_id, hashed));
                    }
                }
                Err(HashError::NotFound(path)) => {
                    log::debug!("File vanished before hashing: {}", path.display());
                }
                Err(e) => log::warn!("Hash failed: {e}"),
            }
        }
    }

    log::debug!("Hasher finished: {} files hashed", ctx.tracker.files_hashed());
}

/// Drain the metadata queue in batches until it is closed and empty.
pub(crate) fn extract(ctx: &RunContext<'_>, pool: &ThreadPool, extractor: &MetadataExtractor) {
    let batch_size = ctx.settings.metadata_batch_size;
    let mut extracted = 0u64;

    while let Some(batch) = ctx.metadata_queue.next_batch(batch_size) {
        if !ctx.control.wait_while_paused() {
            log::debug!("Extractor: stop requested, dropping {} files", batch.len());
            break;
        }

        let results: Vec<_> = pool.install(|| {
            batch
                .into_par_iter()
                .map(|record| {
                    let partial = extractor.extract(&record.path);
                    (record, partial)
                })
                .collect()
        });

        for (record, partial) in results {
            if partial.is_empty() {
                continue;
            }
            let mut media = record.media;
            media.merge(partial);
            match ctx.db.set_media(record.id, &media) {
                Ok(()) => extracted += 1,
                Err(e) => log::warn!("Failed to store metadata of {}: {}", record.path.display(), e),
            }
        }
    }

    log::debug!("Extractor finished: {extracted} files updated");
}

fn log_store_error(result: StoreResult<()>) {
    if let Err(e) = result {
        log::warn!("Failed to update scan state: {e}");
    }
}
