//! Exclusive scan ownership of a database.
//!
//! Only one scan may write session state to a database at a time, whether the
//! competitor lives in this process or another one. A file database is
//! claimed with an advisory lock on a sidecar `<db>.lock` file, which the OS
//! releases when the holder exits, so a crashed scan never leaves the claim
//! behind. An in-memory database cannot be shared across processes and is
//! claimed with a flag on the [`Database`](super::Database) alone.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use fs2::FileExt;

use super::{StoreError, StoreResult};

/// Held for the duration of a scan; dropping it releases the claim.
#[derive(Debug)]
pub struct ScanLock<'a> {
    _file: Option<File>,
    claimed: &'a AtomicBool,
}

impl Drop for ScanLock<'_> {
    fn drop(&mut self) {
        self.claimed.store(false, Ordering::Release);
    }
}

/// Sidecar lock path for a database file.
///
/// `/data/dupescan.db` becomes `/data/dupescan.db.lock`.
pub fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut lock_path = db_path.to_path_buf();
    match lock_path.extension() {
        Some(ext) => {
            let ext = format!("{}.lock", ext.to_string_lossy());
            lock_path.set_extension(ext);
        }
        None => {
            lock_path.set_extension("lock");
        }
    }
    lock_path
}

/// Claim `claimed`, then the advisory lock on `db_path`'s sidecar if there is
/// one. Fails with [`StoreError::ScanInProgress`] without blocking.
pub(super) fn try_claim<'a>(
    claimed: &'a AtomicBool,
    db_path: Option<&Path>,
) -> StoreResult<ScanLock<'a>> {
    let label = db_path.map_or_else(|| PathBuf::from(":memory:"), Path::to_path_buf);
    if claimed
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return Err(StoreError::ScanInProgress(label));
    }
    // From here on the guard owns the flag, so every early return releases it
    let mut guard = ScanLock {
        _file: None,
        claimed,
    };
    let Some(db_path) = db_path else {
        return Ok(guard);
    };

    let lock_path = lock_path_for(db_path);
    let lock_err = |source| StoreError::Lock {
        path: lock_path.clone(),
        source,
    };
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(lock_err)?;

    // Qualified call: newer std has inherent File locking methods
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => {}
        Err(e) if is_contended(&e) => {
            log::debug!("Scan lock {} is held elsewhere", lock_path.display());
            return Err(StoreError::ScanInProgress(label));
        }
        Err(e) => return Err(lock_err(e)),
    }

    // Owner pid for whoever inspects a stuck lock; the lock itself is what counts
    if let Err(e) = file
        .set_len(0)
        .and_then(|()| write!(file, "{}", std::process::id()))
    {
        log::debug!("Failed to record owner in {}: {}", lock_path.display(), e);
    }
    log::debug!("Acquired scan lock {}", lock_path.display());
    guard._file = Some(file);
    Ok(guard)
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
