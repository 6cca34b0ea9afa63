//! Persistent record store for Dupescan.
//!
//! This module keeps every file ever observed, the registered scan roots and
//! the history of scan sessions in a single SQLite database, so that rescans
//! only re-hash files whose size or modification time changed.
//!
//! # Architecture
//!
//! The store is split into two main components:
//!
//! * [`database`]: SQLite persistence, schema management and the query surface
//!   used by the pipeline and the duplicate service.
//! * [`models`]: The records stored in the database.
//! * [`lock`]: The exclusive claim a scan holds on the database while it runs.
//!
//! # Digest Validity
//!
//! A file's digest is trusted only while `digest_valid` is set. The walker
//! clears it whenever the observed size or modification time differs from the
//! stored one; only the hasher sets it again.

pub mod database;
pub mod lock;
pub mod models;

use std::path::PathBuf;

pub use database::{Database, FileQuery};
pub use lock::ScanLock;
pub use models::{
    FileRecord, MediaMetadata, ScanPathRecord, ScanPathStatus, ScanSession, SessionStatus,
};

/// Errors produced by the record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite reported an error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory holding the database file could not be created.
    #[error("failed to create database directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The scan root is already registered.
    #[error("path already exists: {0}")]
    PathAlreadyExists(PathBuf),

    /// Another scan holds the database.
    #[error("a scan is already in progress on {0}")]
    ScanInProgress(PathBuf),

    /// The scan lock file could not be opened or locked.
    #[error("failed to lock {path}: {source}")]
    Lock {
        /// Lock file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The session has already been finalized.
    #[error("scan session {0} was already finalized")]
    SessionAlreadyFinalized(i64),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
