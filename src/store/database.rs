//! SQLite-backed record store.
//!
//! One [`Connection`] is shared by every pipeline phase behind a [`Mutex`]; each
//! call is a single statement (or a short sequence under one lock), so callers
//! never hold the lock across filesystem I/O.
//!
//! Paths are stored as the raw bytes of the OS string on unix, so two names
//! that differ only in non-UTF-8 bytes stay two records. Other platforms store
//! the UTF-8 form.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};

use super::models::{
    FileRecord, MediaMetadata, ScanPathRecord, ScanPathStatus, ScanSession, SessionStatus,
};
use super::lock::{self, ScanLock};
use super::{StoreError, StoreResult};

/// Current schema version stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 2;

/// Version 1 kept paths as text and named the codec column after video only.
const MIGRATE_V1: &str = "ALTER TABLE files RENAME COLUMN video_codec TO codec;
     UPDATE files SET path = CAST(path AS BLOB);
     UPDATE scan_paths SET path = CAST(path AS BLOB);";

const FILE_COLUMNS: &str = "id, path, name, extension, size, created_at, modified_at, digest, \
     digest_valid, mime_category, is_deleted, last_observed, taken_at, latitude, longitude, \
     camera_model, width, height, duration_secs, codec, title, artist, album, \
     album_artist, genre, year, track_number, bitrate_kbps, audio_format, perceptual_hash";

const SCAN_PATH_COLUMNS: &str = "id, path, is_active, is_recursive, last_scan_started, \
     last_scan_completed, status, files_found, folders_found";

const SESSION_COLUMNS: &str = "id, started_at, ended_at, status, files_scanned, files_hashed, \
     duplicates_found, current_path, error_message";

/// Predicate for file queries.
///
/// Path-prefix filtering is applied by callers on the returned records because
/// it matches whole path components.
#[derive(Debug, Clone, Default)]
pub struct FileQuery {
    /// Include soft-deleted records
    pub include_deleted: bool,
    /// Only records whose digest is present and valid
    pub valid_digest_only: bool,
    /// Extension allow-list (lowercase, no leading dot); empty means any
    pub extensions: Vec<String>,
    /// Minimum size in bytes (inclusive)
    pub min_size: Option<u64>,
    /// Maximum size in bytes (inclusive)
    pub max_size: Option<u64>,
}

impl FileQuery {
    /// Non-deleted records with a valid digest.
    #[must_use]
    pub fn hashed() -> Self {
        Self {
            valid_digest_only: true,
            ..Self::default()
        }
    }

    fn where_clause(&self) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if !self.include_deleted {
            clauses.push("is_deleted = 0".to_string());
        }
        if self.valid_digest_only {
            clauses.push("digest IS NOT NULL AND digest_valid = 1".to_string());
        }
        if !self.extensions.is_empty() {
            let placeholders = vec!["?"; self.extensions.len()].join(", ");
            clauses.push(format!("extension IN ({placeholders})"));
            for ext in &self.extensions {
                params.push(Box::new(ext.clone()));
            }
        }
        if let Some(min) = self.min_size {
            clauses.push("size >= ?".to_string());
            params.push(Box::new(to_i64(min)));
        }
        if let Some(max) = self.max_size {
            clauses.push("size <= ?".to_string());
            params.push(Box::new(to_i64(max)));
        }

        if clauses.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), params)
        }
    }
}

/// Persistent store for file, scan path and session records.
pub struct Database {
    conn: Mutex<Connection>,
    /// Backing file; `None` for in-memory stores
    path: Option<PathBuf>,
    scan_claimed: AtomicBool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Opens or creates the database at the specified path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        log::debug!("Opened record store at {}", path.display());
        Self::initialize(conn, Some(path.to_path_buf()))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::initialize(Connection::open_in_memory()?, None)
    }

    fn initialize(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        conn.execute_batch(include_str!("schema.sql"))?;
        if version == 1 {
            conn.execute_batch(MIGRATE_V1)?;
            log::info!("Migrated record store schema from version 1");
        }
        if version < SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            log::debug!("Record store schema initialized (version {SCHEMA_VERSION})");
        }
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            scan_claimed: AtomicBool::new(false),
        })
    }

    /// Claim the store for one scan.
    ///
    /// The claim is exclusive across every [`Database`] handle on the same
    /// file, in this process or another, and lasts until the returned guard
    /// is dropped.
    ///
    /// # Errors
    ///
    /// [`StoreError::ScanInProgress`] if another scan holds the claim, or
    /// [`StoreError::Lock`] if the lock file cannot be used.
    pub fn try_lock_scan(&self) -> StoreResult<ScanLock<'_>> {
        lock::try_claim(&self.scan_claimed, self.path.as_deref())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Files ────────────────────────────────────────────────────

    /// Look up a file record by its unique path.
    pub fn find_file_by_path(&self, path: &Path) -> StoreResult<Option<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE path = ?1");
        Ok(self
            .conn()
            .query_row(&sql, params![path_bytes(path)], file_from_row)
            .optional()?)
    }

    /// Look up a file record by id.
    pub fn get_file(&self, id: i64) -> StoreResult<Option<FileRecord>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1");
        Ok(self
            .conn()
            .query_row(&sql, params![id], file_from_row)
            .optional()?)
    }

    /// Insert a new file record and return it with its assigned id.
    pub fn create_file(&self, record: &FileRecord) -> StoreResult<FileRecord> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO files (path, name, extension, size, created_at, modified_at, digest, \
             digest_valid, mime_category, is_deleted, last_observed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                path_bytes(&record.path),
                record.name,
                record.extension,
                to_i64(record.size),
                record.created_at,
                record.modified_at,
                record.digest,
                record.digest_valid,
                record.mime_category,
                record.is_deleted,
                record.last_observed,
            ],
        )?;
        let mut created = record.clone();
        created.id = conn.last_insert_rowid();
        if !created.media.is_empty() {
            write_media(&conn, created.id, &created.media)?;
        }
        Ok(created)
    }

    /// Upsert a file record by primary key.
    ///
    /// Media columns are left alone; they belong to [`Database::set_media`].
    pub fn save_file(&self, record: &FileRecord) -> StoreResult<FileRecord> {
        if record.id == 0 {
            return self.create_file(record);
        }
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE files SET path = ?1, name = ?2, extension = ?3, size = ?4, created_at = ?5, \
             modified_at = ?6, digest = ?7, digest_valid = ?8, mime_category = ?9, \
             is_deleted = ?10, last_observed = ?11 WHERE id = ?12",
            params![
                path_bytes(&record.path),
                record.name,
                record.extension,
                to_i64(record.size),
                record.created_at,
                record.modified_at,
                record.digest,
                record.digest_valid,
                record.mime_category,
                record.is_deleted,
                record.last_observed,
                record.id,
            ],
        )?;
        drop(conn);
        if changed == 0 {
            let mut fresh = record.clone();
            fresh.id = 0;
            return self.create_file(&fresh);
        }
        Ok(record.clone())
    }

    /// Store a freshly computed digest and mark it valid.
    pub fn set_digest(&self, id: i64, digest: &str) -> StoreResult<()> {
        self.conn().execute(
            "UPDATE files SET digest = ?1, digest_valid = 1 WHERE id = ?2",
            params![digest, id],
        )?;
        Ok(())
    }

    /// Overwrite the media columns of a file.
    pub fn set_media(&self, id: i64, media: &MediaMetadata) -> StoreResult<()> {
        write_media(&self.conn(), id, media)
    }

    /// Soft-delete a file record.
    pub fn mark_deleted(&self, id: i64) -> StoreResult<()> {
        self.conn()
            .execute("UPDATE files SET is_deleted = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// All file records matching the predicate, ordered by id.
    pub fn query_files(&self, query: &FileQuery) -> StoreResult<Vec<FileRecord>> {
        let (where_clause, params) = query.where_clause();
        let sql = format!("SELECT {FILE_COLUMNS} FROM files{where_clause} ORDER BY id");
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), file_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Number of file records matching the predicate.
    pub fn count_files(&self, query: &FileQuery) -> StoreResult<u64> {
        let (where_clause, params) = query.where_clause();
        let sql = format!("SELECT COUNT(*) FROM files{where_clause}");
        let count: i64 =
            self.conn()
                .query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
        Ok(to_u64(count))
    }

    /// Digests shared by more than one live, validly hashed record.
    pub fn duplicate_digests(&self) -> StoreResult<Vec<(String, u64)>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT digest, COUNT(*) FROM files \
             WHERE digest IS NOT NULL AND digest_valid = 1 AND is_deleted = 0 \
             GROUP BY digest HAVING COUNT(*) > 1 ORDER BY digest",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, to_u64(row.get::<_, i64>(1)?)))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Scan paths ───────────────────────────────────────────────

    /// Register a new active, recursive scan root.
    pub fn add_scan_path(&self, path: &Path) -> StoreResult<ScanPathRecord> {
        if self.find_scan_path(path)?.is_some() {
            return Err(StoreError::PathAlreadyExists(path.to_path_buf()));
        }
        let conn = self.conn();
        conn.execute(
            "INSERT INTO scan_paths (path, is_active, is_recursive, status) \
             VALUES (?1, 1, 1, ?2)",
            params![path_bytes(path), ScanPathStatus::Idle],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {SCAN_PATH_COLUMNS} FROM scan_paths WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], scan_path_from_row)?)
    }

    /// Registered scan roots, optionally only the active ones.
    pub fn list_scan_paths(&self, active_only: bool) -> StoreResult<Vec<ScanPathRecord>> {
        let filter = if active_only { " WHERE is_active = 1" } else { "" };
        let sql = format!("SELECT {SCAN_PATH_COLUMNS} FROM scan_paths{filter} ORDER BY id");
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], scan_path_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Look up a scan root by path.
    pub fn find_scan_path(&self, path: &Path) -> StoreResult<Option<ScanPathRecord>> {
        let sql = format!("SELECT {SCAN_PATH_COLUMNS} FROM scan_paths WHERE path = ?1");
        Ok(self
            .conn()
            .query_row(&sql, params![path_bytes(path)], scan_path_from_row)
            .optional()?)
    }

    /// Delete a scan root; returns whether a row was removed.
    pub fn remove_scan_path(&self, id: i64) -> StoreResult<bool> {
        let changed = self
            .conn()
            .execute("DELETE FROM scan_paths WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Record that a walk of this root has begun.
    pub fn mark_scan_path_started(&self, id: i64, at: DateTime<Utc>) -> StoreResult<()> {
        self.conn().execute(
            "UPDATE scan_paths SET status = ?1, last_scan_started = ?2 WHERE id = ?3",
            params![ScanPathStatus::Scanning, at, id],
        )?;
        Ok(())
    }

    /// Record a finished walk of this root with its counts.
    pub fn complete_scan_path(
        &self,
        id: i64,
        files_found: u64,
        folders_found: u64,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.conn().execute(
            "UPDATE scan_paths SET status = ?1, last_scan_completed = ?2, files_found = ?3, \
             folders_found = ?4 WHERE id = ?5",
            params![
                ScanPathStatus::Completed,
                at,
                to_i64(files_found),
                to_i64(folders_found),
                id
            ],
        )?;
        Ok(())
    }

    /// Set the status of a scan root.
    pub fn set_scan_path_status(&self, id: i64, status: ScanPathStatus) -> StoreResult<()> {
        self.conn().execute(
            "UPDATE scan_paths SET status = ?1 WHERE id = ?2",
            params![status, id],
        )?;
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────

    /// Create a new running session.
    pub fn create_session(&self) -> StoreResult<ScanSession> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO scan_sessions (started_at, status) VALUES (?1, ?2)",
            params![Utc::now(), SessionStatus::Running],
        )?;
        let id = conn.last_insert_rowid();
        let sql = format!("SELECT {SESSION_COLUMNS} FROM scan_sessions WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], session_from_row)?)
    }

    /// Look up a session by id.
    pub fn get_session(&self, id: i64) -> StoreResult<Option<ScanSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM scan_sessions WHERE id = ?1");
        Ok(self
            .conn()
            .query_row(&sql, params![id], session_from_row)
            .optional()?)
    }

    /// The most recently created session.
    pub fn latest_session(&self) -> StoreResult<Option<ScanSession>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM scan_sessions ORDER BY id DESC LIMIT 1");
        Ok(self.conn().query_row(&sql, [], session_from_row).optional()?)
    }

    /// Number of sessions currently marked running.
    pub fn running_session_count(&self) -> StoreResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM scan_sessions WHERE status = ?1",
            params![SessionStatus::Running],
            |row| row.get(0),
        )?;
        Ok(to_u64(count))
    }

    /// Persist walk counters of a running session.
    pub fn update_session_walk(
        &self,
        id: i64,
        files_scanned: u64,
        current_path: &str,
    ) -> StoreResult<()> {
        self.conn().execute(
            "UPDATE scan_sessions SET files_scanned = ?1, current_path = ?2 \
             WHERE id = ?3 AND status = ?4",
            params![
                to_i64(files_scanned),
                current_path,
                id,
                SessionStatus::Running
            ],
        )?;
        Ok(())
    }

    /// Persist the hashed counter of a running session.
    pub fn update_session_hashed(&self, id: i64, files_hashed: u64) -> StoreResult<()> {
        self.conn().execute(
            "UPDATE scan_sessions SET files_hashed = ?1 WHERE id = ?2 AND status = ?3",
            params![to_i64(files_hashed), id, SessionStatus::Running],
        )?;
        Ok(())
    }

    /// Persist the duplicate group count of a running session.
    pub fn update_session_duplicates(&self, id: i64, duplicates_found: u64) -> StoreResult<()> {
        self.conn().execute(
            "UPDATE scan_sessions SET duplicates_found = ?1 WHERE id = ?2 AND status = ?3",
            params![to_i64(duplicates_found), id, SessionStatus::Running],
        )?;
        Ok(())
    }

    /// Move a running session to its terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SessionAlreadyFinalized`] if the session is no
    /// longer running; a session is finalized exactly once.
    pub fn finalize_session(
        &self,
        id: i64,
        status: SessionStatus,
        counters: SessionCounters,
        error_message: Option<&str>,
    ) -> StoreResult<ScanSession> {
        debug_assert!(status.is_terminal());
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE scan_sessions SET status = ?1, ended_at = ?2, files_scanned = ?3, \
             files_hashed = ?4, duplicates_found = ?5, error_message = ?6 \
             WHERE id = ?7 AND status = ?8",
            params![
                status,
                Utc::now(),
                to_i64(counters.files_scanned),
                to_i64(counters.files_hashed),
                to_i64(counters.duplicates_found),
                error_message,
                id,
                SessionStatus::Running
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::SessionAlreadyFinalized(id));
        }
        let sql = format!("SELECT {SESSION_COLUMNS} FROM scan_sessions WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], session_from_row)?)
    }

    /// Finalize sessions left running by a previous process as errors.
    ///
    /// Only call this while holding [`Database::try_lock_scan`]; otherwise a
    /// live scan's session is indistinguishable from an abandoned one.
    pub fn recover_stale_sessions(&self) -> StoreResult<usize> {
        let changed = self.conn().execute(
            "UPDATE scan_sessions SET status = ?1, ended_at = ?2, \
             error_message = 'interrupted by process exit' WHERE status = ?3",
            params![SessionStatus::Error, Utc::now(), SessionStatus::Running],
        )?;
        if changed > 0 {
            log::warn!("Recovered {changed} stale running scan session(s)");
        }
        Ok(changed)
    }
}

/// Counters written when a session is finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub files_scanned: u64,
    pub files_hashed: u64,
    pub duplicates_found: u64,
}

fn write_media(conn: &Connection, id: i64, media: &MediaMetadata) -> StoreResult<()> {
    conn.execute(
        "UPDATE files SET taken_at = ?1, latitude = ?2, longitude = ?3, camera_model = ?4, \
         width = ?5, height = ?6, duration_secs = ?7, codec = ?8, title = ?9, \
         artist = ?10, album = ?11, album_artist = ?12, genre = ?13, year = ?14, \
         track_number = ?15, bitrate_kbps = ?16, audio_format = ?17, perceptual_hash = ?18 \
         WHERE id = ?19",
        params![
            media.taken_at,
            media.latitude,
            media.longitude,
            media.camera_model,
            media.width,
            media.height,
            media.duration_secs.map(to_i64),
            media.codec,
            media.title,
            media.artist,
            media.album,
            media.album_artist,
            media.genre,
            media.year,
            media.track_number,
            media.bitrate_kbps,
            media.audio_format,
            media.perceptual_hash,
            id,
        ],
    )?;
    Ok(())
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: path_from_row(row, 1)?,
        name: row.get(2)?,
        extension: row.get(3)?,
        size: to_u64(row.get(4)?),
        created_at: row.get(5)?,
        modified_at: row.get(6)?,
        digest: row.get(7)?,
        digest_valid: row.get(8)?,
        mime_category: row.get(9)?,
        is_deleted: row.get(10)?,
        last_observed: row.get(11)?,
        media: MediaMetadata {
            taken_at: row.get(12)?,
            latitude: row.get(13)?,
            longitude: row.get(14)?,
            camera_model: row.get(15)?,
            width: row.get(16)?,
            height: row.get(17)?,
            duration_secs: row.get::<_, Option<i64>>(18)?.map(to_u64),
            codec: row.get(19)?,
            title: row.get(20)?,
            artist: row.get(21)?,
            album: row.get(22)?,
            album_artist: row.get(23)?,
            genre: row.get(24)?,
            year: row.get(25)?,
            track_number: row.get(26)?,
            bitrate_kbps: row.get(27)?,
            audio_format: row.get(28)?,
            perceptual_hash: row.get(29)?,
        },
    })
}

fn scan_path_from_row(row: &Row<'_>) -> rusqlite::Result<ScanPathRecord> {
    Ok(ScanPathRecord {
        id: row.get(0)?,
        path: path_from_row(row, 1)?,
        is_active: row.get(2)?,
        is_recursive: row.get(3)?,
        last_scan_started: row.get(4)?,
        last_scan_completed: row.get(5)?,
        status: row.get(6)?,
        files_found: to_u64(row.get(7)?),
        folders_found: to_u64(row.get(8)?),
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<ScanSession> {
    Ok(ScanSession {
        id: row.get(0)?,
        started_at: row.get(1)?,
        ended_at: row.get(2)?,
        status: row.get(3)?,
        files_scanned: to_u64(row.get(4)?),
        files_hashed: to_u64(row.get(5)?),
        duplicates_found: to_u64(row.get(6)?),
        current_path: row.get(7)?,
        error_message: row.get(8)?,
    })
}

#[cfg(unix)]
fn path_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

fn path_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<PathBuf> {
    match row.get_ref(idx)? {
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Ok(path_from_bytes(bytes.to_vec())),
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "path".to_string(),
            other.data_type(),
        )),
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
