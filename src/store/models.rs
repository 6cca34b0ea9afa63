//! Records persisted by the store.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::scanner::FileCategory;

/// One row per distinct absolute path ever observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Primary key (0 until the record is created in the store)
    pub id: i64,
    /// Absolute path, unique across the store
    pub path: PathBuf,
    /// File name component
    pub name: String,
    /// Lowercase extension without the leading dot
    pub extension: Option<String>,
    /// Size in bytes as reported by the filesystem at last observation
    pub size: u64,
    /// Creation time (falls back to modification time where unsupported)
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub modified_at: DateTime<Utc>,
    /// Hex-encoded BLAKE3 digest of the full content
    pub digest: Option<String>,
    /// Whether `digest` reflects the current on-disk content
    pub digest_valid: bool,
    /// Coarse category label derived from the extension
    pub mime_category: Option<String>,
    /// Soft-deleted records stay for audit but are excluded from grouping
    pub is_deleted: bool,
    /// When the walker last saw this path
    pub last_observed: DateTime<Utc>,
    /// Media attributes filled in by the metadata extractor
    #[serde(default)]
    pub media: MediaMetadata,
}

impl FileRecord {
    /// Build a fresh, not yet persisted record from filesystem metadata.
    #[must_use]
    pub fn observed(path: &Path, metadata: &Metadata) -> Self {
        let modified_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH));
        let created_at = metadata
            .created()
            .map(DateTime::<Utc>::from)
            .unwrap_or(modified_at);
        let extension = extension_of(path);
        let mime_category = extension
            .as_deref()
            .map(|ext| FileCategory::from_extension(ext).as_str().to_string());

        Self {
            id: 0,
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension,
            size: metadata.len(),
            created_at,
            modified_at,
            digest: None,
            digest_valid: false,
            mime_category,
            is_deleted: false,
            last_observed: Utc::now(),
            media: MediaMetadata::default(),
        }
    }

    /// Whether the size and modification time match a fresh observation.
    #[must_use]
    pub fn is_unchanged(&self, size: u64, modified_at: DateTime<Utc>) -> bool {
        self.size == size && self.modified_at == modified_at
    }
}

/// Lowercase extension of a path without the leading dot.
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
}

/// Optional media attributes of a file.
///
/// Every field is independent: extraction fills in what it can and leaves the
/// rest untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    /// Capture time (EXIF original capture preferred over container create)
    pub taken_at: Option<NaiveDateTime>,
    /// GPS latitude in decimal degrees
    pub latitude: Option<f64>,
    /// GPS longitude in decimal degrees
    pub longitude: Option<f64>,
    /// Camera make and model
    pub camera_model: Option<String>,
    /// Pixel width
    pub width: Option<u32>,
    /// Pixel height
    pub height: Option<u32>,
    /// Duration in whole seconds
    pub duration_secs: Option<u64>,
    /// Codec reported by the container parser for a video file.
    ///
    /// The MP4 reader only describes audio sample entries, so for MP4, M4V and
    /// MOV files this is the codec of the first audio track (`aac`, `alac`,
    /// ...), not of the picture stream. `None` when the container has no audio
    /// track the parser recognizes or is a format without a parser.
    pub codec: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    /// Genres joined with ", "
    pub genre: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    /// Audio bitrate in kbps
    pub bitrate_kbps: Option<u32>,
    /// Audio format / codec identifier
    pub audio_format: Option<String>,
    /// Base64 perceptual fingerprint (images only)
    pub perceptual_hash: Option<String>,
}

impl MediaMetadata {
    /// Overlay every populated field of `other` onto `self`.
    pub fn merge(&mut self, other: MediaMetadata) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            taken_at,
            latitude,
            longitude,
            camera_model,
            width,
            height,
            duration_secs,
            codec,
            title,
            artist,
            album,
            album_artist,
            genre,
            year,
            track_number,
            bitrate_kbps,
            audio_format,
            perceptual_hash,
        );
    }

    /// True when no attribute is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Scan state of a registered root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPathStatus {
    #[default]
    Idle,
    Scanning,
    Completed,
    Error,
}

impl ScanPathStatus {
    /// Stored representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ScanPathStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for ScanPathStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ScanPathStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "idle" => Ok(Self::Idle),
            "scanning" => Ok(Self::Scanning),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            other => Err(FromSqlError::Other(
                format!("unknown scan path status '{other}'").into(),
            )),
        }
    }
}

/// One row per root directory registered for scanning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPathRecord {
    pub id: i64,
    pub path: PathBuf,
    pub is_active: bool,
    pub is_recursive: bool,
    pub last_scan_started: Option<DateTime<Utc>>,
    pub last_scan_completed: Option<DateTime<Utc>>,
    pub status: ScanPathStatus,
    pub files_found: u64,
    pub folders_found: u64,
}

/// Stored status of a scan session.
///
/// `Paused` is only ever reported, a session row moves from `Running` to
/// exactly one of `Completed` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Completed,
    Paused,
    Error,
}

impl SessionStatus {
    /// Stored representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Error => "error",
        }
    }

    /// Whether the session has been finalized.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for SessionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SessionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "paused" => Ok(Self::Paused),
            "error" => Ok(Self::Error),
            other => Err(FromSqlError::Other(
                format!("unknown session status '{other}'").into(),
            )),
        }
    }
}

/// One row per invocation of the scan pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSession {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub files_scanned: u64,
    pub files_hashed: u64,
    pub duplicates_found: u64,
    pub current_path: Option<String>,
    pub error_message: Option<String>,
}
