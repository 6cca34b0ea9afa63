//! JSON output for duplicate listings.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "digest": "af1349b9...",
//!       "size": 1024,
//!       "wasted_space": 2048,
//!       "files": [
//!         { "id": 1, "path": "/data/a.jpg", "created_at": "2024-05-01T10:00:00Z" }
//!       ]
//!     }
//!   ],
//!   "summary": { "groups": 1, "duplicate_files": 2, "wasted_space": 2048 }
//! }
//! ```
//!
//! Other results (scan summaries, statistics, removal reports) are serialized
//! directly with [`write_json`].

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::duplicates::DuplicateGroup;

/// One member of a group.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFile {
    pub id: i64,
    pub path: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// One duplicate group.
#[derive(Debug, Clone, Serialize)]
pub struct JsonGroup {
    pub digest: String,
    /// Size of one member in bytes
    pub size: u64,
    pub wasted_space: u64,
    pub files: Vec<JsonFile>,
}

impl From<&DuplicateGroup> for JsonGroup {
    fn from(group: &DuplicateGroup) -> Self {
        Self {
            digest: group.digest.clone(),
            size: group.total_size(),
            wasted_space: group.wasted_space(),
            files: group
                .files
                .iter()
                .map(|f| JsonFile {
                    id: f.id,
                    path: f.path.to_string_lossy().into_owned(),
                    created_at: f.created_at,
                    modified_at: f.modified_at,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JsonSummary {
    pub groups: usize,
    pub duplicate_files: usize,
    pub wasted_space: u64,
}

/// Complete JSON document for a duplicate listing.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    pub groups: Vec<JsonGroup>,
    pub summary: JsonSummary,
}

impl JsonOutput {
    #[must_use]
    pub fn new(groups: &[DuplicateGroup]) -> Self {
        let summary = JsonSummary {
            groups: groups.len(),
            duplicate_files: groups.iter().map(DuplicateGroup::duplicate_count).sum(),
            wasted_space: groups.iter().map(DuplicateGroup::wasted_space).sum(),
        };
        Self {
            groups: groups.iter().map(JsonGroup::from).collect(),
            summary,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Write any serializable value as pretty JSON followed by a newline.
pub fn write_json<T: Serialize + ?Sized>(writer: &mut impl Write, value: &T) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}
