//! Duplicate groups and their ordering.
//!
//! # Overview
//!
//! Groups are derived from stored records on every query and never cached:
//! records sharing a content digest form a group once there are at least two
//! of them.
//!
//! # Example
//!
//! ```
//! use dupescan::duplicates::{group_by_digest, sort_groups, SortBy};
//! # use dupescan::store::FileRecord;
//! # fn records() -> Vec<FileRecord> { Vec::new() }
//!
//! let mut groups = group_by_digest(records());
//! sort_groups(&mut groups, SortBy::WastedSpace);
//! for group in &groups {
//!     println!("{}: {} bytes wasted", group.digest, group.wasted_space());
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::store::FileRecord;

/// Files sharing one content digest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    /// Hex content digest shared by every member
    pub digest: String,
    /// Members ordered by record id
    pub files: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Size of one member.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.first().map_or(0, |f| f.size)
    }

    /// Bytes held by every copy beyond the first.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.total_size() * self.duplicate_count() as u64
    }

    /// Number of duplicate copies (total - 1 original).
    #[must_use]
    pub fn duplicate_count(&self) -> usize {
        self.files.len().saturating_sub(1)
    }

    /// Get just the paths of files in this group.
    #[must_use]
    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(|f| f.path.as_path()).collect()
    }
}

/// Restricts which records take part in grouping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateFilter {
    /// Extension allow-list; empty allows every extension
    pub extensions: Vec<String>,
    /// Minimum size in bytes (inclusive)
    pub min_size: Option<u64>,
    /// Maximum size in bytes (inclusive)
    pub max_size: Option<u64>,
    /// Path-prefix allow-list, matched on whole components
    pub paths: Vec<PathBuf>,
}

impl DuplicateFilter {
    /// Lowercase the extensions and drop any leading dot.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.extensions = self
            .extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Whether the record lies under one of the path prefixes (or no prefix
    /// is set).
    #[must_use]
    pub fn matches_path(&self, record: &FileRecord) -> bool {
        self.paths.is_empty() || self.paths.iter().any(|p| record.path.starts_with(p))
    }

    /// Whether the record passes every criterion.
    #[must_use]
    pub fn matches(&self, record: &FileRecord) -> bool {
        let extension_ok = self.extensions.is_empty()
            || record
                .extension
                .as_ref()
                .is_some_and(|ext| self.extensions.iter().any(|e| e == ext));
        extension_ok
            && self.min_size.map_or(true, |min| record.size >= min)
            && self.max_size.map_or(true, |max| record.size <= max)
            && self.matches_path(record)
    }
}

/// Ordering of duplicate groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Largest wasted space first
    #[default]
    WastedSpace,
    /// Largest member size first
    TotalSize,
    /// First member's file name, ascending
    Name,
}

/// Group records by digest, keeping groups with two or more members.
///
/// Records without a valid digest and soft-deleted records are ignored.
#[must_use]
pub fn group_by_digest(records: impl IntoIterator<Item = FileRecord>) -> Vec<DuplicateGroup> {
    let mut by_digest: HashMap<String, Vec<FileRecord>> = HashMap::new();
    for record in records {
        if record.is_deleted || !record.digest_valid {
            continue;
        }
        if let Some(digest) = record.digest.clone() {
            by_digest.entry(digest).or_default().push(record);
        }
    }

    by_digest
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(digest, mut files)| {
            files.sort_by_key(|f| f.id);
            DuplicateGroup { digest, files }
        })
        .collect()
}

/// Sort groups in place; ties are broken by digest.
pub fn sort_groups(groups: &mut [DuplicateGroup], sort_by: SortBy) {
    match sort_by {
        SortBy::WastedSpace => groups.sort_by(|a, b| {
            b.wasted_space()
                .cmp(&a.wasted_space())
                .then_with(|| a.digest.cmp(&b.digest))
        }),
        SortBy::TotalSize => groups.sort_by(|a, b| {
            b.total_size()
                .cmp(&a.total_size())
                .then_with(|| a.digest.cmp(&b.digest))
        }),
        SortBy::Name => groups.sort_by(|a, b| {
            let name = |g: &DuplicateGroup| g.files.first().map(|f| f.name.clone());
            name(a)
                .cmp(&name(b))
                .then_with(|| a.digest.cmp(&b.digest))
        }),
    }
}

/// Aggregate duplicate figures over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateStatistics {
    /// Non-deleted files in the store
    pub total_files: u64,
    /// Copies beyond the first, summed over groups
    pub total_duplicates: u64,
    /// Wasted bytes, summed over groups
    pub total_wasted_space: u64,
    /// Duplicate copies per extension (`no-extension` when absent)
    pub duplicates_by_extension: BTreeMap<String, u64>,
}

impl DuplicateStatistics {
    /// Aggregate over `groups`.
    #[must_use]
    pub fn from_groups(total_files: u64, groups: &[DuplicateGroup]) -> Self {
        let mut stats = Self {
            total_files,
            ..Self::default()
        };
        for group in groups {
            stats.total_duplicates += group.duplicate_count() as u64;
            stats.total_wasted_space += group.wasted_space();
            for file in group.files.iter().skip(1) {
                let key = file
                    .extension
                    .clone()
                    .unwrap_or_else(|| "no-extension".to_string());
                *stats.duplicates_by_extension.entry(key).or_default() += 1;
            }
        }
        stats
    }
}
