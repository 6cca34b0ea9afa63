//! Queries and removals over stored duplicate groups.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::groups::{
    group_by_digest, sort_groups, DuplicateFilter, DuplicateGroup, DuplicateStatistics, SortBy,
};
use super::DuplicateError;
use crate::actions::delete::{delete_file, BatchDeleteResult, DeleteMode, DeleteResult};
use crate::store::{Database, FileQuery, FileRecord, StoreResult};

/// Which member of a group survives a path-wide removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepPolicy {
    /// Keep the member created first
    #[default]
    Oldest,
    /// Keep the member created last
    Newest,
}

/// Duplicate grouping over a record store.
#[derive(Debug, Clone)]
pub struct DuplicateService {
    db: Arc<Database>,
    mode: DeleteMode,
}

impl DuplicateService {
    /// Create a service that deletes files permanently.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            db,
            mode: DeleteMode::Permanent,
        }
    }

    /// Choose how removed files leave the filesystem.
    #[must_use]
    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Duplicate groups among records matching `filter`, sorted by `sort_by`.
    pub fn duplicates(
        &self,
        filter: &DuplicateFilter,
        sort_by: SortBy,
    ) -> StoreResult<Vec<DuplicateGroup>> {
        let filter = filter.clone().normalized();
        let query = FileQuery {
            valid_digest_only: true,
            extensions: filter.extensions.clone(),
            min_size: filter.min_size,
            max_size: filter.max_size,
            ..FileQuery::default()
        };
        let records = self
            .db
            .query_files(&query)?
            .into_iter()
            .filter(|r| filter.matches_path(r));

        let mut groups = group_by_digest(records);
        sort_groups(&mut groups, sort_by);
        Ok(groups)
    }

    /// Number of duplicate groups in the whole store.
    pub fn count_groups(&self) -> StoreResult<u64> {
        Ok(self.db.duplicate_digests()?.len() as u64)
    }

    /// Delete a file from disk and soft-delete its record.
    ///
    /// # Errors
    ///
    /// [`DuplicateError::NotFound`] if no record has this id. A filesystem
    /// failure is returned as-is and the record stays live.
    pub fn remove_file(&self, id: i64) -> Result<DeleteResult, DuplicateError> {
        let record = self.db.get_file(id)?.ok_or(DuplicateError::NotFound(id))?;
        self.remove_record(&record)
    }

    fn remove_record(&self, record: &FileRecord) -> Result<DeleteResult, DuplicateError> {
        let mut result = delete_file(&record.path, self.mode)?;
        self.db.mark_deleted(record.id)?;
        result.id = Some(record.id);
        Ok(result)
    }

    /// Remove redundant copies under `prefix`.
    ///
    /// Every duplicate group with a member under `prefix` is visited. When the
    /// whole group lies under the prefix, all members but the one chosen by
    /// `keep` are removed. When the group also has members elsewhere, every
    /// member under the prefix is removed and the outside copies survive.
    /// Failures on individual files are logged and reported, not raised.
    pub fn remove_files_in_path(
        &self,
        prefix: &Path,
        keep: KeepPolicy,
    ) -> StoreResult<BatchDeleteResult> {
        let groups = self.duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)?;
        let mut batch = BatchDeleteResult::default();

        for group in groups {
            let targets = removal_targets(&group, prefix, keep);
            for record in targets {
                match self.remove_record(record) {
                    Ok(result) => batch.push_success(result),
                    Err(e) => {
                        log::warn!("Could not remove {}: {}", record.path.display(), e);
                        batch.push_failure(record.path.clone(), e.to_string());
                    }
                }
            }
        }

        log::info!("{} under {}", batch.summary(), prefix.display());
        Ok(batch)
    }

    /// Aggregate figures over all live records.
    pub fn statistics(&self) -> StoreResult<DuplicateStatistics> {
        let total_files = self.db.count_files(&FileQuery::default())?;
        let groups = self.duplicates(&DuplicateFilter::default(), SortBy::WastedSpace)?;
        Ok(DuplicateStatistics::from_groups(total_files, &groups))
    }
}

/// Members of `group` to remove for a path-wide removal under `prefix`.
fn removal_targets<'a>(
    group: &'a DuplicateGroup,
    prefix: &Path,
    keep: KeepPolicy,
) -> Vec<&'a FileRecord> {
    let inside: Vec<&FileRecord> = group
        .files
        .iter()
        .filter(|f| f.path.starts_with(prefix))
        .collect();

    if inside.is_empty() {
        return Vec::new();
    }
    if inside.len() < group.files.len() {
        return inside;
    }

    let mut ordered = inside;
    ordered.sort_by(|a, b| {
        let by_time = match keep {
            KeepPolicy::Oldest => a.created_at.cmp(&b.created_at),
            KeepPolicy::Newest => b.created_at.cmp(&a.created_at),
        };
        by_time.then_with(|| a.id.cmp(&b.id))
    });
    ordered.into_iter().skip(1).collect()
}
