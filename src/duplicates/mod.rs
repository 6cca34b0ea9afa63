//! Duplicate detection module.
//!
//! This module provides functionality for:
//! - Grouping stored records by content digest
//! - Filtering and sorting duplicate groups
//! - Removing duplicates from disk and soft-deleting their records
//! - Aggregate statistics

pub mod groups;
pub mod service;

pub use groups::{
    group_by_digest, sort_groups, DuplicateFilter, DuplicateGroup, DuplicateStatistics, SortBy,
};
pub use service::{DuplicateService, KeepPolicy};

use crate::actions::DeleteError;
use crate::store::StoreError;

/// Errors from duplicate queries and removals.
#[derive(Debug, thiserror::Error)]
pub enum DuplicateError {
    /// No record with this id.
    #[error("file {0} not found in database")]
    NotFound(i64),

    /// Removing the file from disk failed; the record was left untouched.
    #[error(transparent)]
    Delete(#[from] DeleteError),

    /// The record store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
