//! Single entry point over the record store, the scan pipeline and the
//! duplicate service.
//!
//! Every user-facing command maps to one method here. The CLI, tests and any
//! embedding application go through [`Engine`] rather than wiring the parts
//! together themselves.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::actions::{BatchDeleteResult, DeleteResult};
use crate::config::Config;
use crate::duplicates::{
    DuplicateError, DuplicateFilter, DuplicateGroup, DuplicateService, DuplicateStatistics,
    KeepPolicy, SortBy,
};
use crate::error::CommandError;
use crate::pipeline::{PipelineError, ScanPipeline, ScanSummary};
use crate::progress::{NoopObserver, ProgressSnapshot, ScanObserver};
use crate::store::{Database, ScanPathRecord, ScanSession, StoreResult};

/// Owner of one database and everything that operates on it.
#[derive(Debug)]
pub struct Engine {
    db: Arc<Database>,
    pipeline: Arc<ScanPipeline>,
    duplicates: DuplicateService,
}

impl Engine {
    /// Open the configured database file.
    pub fn open(config: &Config, observer: Arc<dyn ScanObserver>) -> Result<Self, CommandError> {
        let path = config.database_path()?;
        log::debug!("Opening database at {}", path.display());
        let db = Arc::new(Database::open(&path)?);
        Ok(Self::with_database(db, config, observer)?)
    }

    /// Build an engine over an already opened database.
    pub fn with_database(
        db: Arc<Database>,
        config: &Config,
        observer: Arc<dyn ScanObserver>,
    ) -> Result<Self, PipelineError> {
        let pipeline =
            ScanPipeline::new(Arc::clone(&db), config.pipeline_settings())?.with_observer(observer);
        let duplicates =
            DuplicateService::new(Arc::clone(&db)).with_delete_mode(config.delete_mode());
        Ok(Self {
            db,
            pipeline: Arc::new(pipeline),
            duplicates,
        })
    }

    /// In-memory engine with default settings and no observer.
    pub fn in_memory() -> Result<Self, CommandError> {
        let db = Arc::new(Database::open_in_memory()?);
        Ok(Self::with_database(
            db,
            &Config::default(),
            Arc::new(NoopObserver),
        )?)
    }

    /// The pipeline, for callers that need to stop it from another thread.
    #[must_use]
    pub fn pipeline(&self) -> &Arc<ScanPipeline> {
        &self.pipeline
    }

    #[must_use]
    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Register a root directory. Relative paths are made absolute.
    ///
    /// Fails with `PathAlreadyExists` if the root is already registered.
    pub fn add_scan_path(&self, path: &Path) -> StoreResult<ScanPathRecord> {
        let path = absolute(path);
        let record = self.db.add_scan_path(&path)?;
        log::info!("Added scan path {} (id {})", path.display(), record.id);
        Ok(record)
    }

    /// Active scan roots.
    pub fn list_scan_paths(&self) -> StoreResult<Vec<ScanPathRecord>> {
        self.db.list_scan_paths(true)
    }

    /// Unregister a root. File records under it are kept.
    pub fn remove_scan_path(&self, id: i64) -> Result<(), CommandError> {
        if !self.db.remove_scan_path(id)? {
            return Err(CommandError::ScanPathNotFound(id));
        }
        log::info!("Removed scan path {id}");
        Ok(())
    }

    /// Scan every active root; blocks until the run finishes or is stopped.
    pub fn start_scan(&self) -> Result<ScanSummary, PipelineError> {
        let roots: Vec<PathBuf> = self
            .list_scan_paths()?
            .into_iter()
            .map(|record| record.path)
            .collect();
        self.pipeline.start(&roots)
    }

    pub fn pause_scan(&self) -> bool {
        self.pipeline.pause()
    }

    pub fn resume_scan(&self) -> bool {
        self.pipeline.resume()
    }

    pub fn stop_scan(&self) -> bool {
        self.pipeline.stop()
    }

    #[must_use]
    pub fn progress(&self) -> ProgressSnapshot {
        self.pipeline.progress()
    }

    #[must_use]
    pub fn is_scanning(&self) -> bool {
        self.pipeline.is_running()
    }

    /// Most recent scan session, if any.
    pub fn last_session(&self) -> StoreResult<Option<ScanSession>> {
        self.db.latest_session()
    }

    pub fn duplicates(
        &self,
        filter: &DuplicateFilter,
        sort_by: SortBy,
    ) -> StoreResult<Vec<DuplicateGroup>> {
        self.duplicates.duplicates(filter, sort_by)
    }

    pub fn remove_file(&self, id: i64) -> Result<DeleteResult, DuplicateError> {
        self.duplicates.remove_file(id)
    }

    pub fn remove_duplicates_in_path(
        &self,
        prefix: &Path,
        keep: KeepPolicy,
    ) -> StoreResult<BatchDeleteResult> {
        self.duplicates.remove_files_in_path(&absolute(prefix), keep)
    }

    pub fn statistics(&self) -> StoreResult<DuplicateStatistics> {
        self.duplicates.statistics()
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
