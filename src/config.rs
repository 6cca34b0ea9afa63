//! Application configuration management.
//!
//! Settings are layered with figment, later layers overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. TOML file (`<config_dir>/config.toml`, or an explicit `--config` path)
//! 3. Environment variables prefixed with `DUPESCAN_` (e.g.
//!    `DUPESCAN_HASH_BATCH_SIZE=20`)
//!
//! # Example
//!
//! ```toml
//! database_path = "/var/lib/dupescan/dupescan.db"
//! hash_batch_size = 16
//! metadata_batch_size = 4
//! skip_directories = ["node_modules", ".git", "target"]
//! use_trash = true
//! perceptual_algorithm = "dhash"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::actions::DeleteMode;
use crate::pipeline::PipelineSettings;
use crate::scanner::{PerceptualAlgorithm, WalkerConfig, DEFAULT_SKIP_DIRECTORIES};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "DUPESCAN_";

/// Errors from loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A layer could not be read or did not match the schema.
    #[error("invalid configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("invalid value for '{key}': {message}")]
    Invalid { key: &'static str, message: String },

    /// No platform data directory to place the database in.
    #[error("cannot determine a data directory; set database_path explicitly")]
    NoDataDir,
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Figment(Box::new(error))
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file; defaults to `<data_dir>/dupescan.db`.
    pub database_path: Option<PathBuf>,
    /// Files hashed concurrently per batch.
    pub hash_batch_size: usize,
    /// Files whose metadata is extracted concurrently per batch.
    pub metadata_batch_size: usize,
    /// Walked files between progress updates.
    pub walk_progress_interval: u64,
    /// Hashed files between progress updates.
    pub hash_progress_interval: u64,
    /// Directory names never descended into.
    pub skip_directories: Vec<String>,
    /// Move removed files to the system trash instead of deleting them.
    pub use_trash: bool,
    /// Algorithm for image fingerprints.
    pub perceptual_algorithm: PerceptualAlgorithm,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            hash_batch_size: 10,
            metadata_batch_size: 5,
            walk_progress_interval: 100,
            hash_progress_interval: 10,
            skip_directories: DEFAULT_SKIP_DIRECTORIES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            use_trash: false,
            perceptual_algorithm: PerceptualAlgorithm::default(),
        }
    }
}

impl Config {
    /// Load defaults, the config file and environment overrides.
    ///
    /// `config_path` replaces the platform config file when given; a missing
    /// default file is simply skipped.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = config_path
            .map(Path::to_path_buf)
            .or_else(Self::default_config_path);
        let config: Self = Self::figment(file.as_deref()).extract()?;
        config.validate()?;
        log::debug!("Loaded configuration: {config:?}");
        Ok(config)
    }

    /// The layered figment, exposed for inspection and tests.
    #[must_use]
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("hash_batch_size", self.hash_batch_size as u64),
            ("metadata_batch_size", self.metadata_batch_size as u64),
            ("walk_progress_interval", self.walk_progress_interval),
            ("hash_progress_interval", self.hash_progress_interval),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    key,
                    message: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Platform config file location.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Resolved database location.
    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => project_dirs()
                .map(|dirs| dirs.data_dir().join("dupescan.db"))
                .ok_or(ConfigError::NoDataDir),
        }
    }

    /// Pipeline tunables derived from this configuration.
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            hash_batch_size: self.hash_batch_size,
            metadata_batch_size: self.metadata_batch_size,
            walk_progress_interval: self.walk_progress_interval,
            hash_progress_interval: self.hash_progress_interval,
            walker: WalkerConfig {
                skip_directories: self.skip_directories.clone(),
                skip_dot_directories: true,
            },
            perceptual_algorithm: self.perceptual_algorithm,
        }
    }

    /// How removals leave the filesystem.
    #[must_use]
    pub fn delete_mode(&self) -> DeleteMode {
        DeleteMode::from_use_trash(self.use_trash)
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "dupescan", "dupescan")
}
