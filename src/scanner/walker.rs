//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a scan root and
//! reporting every directory and regular file below it. Change detection
//! against the record store happens in the pipeline's walk phase; the walker
//! itself only discovers entries.
//!
//! # Features
//!
//! - Deterministic, name-sorted traversal
//! - Pruning of denied directory names (`node_modules`, `.git`, ...) and of any
//!   directory whose name starts with `.`; pruned directories are still
//!   reported so they count as folders
//! - Symbolic links are never followed
//! - Unreadable directories are logged and treated as empty
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::{Walker, WalkerConfig};
//! use dupescan::scanner::walker::WalkEntry;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/home/user/Photos"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(WalkEntry::File { path, metadata }) => {
//!             println!("{}: {} bytes", path.display(), metadata.len())
//!         }
//!         Ok(WalkEntry::Directory(_)) => {}
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jwalk::{Parallelism, WalkDir};

use super::{ScanError, DEFAULT_SKIP_DIRECTORIES};

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Directory names that are never descended into.
    pub skip_directories: Vec<String>,

    /// Also prune every directory whose name starts with `.`.
    pub skip_dot_directories: bool,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            skip_directories: DEFAULT_SKIP_DIRECTORIES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            skip_dot_directories: true,
        }
    }
}

impl WalkerConfig {
    /// Whether a directory with this name must not be descended into.
    #[must_use]
    pub fn should_skip(&self, name: &str) -> bool {
        (self.skip_dot_directories && name.starts_with('.'))
            || self.skip_directories.iter().any(|d| d == name)
    }
}

/// An item discovered below the root.
#[derive(Debug)]
pub enum WalkEntry {
    /// A directory (possibly pruned)
    Directory(PathBuf),
    /// A regular file with its metadata
    File {
        /// Absolute path of the file
        path: PathBuf,
        /// Metadata captured at discovery
        metadata: Metadata,
    },
}

/// Per-root traversal counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Regular files seen
    pub files: u64,
    /// Directories seen, pruned ones included
    pub folders: u64,
}

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: Arc<WalkerConfig>,
}

impl Walker {
    /// Create a new walker for the given root.
    #[must_use]
    pub fn new(root: &Path, config: WalkerConfig) -> Self {
        Self {
            root: root.to_path_buf(),
            config: Arc::new(config),
        }
    }

    /// The root this walker traverses.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the root, yielding directories and regular files in name order.
    ///
    /// The root itself is not yielded. Errors are yielded for entries that
    /// could not be read; the walk continues past them.
    pub fn walk(&self) -> impl Iterator<Item = Result<WalkEntry, ScanError>> + '_ {
        let config = Arc::clone(&self.config);

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(false)
            .parallelism(Parallelism::Serial)
            .process_read_dir(move |depth, _path, _read_dir_state, children| {
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });

                // `None` is the synthetic read that yields the root itself,
                // which is never pruned. Denied directories are still yielded.
                if depth.is_none() {
                    return;
                }
                for entry in children.iter_mut().flatten() {
                    if entry.file_type().is_dir()
                        && config.should_skip(&entry.file_name().to_string_lossy())
                    {
                        log::trace!("Pruning directory: {}", entry.path().display());
                        entry.read_children_path = None;
                    }
                }
            });

        walk_dir
            .into_iter()
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    if entry.depth == 0 {
                        return None;
                    }
                    let path = entry.path();
                    let file_type = entry.file_type();

                    if file_type.is_dir() {
                        return Some(Ok(WalkEntry::Directory(path)));
                    }
                    if !file_type.is_file() {
                        log::trace!("Skipping non-regular entry: {}", path.display());
                        return None;
                    }

                    match std::fs::symlink_metadata(&path) {
                        Ok(metadata) if metadata.is_file() => {
                            Some(Ok(WalkEntry::File { path, metadata }))
                        }
                        Ok(_) => None,
                        Err(e) => Some(Err(Self::handle_io_error(&path, e))),
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    Some(Err(Self::handle_jwalk_error(path, e)))
                }
            })
    }

    /// Handle I/O errors during file access.
    fn handle_io_error(path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path.to_path_buf())
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }

    /// Handle jwalk errors; unreadable directories end up here.
    fn handle_jwalk_error(path: PathBuf, error: jwalk::Error) -> ScanError {
        log::warn!("Error reading directory {}: {}", path.display(), error);
        ScanError::Io {
            path,
            source: std::io::Error::other(error.to_string()),
        }
    }
}
