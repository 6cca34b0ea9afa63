//! File actions module.
//!
//! Removal of duplicate files from disk, either permanently or by moving them
//! to the system trash.
//!
//! ```no_run
//! use dupescan::actions::delete::{delete_file, DeleteMode};
//! use std::path::Path;
//!
//! let result = delete_file(Path::new("/path/to/duplicate.txt"), DeleteMode::Trash);
//! ```

pub mod delete;

pub use delete::{BatchDeleteResult, DeleteError, DeleteMode, DeleteResult};
