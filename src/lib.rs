//! Dupescan - incremental duplicate file scanner
//!
//! Registered directories are walked, every file is recorded in a SQLite
//! store, new or changed files are hashed with BLAKE3, and images, videos and
//! audio files get their metadata extracted. Duplicate groups are derived from
//! the stored digests on demand.
//!
//! [`engine::Engine`] is the entry point for embedding; the `dupescan` binary
//! is a thin layer over it.

pub mod actions;
pub mod cli;
pub mod commands;
pub mod config;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod store;

pub use commands::run_app;
