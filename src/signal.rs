//! Ctrl+C handling for the `scan` command.
//!
//! The first interrupt stops the active scan run: queued work is discarded,
//! the session is finalized and the process exits with
//! [`EXIT_CODE_INTERRUPTED`]. Files not yet hashed are picked up again by the
//! next run.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::pipeline::ScanPipeline;

/// Exit code for SIGINT (128 + 2).
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shared "interrupted" flag set by the signal handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an interrupt was received.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Mark the process as interrupted and stop `pipeline` if it is running.
    pub fn request_shutdown(&self, pipeline: &ScanPipeline) {
        self.flag.store(true, Ordering::SeqCst);
        if pipeline.stop() {
            log::info!("Shutdown signal received, scan stopping");
        }
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

/// Install a Ctrl+C handler that stops `pipeline`.
///
/// Only one handler can exist per process. When one is already registered
/// (as happens when tests drive the command layer repeatedly), an unhooked
/// handler is returned instead so the caller can proceed.
pub fn install_handler(pipeline: Arc<ScanPipeline>) -> Result<ShutdownHandler, SignalError> {
    let handler = ShutdownHandler::new();
    let hooked = handler.clone();

    match ctrlc::set_handler(move || {
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Stopping scan...");
        let _ = std::io::stderr().flush();
        hooked.request_shutdown(&pipeline);
    }) {
        Ok(()) => Ok(handler),
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered, using unhooked handler");
            Ok(handler)
        }
        Err(e) => Err(e.into()),
    }
}
