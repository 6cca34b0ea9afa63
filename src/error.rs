//! Command-level errors, exit codes and structured error output.

use serde::Serialize;

use crate::config::ConfigError;
use crate::duplicates::DuplicateError;
use crate::pipeline::PipelineError;
use crate::signal::SignalError;
use crate::store::StoreError;

/// Process exit codes of the `dupescan` binary.
///
/// - 0: success
/// - 1: general error
/// - 2: the command completed but found no duplicates
/// - 130: interrupted by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    NoDuplicates = 2,
    Interrupted = 130,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code prefix used in error output.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DS000",
            Self::GeneralError => "DS001",
            Self::NoDuplicates => "DS002",
            Self::Interrupted => "DS130",
        }
    }

    /// Exit code for a failed command.
    #[must_use]
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<CommandError>() {
            Some(CommandError::Interrupted) => Self::Interrupted,
            _ => Self::GeneralError,
        }
    }
}

/// Errors raised by the command layer.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Duplicate(#[from] DuplicateError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    /// The scan was cut short by Ctrl+C.
    #[error("interrupted by user")]
    Interrupted,

    /// No registered scan path has this id.
    #[error("scan path {0} not found")]
    ScanPathNotFound(i64),
}

/// Error report printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// Code such as `DS001`
    pub code: String,
    pub exit_code: i32,
    pub message: String,
    pub interrupted: bool,
}

impl StructuredError {
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
