use std::path::PathBuf;

use thiserror::Error;

/// The seven error kinds from spec.md §7, exposed via `RecordError::kind()`
/// so the CLI can map to an exit code without matching on message text
/// (spec.md §9 "Exception-for-control-flow").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UserInput,
    Environment,
    PathMapping,
    ExecutionFailure,
    Cancellation,
    Conversion,
    CleanupWarning,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{0}")]
    UserInput(String),

    #[error("{message}")]
    Environment {
        message: String,
        setup_instructions: Vec<String>,
    },

    #[error("path(s) outside the working directory cannot be mapped into the container: {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    PathMapping(Vec<PathBuf>),

    #[error("profiler exited with an error: {0}")]
    ExecutionFailure(String),

    #[error("profiling cancelled by user")]
    Cancellation,

    #[error("failed to convert raw profiler output: {0}")]
    Conversion(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Plugin(#[from] uniprof_plugins::PluginError),
}

impl RecordError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecordError::UserInput(_) => ErrorKind::UserInput,
            RecordError::Environment { .. } => ErrorKind::Environment,
            RecordError::PathMapping(_) => ErrorKind::PathMapping,
            RecordError::ExecutionFailure(_) => ErrorKind::ExecutionFailure,
            RecordError::Cancellation => ErrorKind::Cancellation,
            RecordError::Conversion(_) => ErrorKind::Conversion,
            RecordError::Io(_) => ErrorKind::ExecutionFailure,
            RecordError::Plugin(err) => {
                if err.is_cancellation() {
                    ErrorKind::Cancellation
                } else {
                    ErrorKind::ExecutionFailure
                }
            }
        }
    }

    /// Exit code per spec.md §6/§7: `130` for cancellation, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Cancellation => 130,
            _ => 1,
        }
    }
}
