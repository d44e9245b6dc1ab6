use std::path::PathBuf;

use thiserror::Error;

/// Errors a plugin can raise. The orchestrator classifies these into the
/// `ErrorKind`s from spec.md §7 without string-matching messages (spec.md §9
/// "Exception-for-control-flow" calls this out explicitly for `Cancellation`).
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("{tool} is not available: {detail}")]
    EnvironmentMissing { tool: String, detail: String },

    #[error("this profiler requires elevated privileges: {0}")]
    NeedsPrivilege(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn profiler command: {0}")]
    Spawn(String),

    #[error("container runtime error: {0}")]
    ContainerRuntime(String),

    #[error("profiling was cancelled by the user")]
    Cancellation,

    #[error("failed to convert raw profiler output: {0}")]
    Convert(#[from] uniprof_convert::ConvertError),

    #[error("could not determine the right profiler command for {0:?}")]
    UnsupportedCommand(PathBuf),

    #[error("{0}")]
    Other(String),
}

impl PluginError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PluginError::Cancellation)
    }
}
