use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// `ProfilerRunMode` (spec.md §3): resolved before the core runs. `Auto` is
/// only ever user-facing input; by the time a plugin sees a mode it has
/// already been resolved to `Host` or `Container`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerRunMode {
    Host,
    Container,
}

/// Raw artifact kinds a plugin can hand off to post-processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawArtifactType {
    Speedscope,
    Ticks,
    Collapsed,
    PerfData,
    PerfScript,
    Nettrace,
    InstrumentsTrace,
}

/// `(type, path)`, written by the plugin during execution and read back by
/// post-processing.
#[derive(Debug, Clone)]
pub struct RawArtifact {
    pub artifact_type: RawArtifactType,
    pub path: PathBuf,
}

/// Per-run mutable record passed through the plugin lifecycle (spec.md §3).
#[derive(Debug, Default)]
pub struct ProfileContext {
    pub raw_artifact: Option<RawArtifact>,
    pub sampling_hz: Option<f64>,
    pub runtime_env: Vec<(String, String)>,
    pub temp_files: Vec<PathBuf>,
    pub temp_dirs: Vec<PathBuf>,
    pub notes: HashMap<String, String>,
}

impl ProfileContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_raw_artifact(&mut self, artifact_type: RawArtifactType, path: impl Into<PathBuf>) {
        self.raw_artifact = Some(RawArtifact {
            artifact_type,
            path: path.into(),
        });
    }

    pub fn register_temp_file(&mut self, path: impl Into<PathBuf>) {
        self.temp_files.push(path.into());
    }

    pub fn register_temp_dir(&mut self, path: impl Into<PathBuf>) {
        self.temp_dirs.push(path.into());
    }

    pub fn add_runtime_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.runtime_env.push((key.into(), value.into()));
    }

    /// Best-effort removal of every registered temp file/dir. Never panics;
    /// failures are logged and otherwise ignored (`CleanupWarning`, spec.md §7).
    pub fn cleanup(&mut self) {
        for file in self.temp_files.drain(..) {
            if let Err(err) = std::fs::remove_file(&file) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to remove temp file {}: {}", file.display(), err);
                }
            }
        }
        for dir in self.temp_dirs.drain(..) {
            if let Err(err) = std::fs::remove_dir_all(&dir) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    log::warn!("failed to remove temp dir {}: {}", dir.display(), err);
                }
            }
        }
    }
}

/// `format` routing for `record --analyze`/`analyze`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// User-facing mode selector, resolved to `ProfilerRunMode` during Phase 1
/// of the lifecycle orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelector {
    Host,
    Container,
    Auto,
}

/// `RecordOptions` (spec.md §3): the configuration contract threaded through
/// every plugin call.
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub output: Option<PathBuf>,
    pub verbose: bool,
    pub extra_profiler_args: Vec<String>,
    pub mode: ModeSelector,
    pub cwd: PathBuf,
    pub enable_host_networking: bool,
    pub platform: Option<String>,
    pub format: OutputFormat,
}

impl RecordOptions {
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }
}
