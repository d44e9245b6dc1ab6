use std::path::Path;
use std::process::Command;

use uniprof_schema::SpeedscopeFile;

use crate::context::{ProfileContext, ProfilerRunMode, RecordOptions};
use crate::error::PluginError;

/// Host-side environment check result for a plugin (spec.md §4.1
/// `checkEnvironment`). Plugins report what's missing instead of raising
/// immediately so the CLI can print one combined remediation message.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentCheck {
    pub missing: Vec<String>,
    pub warnings: Vec<String>,
}

impl EnvironmentCheck {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn missing(detail: impl Into<String>) -> Self {
        Self {
            missing: vec![detail.into()],
            warnings: Vec::new(),
        }
    }
}

/// A profiler command ready to execute, plus the environment it needs layered
/// on top of the target's own environment.
#[derive(Debug, Clone)]
pub struct ProfilerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub needs_elevated_privileges: bool,
}

impl ProfilerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            needs_elevated_privileges: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn elevated(mut self) -> Self {
        self.needs_elevated_privileges = true;
        self
    }

    pub fn to_std_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }
}

/// The contract every language/runtime profiler integration implements
/// (spec.md §4.1). A plugin is stateless between calls; per-run state lives
/// in `ProfileContext`.
pub trait PlatformPlugin: Send + Sync {
    /// Stable identifier, e.g. `"python"`, `"nodejs"`, `"native"`. Matches the
    /// `exporter` field written into output Speedscope files.
    fn name(&self) -> &'static str;

    /// Does `binary` look like something this plugin profiles? Called in
    /// registry order; `native` is always tried last as the fallback.
    fn detect_command(&self, binary: &Path) -> bool;

    /// Recognizes this plugin's own output from a previously-written
    /// Speedscope file's `exporter` field (`visualize`/`analyze` without a
    /// fresh `record`).
    fn detect_from_profile(&self, exporter: &str) -> bool {
        exporter == self.name() || exporter.starts_with(&format!("uniprof-{}", self.name()))
    }

    /// Verifies required host tools exist (py-spy, rbspy, perf, ...) without
    /// running anything.
    fn check_environment(&self, mode: ProfilerRunMode) -> EnvironmentCheck;

    /// Default container image reference used when `mode` resolves to
    /// `Container` and the user didn't override it. `None` means this
    /// plugin has no containerized path (native on a foreign host, say).
    fn default_container_image(&self) -> Option<&'static str> {
        None
    }

    /// A plugin's opinion on host vs. container for `target`, consulted
    /// during `auto` mode resolution before falling back to a container
    /// runtime probe (spec.md §4.3 Phase 1 step 6). Most plugins have no
    /// opinion; `native` on macOS overrides this to force `Host` since
    /// Mach-O binaries have no containerized profiling path.
    fn default_mode_hint(&self, _target: &[String]) -> Option<ProfilerRunMode> {
        None
    }

    /// Builds the profiler invocation for the target command + its args.
    /// `target` is already path-mapped into container form when
    /// `mode == Container`.
    fn build_command(
        &self,
        mode: ProfilerRunMode,
        target: &[String],
        options: &RecordOptions,
        context: &mut ProfileContext,
    ) -> Result<ProfilerCommand, PluginError>;

    /// Converts whatever the profiler wrote (tracked via
    /// `context.raw_artifact`) into a canonical Speedscope document.
    fn post_process(
        &self,
        context: &ProfileContext,
        profile_name: &str,
    ) -> Result<SpeedscopeFile, PluginError>;

    /// Extra capabilities a container run needs beyond the defaults
    /// (`SYS_PTRACE` is assumed ambient; most plugins return an empty list).
    fn container_capabilities(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Short names of processes considered "profiler internals" (spec.md
    /// §4.1 `getProfilerProcessNames()`), excluded from the first-SIGINT
    /// child signaling alongside the profiler binary itself (spec.md §5,
    /// §8 scenario S4). Most plugins have nothing beyond the profiler
    /// binary name, which the orchestrator already denylists separately.
    fn profiler_process_names(&self) -> Vec<&'static str> {
        Vec::new()
    }
}
