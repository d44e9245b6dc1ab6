use std::path::{Path, PathBuf};

use uniprof_convert::perf_script;
use uniprof_schema::SpeedscopeFile;

use crate::context::{ProfileContext, RawArtifactType};
use crate::error::PluginError;
use crate::plugin::{EnvironmentCheck, ProfilerCommand};

const DEFAULT_SAMPLING_HZ: f64 = 999.0;

/// Configuration for a `perf record` invocation, composed (not subclassed)
/// into both `NativePlugin` and `BeamPlugin` (spec.md §4.4, §9 "composition,
/// not subclassing").
#[derive(Debug, Clone)]
pub struct PerfConfig {
    pub call_graph: &'static str,
    pub has_jit: bool,
    /// When true, the target argv is the command to exec under `perf
    /// record` directly (BEAM: `elixir`/`erl`/`escript`/`mix`), rather than a
    /// binary path copied into the workspace (native).
    pub treat_executable_as_command: bool,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            call_graph: "dwarf",
            has_jit: false,
            treat_executable_as_command: false,
        }
    }
}

pub struct PerfHelper {
    pub config: PerfConfig,
}

impl PerfHelper {
    pub fn new(config: PerfConfig) -> Self {
        Self { config }
    }

    pub fn check_environment(&self) -> EnvironmentCheck {
        if which::which("perf").is_ok() {
            EnvironmentCheck::ok()
        } else {
            EnvironmentCheck::missing(
                "perf was not found in PATH; install linux-tools (e.g. `apt install linux-tools-common linux-tools-$(uname -r)`)",
            )
        }
    }

    /// `perf`'s own process name, denylisted so the first SIGINT of a run
    /// only reaches the profiled program, not the sampler itself (spec.md
    /// §4.1 `getProfilerProcessNames()`).
    pub fn process_names(&self) -> Vec<&'static str> {
        vec!["perf"]
    }

    pub fn needs_sudo(&self) -> bool {
        let paranoid = std::fs::read_to_string("/proc/sys/kernel/perf_event_paranoid")
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
            .unwrap_or(0);
        paranoid > 1
    }

    /// Builds the `perf record` argv. `target` is either a binary path
    /// (native) or a full command (BEAM, when `treat_executable_as_command`).
    pub fn build_record_command(
        &self,
        workspace_binary: &Path,
        target_args: &[String],
        perf_data_path: &Path,
        extra_args: &[String],
    ) -> ProfilerCommand {
        let mut cmd = ProfilerCommand::new("perf")
            .arg("record")
            .arg("-F")
            .arg(DEFAULT_SAMPLING_HZ.to_string())
            .arg("--call-graph")
            .arg(self.config.call_graph)
            .arg("-o")
            .arg(perf_data_path.to_string_lossy().to_string())
            .args(extra_args.iter().cloned())
            .arg("--");

        if self.config.treat_executable_as_command {
            cmd = cmd.args(target_args.iter().cloned());
        } else {
            cmd = cmd.arg(workspace_binary.to_string_lossy().to_string());
            cmd = cmd.args(target_args.iter().cloned());
        }
        cmd
    }

    /// Registers the binary with `perf buildid-cache` so DWARF/symbol
    /// resolution works without `--symfs` pointing elsewhere.
    pub fn buildid_cache_add_command(&self, binary: &Path) -> ProfilerCommand {
        ProfilerCommand::new("perf")
            .arg("buildid-cache")
            .arg("--add")
            .arg(binary.to_string_lossy().to_string())
    }

    pub fn jit_inject_command(&self, perf_data_path: &Path, injected_path: &Path) -> ProfilerCommand {
        ProfilerCommand::new("perf")
            .arg("inject")
            .arg("--jit")
            .arg("-i")
            .arg(perf_data_path.to_string_lossy().to_string())
            .arg("-o")
            .arg(injected_path.to_string_lossy().to_string())
    }

    pub fn script_command(&self, perf_data_path: &Path) -> ProfilerCommand {
        ProfilerCommand::new("perf")
            .arg("script")
            .arg("--symfs")
            .arg("/")
            .arg("-i")
            .arg(perf_data_path.to_string_lossy().to_string())
    }

    /// Runs `perf script` (and, when `has_jit`, `perf inject --jit` first)
    /// against the recorded data and parses the textual output.
    pub fn post_process(
        &self,
        context: &ProfileContext,
        perf_data_path: &Path,
        profile_name: &str,
    ) -> Result<SpeedscopeFile, PluginError> {
        let script_path = if self.config.has_jit {
            let injected = perf_data_path.with_extension("jitted.data");
            run(self.jit_inject_command(perf_data_path, &injected))?;
            injected
        } else {
            perf_data_path.to_path_buf()
        };

        let output = run_capture(self.script_command(&script_path))?;
        let sampling_hz = context.sampling_hz.unwrap_or(DEFAULT_SAMPLING_HZ);
        let reader = std::io::Cursor::new(output);
        perf_script::convert(reader, sampling_hz, "uniprof-perf", profile_name)
            .map_err(PluginError::Convert)
    }
}

fn run(cmd: ProfilerCommand) -> Result<(), PluginError> {
    let status = cmd
        .to_std_command()
        .status()
        .map_err(|e| PluginError::Spawn(e.to_string()))?;
    if !status.success() {
        return Err(PluginError::Spawn(format!(
            "{} exited with {status}",
            cmd.program
        )));
    }
    Ok(())
}

fn run_capture(cmd: ProfilerCommand) -> Result<String, PluginError> {
    let output = cmd
        .to_std_command()
        .output()
        .map_err(|e| PluginError::Spawn(e.to_string()))?;
    if !output.status.success() {
        return Err(PluginError::Spawn(format!(
            "{} exited with {}",
            cmd.program, output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Copies `source` into `workspace_dir` under its own basename, erroring if
/// the destination already exists and differs from the source (spec.md §4.4
/// "erroring if the destination name collides with an existing file").
pub fn copy_binary_into_workspace(
    source: &Path,
    workspace_dir: &Path,
) -> Result<PathBuf, PluginError> {
    let file_name = source
        .file_name()
        .ok_or_else(|| PluginError::Other(format!("{} has no file name", source.display())))?;
    let dest = workspace_dir.join(file_name);
    if dest.exists() {
        let same = std::fs::canonicalize(&dest).ok() == std::fs::canonicalize(source).ok();
        if !same {
            return Err(PluginError::Other(format!(
                "refusing to overwrite existing file at {}",
                dest.display()
            )));
        }
        return Ok(dest);
    }
    std::fs::copy(source, &dest)?;
    Ok(dest)
}

pub fn mark_raw_artifact(context: &mut ProfileContext, perf_script_output: PathBuf) {
    context.set_raw_artifact(RawArtifactType::PerfScript, perf_script_output);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_record_command_includes_call_graph_and_output_path() {
        let helper = PerfHelper::new(PerfConfig::default());
        let cmd = helper.build_record_command(
            Path::new("/workspace/app"),
            &["--flag".to_string()],
            Path::new("/tmp/perf.data"),
            &[],
        );
        assert_eq!(cmd.program, "perf");
        assert!(cmd.args.contains(&"--call-graph".to_string()));
        assert!(cmd.args.contains(&"dwarf".to_string()));
        assert!(cmd.args.contains(&"/workspace/app".to_string()));
    }

    #[test]
    fn treat_executable_as_command_skips_binary_path() {
        let helper = PerfHelper::new(PerfConfig {
            treat_executable_as_command: true,
            ..PerfConfig::default()
        });
        let cmd = helper.build_record_command(
            Path::new("/unused"),
            &["elixir".to_string(), "app.exs".to_string()],
            Path::new("/tmp/perf.data"),
            &[],
        );
        assert!(!cmd.args.iter().any(|a| a == "/unused"));
        assert!(cmd.args.contains(&"elixir".to_string()));
    }
}
