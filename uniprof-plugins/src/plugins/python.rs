use std::path::Path;

use uniprof_schema::SpeedscopeFile;

use crate::context::{ProfileContext, ProfilerRunMode, RawArtifactType, RecordOptions};
use crate::error::PluginError;
use crate::plugin::{EnvironmentCheck, PlatformPlugin, ProfilerCommand};

use super::basename;

const EXECUTABLES: &[&str] = &["python", "python3", "python2"];
const EXTENSIONS: &[&str] = &["py"];
const DEFAULT_RATE: &str = "999";

/// py-spy integration (spec.md §4.4 "Python"). py-spy writes canonical
/// Speedscope JSON directly; no converter is involved.
pub struct PythonPlugin;

impl PythonPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PythonPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPlugin for PythonPlugin {
    fn name(&self) -> &'static str {
        "python"
    }

    fn detect_command(&self, binary: &Path) -> bool {
        let name = basename(binary);
        EXECUTABLES.contains(&name.as_str())
            || super::extension(binary).map(|e| EXTENSIONS.contains(&e.as_str())).unwrap_or(false)
    }

    fn check_environment(&self, mode: ProfilerRunMode) -> EnvironmentCheck {
        if mode == ProfilerRunMode::Container {
            return EnvironmentCheck::ok();
        }
        if which::which("py-spy").is_err() {
            return EnvironmentCheck::missing(
                "py-spy was not found in PATH; install with `pip install py-spy` or `cargo install py-spy`",
            );
        }
        if needs_sudo() {
            EnvironmentCheck {
                missing: Vec::new(),
                warnings: vec![
                    "py-spy requires elevated privileges on this system; re-run with sudo or lower kernel.yama.ptrace_scope".to_string(),
                ],
            }
        } else {
            EnvironmentCheck::ok()
        }
    }

    fn default_container_image(&self) -> Option<&'static str> {
        Some("python")
    }

    fn build_command(
        &self,
        _mode: ProfilerRunMode,
        target: &[String],
        options: &RecordOptions,
        context: &mut ProfileContext,
    ) -> Result<ProfilerCommand, PluginError> {
        let output = options.cwd.join(".uniprof-python.speedscope.json");
        context.register_temp_file(&output);
        context.set_raw_artifact(RawArtifactType::Speedscope, &output);

        let mut cmd = ProfilerCommand::new("py-spy")
            .arg("record")
            .arg("--format")
            .arg("speedscope")
            .arg("--subprocesses")
            .arg("--output")
            .arg(output.to_string_lossy().to_string());

        if !has_rate_flag(&options.extra_profiler_args) {
            cmd = cmd.arg("--rate").arg(DEFAULT_RATE);
        }
        cmd = cmd.args(options.extra_profiler_args.iter().cloned());
        cmd = cmd.arg("--").args(target.iter().cloned());

        if needs_sudo() {
            cmd = cmd.elevated();
        }
        Ok(cmd)
    }

    fn post_process(
        &self,
        context: &ProfileContext,
        _profile_name: &str,
    ) -> Result<SpeedscopeFile, PluginError> {
        let Some(artifact) = &context.raw_artifact else {
            return Err(PluginError::Other("python plugin produced no raw artifact".to_string()));
        };
        let contents = std::fs::read_to_string(&artifact.path)?;
        let mut file: SpeedscopeFile = SpeedscopeFile::read_from_str(&contents)
            .map_err(|e| PluginError::Other(e.to_string()))?;
        file.exporter = Some("uniprof-python".to_string());
        Ok(file)
    }

    fn profiler_process_names(&self) -> Vec<&'static str> {
        vec!["py-spy"]
    }
}

fn needs_sudo() -> bool {
    if cfg!(target_os = "macos") {
        return true;
    }
    std::fs::read_to_string("/proc/sys/kernel/yama/ptrace_scope")
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .map(|v| v != 0)
        .unwrap_or(false)
}

fn has_rate_flag(args: &[String]) -> bool {
    args.iter().any(|a| a == "--rate" || a == "-r" || a.starts_with("--rate="))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_python_interpreters_and_scripts() {
        let plugin = PythonPlugin::new();
        assert!(plugin.detect_command(Path::new("/usr/bin/python3")));
        assert!(plugin.detect_command(Path::new("app.py")));
        assert!(!plugin.detect_command(Path::new("app.rb")));
    }

    #[test]
    fn default_rate_skipped_when_user_supplied_one() {
        assert!(has_rate_flag(&["--rate".to_string(), "500".to_string()]));
        assert!(!has_rate_flag(&["--subprocesses".to_string()]));
    }
}
