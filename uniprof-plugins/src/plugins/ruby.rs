use std::path::Path;

use uniprof_schema::SpeedscopeFile;

use crate::context::{ProfileContext, ProfilerRunMode, RawArtifactType, RecordOptions};
use crate::error::PluginError;
use crate::plugin::{EnvironmentCheck, PlatformPlugin, ProfilerCommand};

use super::basename;

const EXECUTABLES: &[&str] = &["ruby", "irb", "rails", "rake", "bundle"];
const EXTENSIONS: &[&str] = &["rb"];
const DEFAULT_RATE: &str = "999";

/// rbspy integration (spec.md §4.4 "Ruby"): same shape as the Python plugin
/// — rbspy writes canonical JSON directly, default `--rate 999`.
pub struct RubyPlugin;

impl RubyPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RubyPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPlugin for RubyPlugin {
    fn name(&self) -> &'static str {
        "ruby"
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
        if which::which("rbspy").is_err() {
            return EnvironmentCheck::missing(
                "rbspy was not found in PATH; install with `cargo install rbspy` or your package manager",
            );
        }
        if needs_sudo() {
            EnvironmentCheck {
                missing: Vec::new(),
                warnings: vec![
                    "rbspy requires elevated privileges on this system; re-run with sudo or lower kernel.yama.ptrace_scope".to_string(),
                ],
            }
        } else {
            EnvironmentCheck::ok()
        }
    }

    fn default_container_image(&self) -> Option<&'static str> {
        Some("ruby")
    }

    fn build_command(
        &self,
        mode: ProfilerRunMode,
        target: &[String],
        options: &RecordOptions,
        context: &mut ProfileContext,
    ) -> Result<ProfilerCommand, PluginError> {
        let output = match mode {
            ProfilerRunMode::Container => Path::new("/workspace/profile.json").to_path_buf(),
            ProfilerRunMode::Host => options.cwd.join(".uniprof-ruby.speedscope.json"),
        };
        context.register_temp_file(&output);
        context.set_raw_artifact(RawArtifactType::Speedscope, &output);

        let mut cmd = ProfilerCommand::new("rbspy")
            .arg("record")
            .arg("--format")
            .arg("speedscope")
            .arg("--file")
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
            return Err(PluginError::Other("ruby plugin produced no raw artifact".to_string()));
        };
        let contents = std::fs::read_to_string(&artifact.path)?;
        let mut file: SpeedscopeFile = SpeedscopeFile::read_from_str(&contents)
            .map_err(|e| PluginError::Other(e.to_string()))?;
        file.exporter = Some("uniprof-ruby".to_string());
        Ok(file)
    }

    fn profiler_process_names(&self) -> Vec<&'static str> {
        vec!["rbspy"]
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
    fn detects_ruby_interpreter_and_scripts() {
        let plugin = RubyPlugin::new();
        assert!(plugin.detect_command(Path::new("/usr/bin/ruby")));
        assert!(plugin.detect_command(Path::new("app.rb")));
        assert!(!plugin.detect_command(Path::new("app.py")));
    }
}
