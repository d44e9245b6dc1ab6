use std::path::Path;

use uniprof_convert::v8_ticks;
use uniprof_schema::SpeedscopeFile;

use crate::context::{ProfileContext, ProfilerRunMode, RawArtifactType, RecordOptions};
use crate::error::PluginError;
use crate::plugin::{EnvironmentCheck, PlatformPlugin, ProfilerCommand};

use super::basename;

const EXECUTABLES: &[&str] = &["node", "npm", "npx", "yarn", "pnpm"];
const EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "ts"];

/// `0x` integration (spec.md §4.4 "Node.js"). `0x` writes a `ticks.json`
/// artifact into its own output directory; post-processing hands that off
/// to the V8 ticks converter.
pub struct NodejsPlugin;

impl NodejsPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NodejsPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPlugin for NodejsPlugin {
    fn name(&self) -> &'static str {
        "nodejs"
    }

    fn detect_command(&self, binary: &Path) -> bool {
        let name = basename(binary);
        if EXECUTABLES.contains(&name.as_str()) {
            return true;
        }
        if name == "npm" {
            return true;
        }
        super::extension(binary).map(|e| EXTENSIONS.contains(&e.as_str())).unwrap_or(false)
    }

    fn check_environment(&self, mode: ProfilerRunMode) -> EnvironmentCheck {
        if mode == ProfilerRunMode::Container {
            return EnvironmentCheck::ok();
        }
        if which::which("0x").is_err() {
            EnvironmentCheck::missing("0x was not found in PATH; install with `npm install -g 0x`")
        } else {
            EnvironmentCheck::ok()
        }
    }

    fn default_container_image(&self) -> Option<&'static str> {
        Some("nodejs")
    }

    fn build_command(
        &self,
        _mode: ProfilerRunMode,
        target: &[String],
        options: &RecordOptions,
        context: &mut ProfileContext,
    ) -> Result<ProfilerCommand, PluginError> {
        let output_dir = options.cwd.join(".uniprof-0x-profile");
        context.register_temp_dir(&output_dir);
        context.set_raw_artifact(RawArtifactType::Ticks, output_dir.join("ticks.json"));

        let extra = strip_output_dir_flag(&options.extra_profiler_args);

        let mut cmd = ProfilerCommand::new("0x")
            .arg("--output-dir")
            .arg(output_dir.to_string_lossy().to_string())
            .args(extra)
            .arg("--");
        cmd = cmd.args(target.iter().cloned());
        Ok(cmd)
    }

    fn post_process(
        &self,
        context: &ProfileContext,
        profile_name: &str,
    ) -> Result<SpeedscopeFile, PluginError> {
        let Some(artifact) = &context.raw_artifact else {
            return Err(PluginError::Other("nodejs plugin produced no raw artifact".to_string()));
        };
        let contents = std::fs::read_to_string(&artifact.path)?;
        v8_ticks::convert(&contents, profile_name).map_err(PluginError::Convert)
    }

    fn profiler_process_names(&self) -> Vec<&'static str> {
        vec!["0x"]
    }
}

/// 0x controls its own output directory; strip any user-supplied
/// `--output-dir`/`-o` so ours wins (spec.md §4.4: "Output-directory flag
/// stripped from extra args").
fn strip_output_dir_flag(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--output-dir" || arg == "-o" {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--output-dir=") {
            continue;
        }
        out.push(arg.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_node_launchers_and_scripts() {
        let plugin = NodejsPlugin::new();
        assert!(plugin.detect_command(Path::new("/usr/bin/node")));
        assert!(plugin.detect_command(Path::new("server.js")));
        assert!(!plugin.detect_command(Path::new("server.rb")));
    }

    #[test]
    fn strips_user_supplied_output_dir() {
        let args = vec!["--output-dir".to_string(), "/tmp/x".to_string(), "--kernel-tracing".to_string()];
        assert_eq!(strip_output_dir_flag(&args), vec!["--kernel-tracing".to_string()]);
    }
}
