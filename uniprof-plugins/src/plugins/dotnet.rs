use std::path::Path;

use uniprof_schema::SpeedscopeFile;

use crate::binary_validator::contains_any_bytes;
use crate::context::{ProfileContext, ProfilerRunMode, RawArtifactType, RecordOptions};
use crate::error::PluginError;
use crate::plugin::{EnvironmentCheck, PlatformPlugin, ProfilerCommand};

use super::basename;

const EXECUTABLES: &[&str] = &["dotnet"];
const EXTENSIONS: &[&str] = &["dll", "exe", "cs"];

/// Size cap for the framework-dependent-launcher heuristic scan (spec.md §9
/// Open Questions: reading the whole binary to look for `DOTNET_BUNDLE` is
/// expensive for large executables; capping keeps detection cheap without
/// reducing accuracy on real shims, which embed the marker near the front).
const LAUNCHER_SCAN_CAP_BYTES: usize = 8 * 1024 * 1024;

/// dotnet-trace integration (spec.md §4.4 ".NET"). Emits a `.nettrace`
/// artifact; post-processing shells out to `dotnet-trace convert` since
/// nettrace's binary format has no pure-Rust decoder in this stack.
pub struct DotnetPlugin;

impl DotnetPlugin {
    pub fn new() -> Self {
        Self
    }

    /// Command transform rules (spec.md §4.4): `dotnet` preserved; `*.dll` →
    /// `dotnet <file>`; `*.exe` → run directly; `*.cs` → `dotnet run <file>
    /// -- <rest>`; unknown extensionless launchers are probed for
    /// framework-dependent markers.
    fn transform_target(&self, target: &[String]) -> Vec<String> {
        let binary = Path::new(&target[0]);
        let name = basename(binary);
        if name == "dotnet" {
            return target.to_vec();
        }
        match super::extension(binary).as_deref() {
            Some("dll") => {
                let mut out = vec!["dotnet".to_string(), target[0].clone()];
                out.extend(target[1..].iter().cloned());
                out
            }
            Some("exe") => target.to_vec(),
            Some("cs") => {
                let mut out = vec!["dotnet".to_string(), "run".to_string(), target[0].clone()];
                if target.len() > 1 {
                    out.push("--".to_string());
                    out.extend(target[1..].iter().cloned());
                }
                out
            }
            _ => {
                if looks_like_dotnet_launcher(binary) {
                    let mut out = vec!["dotnet".to_string(), target[0].clone()];
                    out.extend(target[1..].iter().cloned());
                    out
                } else {
                    target.to_vec()
                }
            }
        }
    }
}

fn looks_like_dotnet_launcher(binary: &Path) -> bool {
    contains_any_bytes(
        binary,
        &[b"DOTNET_BUNDLE", b"hostfxr", b"hostpolicy"],
        LAUNCHER_SCAN_CAP_BYTES,
    )
    .unwrap_or(false)
}

impl Default for DotnetPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPlugin for DotnetPlugin {
    fn name(&self) -> &'static str {
        "dotnet"
    }

    fn detect_command(&self, binary: &Path) -> bool {
        let name = basename(binary);
        EXECUTABLES.contains(&name.as_str())
            || super::extension(binary).map(|e| EXTENSIONS.contains(&e.as_str())).unwrap_or(false)
            || looks_like_dotnet_launcher(binary)
    }

    fn check_environment(&self, mode: ProfilerRunMode) -> EnvironmentCheck {
        if mode == ProfilerRunMode::Container {
            return EnvironmentCheck::ok();
        }
        if which::which("dotnet-trace").is_err() {
            return EnvironmentCheck::missing(
                "dotnet-trace was not found in PATH; install with `dotnet tool install --global dotnet-trace`",
            );
        }
        EnvironmentCheck::ok()
    }

    fn default_container_image(&self) -> Option<&'static str> {
        Some("dotnet")
    }

    fn build_command(
        &self,
        _mode: ProfilerRunMode,
        target: &[String],
        options: &RecordOptions,
        context: &mut ProfileContext,
    ) -> Result<ProfilerCommand, PluginError> {
        let nettrace = options.cwd.join(".uniprof-dotnet.nettrace");
        context.register_temp_file(&nettrace);
        context.set_raw_artifact(RawArtifactType::Nettrace, &nettrace);

        let transformed = self.transform_target(target);
        let extra = strip_output_flag(&options.extra_profiler_args);

        let cmd = ProfilerCommand::new("dotnet-trace")
            .arg("collect")
            .arg("--output")
            .arg(nettrace.to_string_lossy().to_string())
            .args(extra)
            .arg("--")
            .args(transformed);
        Ok(cmd)
    }

    fn post_process(
        &self,
        context: &ProfileContext,
        _profile_name: &str,
    ) -> Result<SpeedscopeFile, PluginError> {
        let Some(artifact) = &context.raw_artifact else {
            return Err(PluginError::Other("dotnet plugin produced no raw artifact".to_string()));
        };
        let speedscope_path = artifact.path.with_extension("speedscope.json");
        let status = ProfilerCommand::new("dotnet-trace")
            .arg("convert")
            .arg("--format")
            .arg("Speedscope")
            .arg("--output")
            .arg(speedscope_path.to_string_lossy().to_string())
            .arg(artifact.path.to_string_lossy().to_string())
            .to_std_command()
            .status()
            .map_err(|e| PluginError::Spawn(e.to_string()))?;
        if !status.success() {
            return Err(PluginError::Spawn(format!(
                "dotnet-trace convert exited with {status}"
            )));
        }
        let contents = std::fs::read_to_string(&speedscope_path)?;
        let mut file: SpeedscopeFile = SpeedscopeFile::read_from_str(&contents)
            .map_err(|e| PluginError::Other(e.to_string()))?;
        file.exporter = Some("uniprof-dotnet".to_string());
        Ok(file)
    }

    fn profiler_process_names(&self) -> Vec<&'static str> {
        vec!["dotnet-trace"]
    }
}

/// `dotnet-trace`'s own output flags are stripped from extra args so ours
/// wins (spec.md §4.4: "Output-flag overrides stripped from extra args").
fn strip_output_flag(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip_next = false;
    for arg in args {
        if skip_next {
            skip_next = false;
            continue;
        }
        if arg == "--output" || arg == "-o" {
            skip_next = true;
            continue;
        }
        if arg.starts_with("--output=") {
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
    fn dll_is_wrapped_with_dotnet() {
        let plugin = DotnetPlugin::new();
        let transformed = plugin.transform_target(&["app.dll".to_string(), "--flag".to_string()]);
        assert_eq!(transformed, vec!["dotnet".to_string(), "app.dll".to_string(), "--flag".to_string()]);
    }

    #[test]
    fn exe_runs_directly() {
        let plugin = DotnetPlugin::new();
        let transformed = plugin.transform_target(&["app.exe".to_string()]);
        assert_eq!(transformed, vec!["app.exe".to_string()]);
    }

    #[test]
    fn cs_file_uses_dotnet_run() {
        let plugin = DotnetPlugin::new();
        let transformed = plugin.transform_target(&["Program.cs".to_string(), "a".to_string()]);
        assert_eq!(
            transformed,
            vec![
                "dotnet".to_string(),
                "run".to_string(),
                "Program.cs".to_string(),
                "--".to_string(),
                "a".to_string()
            ]
        );
    }
}
