use std::path::Path;

use uniprof_schema::SpeedscopeFile;

use crate::context::{ProfileContext, ProfilerRunMode, RawArtifactType, RecordOptions};
use crate::error::PluginError;
use crate::plugin::{EnvironmentCheck, PlatformPlugin, ProfilerCommand};

use super::basename;
use super::perf::{PerfConfig, PerfHelper};

const EXECUTABLES: &[&str] = &["elixir", "erl", "escript", "mix", "iex"];
const EXTENSIONS: &[&str] = &["escript"];

/// BEAM integration (spec.md §4.4 "BEAM"): composes an internal `perf`
/// configured with `callGraph=fp`, `hasJIT=true`,
/// `treatExecutableAsCommand=true` so `elixir`/`erl`/`escript`/`mix` run
/// directly under `perf record` rather than being treated as a workspace
/// binary to copy in. `ERL_FLAGS="+JPperf true"` enables BEAM's JIT
/// perf-map emission; `perf inject --jit` stitches it into the recording
/// before `perf script`. Host mode only — the BEAM JIT perf-map support is
/// Linux-specific.
pub struct BeamPlugin {
    perf: PerfHelper,
}

impl BeamPlugin {
    pub fn new() -> Self {
        Self {
            perf: PerfHelper::new(PerfConfig {
                call_graph: "fp",
                has_jit: true,
                treat_executable_as_command: true,
            }),
        }
    }
}

impl Default for BeamPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPlugin for BeamPlugin {
    fn name(&self) -> &'static str {
        "beam"
    }

    fn detect_command(&self, binary: &Path) -> bool {
        let name = basename(binary);
        EXECUTABLES.contains(&name.as_str())
            || super::extension(binary).map(|e| EXTENSIONS.contains(&e.as_str())).unwrap_or(false)
    }

    fn check_environment(&self, mode: ProfilerRunMode) -> EnvironmentCheck {
        if !cfg!(target_os = "linux") {
            return EnvironmentCheck::missing("BEAM profiling via perf is only supported on Linux");
        }
        if mode == ProfilerRunMode::Container {
            return EnvironmentCheck::ok();
        }
        self.perf.check_environment()
    }

    fn default_container_image(&self) -> Option<&'static str> {
        Some("beam")
    }

    fn build_command(
        &self,
        _mode: ProfilerRunMode,
        target: &[String],
        options: &RecordOptions,
        context: &mut ProfileContext,
    ) -> Result<ProfilerCommand, PluginError> {
        let perf_data = options.cwd.join(".uniprof-beam.perf.data");
        context.register_temp_file(&perf_data);
        context.set_raw_artifact(RawArtifactType::PerfData, &perf_data);
        context.sampling_hz = Some(999.0);
        context.add_runtime_env("ERL_FLAGS", "+JPperf true");

        Ok(self.perf.build_record_command(
            Path::new(""),
            target,
            &perf_data,
            &options.extra_profiler_args,
        ))
    }

    fn post_process(
        &self,
        context: &ProfileContext,
        profile_name: &str,
    ) -> Result<SpeedscopeFile, PluginError> {
        let Some(artifact) = &context.raw_artifact else {
            return Err(PluginError::Other("beam plugin produced no raw artifact".to_string()));
        };
        self.perf.post_process(context, &artifact.path, profile_name)
    }

    fn profiler_process_names(&self) -> Vec<&'static str> {
        self.perf.process_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_beam_launchers() {
        let plugin = BeamPlugin::new();
        assert!(plugin.detect_command(Path::new("/usr/bin/elixir")));
        assert!(plugin.detect_command(Path::new("mix")));
        assert!(!plugin.detect_command(Path::new("python")));
    }
}
