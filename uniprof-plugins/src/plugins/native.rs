use std::path::Path;

use uniprof_schema::SpeedscopeFile;

use crate::binary_validator::{detect_binary_format, BinaryFormat};
use crate::context::{ProfileContext, ProfilerRunMode, RawArtifactType, RecordOptions};
use crate::error::PluginError;
use crate::plugin::{EnvironmentCheck, PlatformPlugin, ProfilerCommand};

use super::perf::{self, PerfConfig, PerfHelper};
use super::xctrace::XctraceHelper;

/// Fallback plugin for raw ELF/Mach-O binaries with no more specific
/// language runtime attached (spec.md §4.1, §4.4 "Native perf (Linux)" and
/// "xctrace / Instruments (macOS)"). On Linux it composes `PerfHelper`; on
/// macOS it composes `XctraceHelper`. This composition, not a subclass
/// hierarchy, is what spec.md §9 calls out for the native/perf/xctrace
/// relationship.
pub struct NativePlugin {
    perf: PerfHelper,
    xctrace: XctraceHelper,
}

impl NativePlugin {
    pub fn new() -> Self {
        Self {
            perf: PerfHelper::new(PerfConfig::default()),
            xctrace: XctraceHelper::new(),
        }
    }

    fn is_macos(&self) -> bool {
        cfg!(target_os = "macos")
    }
}

impl Default for NativePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPlugin for NativePlugin {
    fn name(&self) -> &'static str {
        "native"
    }

    fn detect_command(&self, binary: &Path) -> bool {
        matches!(
            detect_binary_format(binary),
            Some(BinaryFormat::Elf) | Some(BinaryFormat::MachO)
        )
    }

    fn check_environment(&self, mode: ProfilerRunMode) -> EnvironmentCheck {
        if self.is_macos() {
            self.xctrace.check_environment()
        } else {
            match mode {
                ProfilerRunMode::Container => EnvironmentCheck::ok(),
                ProfilerRunMode::Host => self.perf.check_environment(),
            }
        }
    }

    fn default_container_image(&self) -> Option<&'static str> {
        if self.is_macos() {
            None
        } else {
            Some("native")
        }
    }

    fn build_command(
        &self,
        _mode: ProfilerRunMode,
        target: &[String],
        options: &RecordOptions,
        context: &mut ProfileContext,
    ) -> Result<ProfilerCommand, PluginError> {
        if self.is_macos() {
            let bundle_or_binary = Path::new(&target[0]);
            let executable = if bundle_or_binary.extension().map(|e| e == "app").unwrap_or(false) {
                self.xctrace.resolve_app_bundle(bundle_or_binary)?
            } else {
                bundle_or_binary.to_path_buf()
            };
            let trace_dir = options.cwd.join(".uniprof-native.trace");
            context.register_temp_dir(&trace_dir);
            context.set_raw_artifact(RawArtifactType::InstrumentsTrace, &trace_dir);
            let mut rest = target.to_vec();
            rest[0] = executable.to_string_lossy().to_string();
            return Ok(self.xctrace.record_command(&trace_dir, &rest));
        }

        let binary = Path::new(&target[0]);
        let workspace_binary = if binary.starts_with(&options.cwd) {
            binary.to_path_buf()
        } else {
            let copied = perf::copy_binary_into_workspace(binary, &options.cwd)?;
            copied
        };

        let perf_data = options.cwd.join(".uniprof-native.perf.data");
        context.register_temp_file(&perf_data);
        context.set_raw_artifact(RawArtifactType::PerfData, &perf_data);

        let mut cmd = self
            .perf
            .buildid_cache_add_command(&workspace_binary)
            .to_std_command();
        let status = cmd.status().map_err(|e| PluginError::Spawn(e.to_string()))?;
        if !status.success() {
            log::warn!("perf buildid-cache --add exited with {status}");
        }

        context.sampling_hz = Some(999.0);
        Ok(self.perf.build_record_command(
            &workspace_binary,
            &target[1..],
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
            return Err(PluginError::Other(
                "native plugin produced no raw artifact".to_string(),
            ));
        };
        if self.is_macos() {
            self.xctrace.post_process(context, &artifact.path, profile_name)
        } else {
            self.perf.post_process(context, &artifact.path, profile_name)
        }
    }

    fn container_capabilities(&self) -> Vec<&'static str> {
        vec!["SYS_ADMIN"]
    }

    fn default_mode_hint(&self, _target: &[String]) -> Option<ProfilerRunMode> {
        if self.is_macos() {
            Some(ProfilerRunMode::Host)
        } else {
            None
        }
    }

    fn profiler_process_names(&self) -> Vec<&'static str> {
        if self.is_macos() {
            self.xctrace.process_names()
        } else {
            self.perf.process_names()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_elf_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app");
        std::fs::write(&path, [0x7f, b'E', b'L', b'F', 0, 0]).unwrap();
        let plugin = NativePlugin::new();
        assert!(plugin.detect_command(&path));
    }

    #[test]
    fn rejects_non_binary_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.sh");
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        let plugin = NativePlugin::new();
        assert!(!plugin.detect_command(&path));
    }
}
