use std::path::{Path, PathBuf};
use std::process::Command;

use uniprof_convert::instruments_xml;
use uniprof_schema::SpeedscopeFile;

use crate::context::ProfileContext;
use crate::error::PluginError;
use crate::plugin::{EnvironmentCheck, ProfilerCommand};

const TIME_PROFILE_XPATH: &str =
    r#"/trace-toc[1]/run[1]/data[1]/table[@schema="time-profile"]"#;

/// macOS Instruments integration, composed into `NativePlugin` on Darwin
/// hosts (spec.md §4.4 "xctrace / Instruments", §9 composition over
/// subclassing). Host-only: `xctrace` has no containerized equivalent.
pub struct XctraceHelper;

impl XctraceHelper {
    pub fn new() -> Self {
        Self
    }

    pub fn check_environment(&self) -> EnvironmentCheck {
        if which::which("xctrace").is_ok() {
            EnvironmentCheck::ok()
        } else {
            EnvironmentCheck::missing(
                "xctrace was not found; install Xcode command line tools (`xcode-select --install`)",
            )
        }
    }

    /// `xctrace`'s own process name (spec.md §4.1 `getProfilerProcessNames()`).
    pub fn process_names(&self) -> Vec<&'static str> {
        vec!["xctrace"]
    }

    /// Resolves an `.app` bundle to its real executable by reading
    /// `CFBundleExecutable` out of `Contents/Info.plist` via `PlistBuddy`,
    /// then validates that file exists and is executable.
    pub fn resolve_app_bundle(&self, bundle: &Path) -> Result<PathBuf, PluginError> {
        let info_plist = bundle.join("Contents/Info.plist");
        let output = Command::new("/usr/libexec/PlistBuddy")
            .arg("-c")
            .arg("Print :CFBundleExecutable")
            .arg(&info_plist)
            .output()
            .map_err(|e| PluginError::Spawn(e.to_string()))?;
        if !output.status.success() {
            return Err(PluginError::Other(format!(
                "could not read CFBundleExecutable from {}",
                info_plist.display()
            )));
        }
        let executable_name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let executable = bundle.join("Contents/MacOS").join(executable_name);
        if !executable.is_file() {
            return Err(PluginError::Other(format!(
                "bundle executable {} does not exist",
                executable.display()
            )));
        }
        Ok(executable)
    }

    pub fn record_command(&self, trace_dir: &Path, target: &[String]) -> ProfilerCommand {
        let mut cmd = ProfilerCommand::new("xctrace")
            .arg("record")
            .arg("--template")
            .arg("Time Profiler")
            .arg("--output")
            .arg(trace_dir.to_string_lossy().to_string())
            .arg("--launch")
            .arg("--");
        cmd = cmd.args(target.iter().cloned());
        cmd
    }

    fn export_command(&self, trace_dir: &Path) -> ProfilerCommand {
        ProfilerCommand::new("xctrace")
            .arg("export")
            .arg("--input")
            .arg(trace_dir.to_string_lossy().to_string())
            .arg("--xpath")
            .arg(TIME_PROFILE_XPATH)
    }

    pub fn post_process(
        &self,
        _context: &ProfileContext,
        trace_dir: &Path,
        profile_name: &str,
    ) -> Result<SpeedscopeFile, PluginError> {
        let output = self
            .export_command(trace_dir)
            .to_std_command()
            .output()
            .map_err(|e| PluginError::Spawn(e.to_string()))?;
        if !output.status.success() {
            return Err(PluginError::Spawn(format!(
                "xctrace export exited with {}",
                output.status
            )));
        }
        let xml = String::from_utf8_lossy(&output.stdout);
        instruments_xml::convert(&xml, profile_name).map_err(PluginError::Convert)
    }
}

impl Default for XctraceHelper {
    fn default() -> Self {
        Self::new()
    }
}
