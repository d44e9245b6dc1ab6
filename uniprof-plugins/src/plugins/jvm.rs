use std::path::Path;

use uniprof_convert::folded_stack;
use uniprof_schema::SpeedscopeFile;

use crate::context::{ProfileContext, ProfilerRunMode, RawArtifactType, RecordOptions};
use crate::error::PluginError;
use crate::plugin::{EnvironmentCheck, PlatformPlugin, ProfilerCommand};

use super::basename;

const EXECUTABLES: &[&str] = &["java", "gradlew", "mvnw"];
const EXTENSIONS: &[&str] = &["jar"];
const DEFAULT_HZ: f64 = 999.0;

/// async-profiler integration (spec.md §4.4 "JVM"). For `java` the agent
/// option is spliced after JVM options and before the main class/jar; for
/// `./gradlew`/`./mvnw` it's injected via `JAVA_TOOL_OPTIONS`/`MAVEN_OPTS`
/// since we can't safely rewrite a wrapper script's argv.
pub struct JvmPlugin;

impl JvmPlugin {
    pub fn new() -> Self {
        Self
    }

    fn agent_path(&self) -> String {
        std::env::var("UNIPROF_ASYNC_PROFILER_PATH")
            .unwrap_or_else(|_| "/opt/async-profiler/lib/libasyncProfiler.so".to_string())
    }

    fn interval_ns(extra_args: &[String]) -> u64 {
        for (i, arg) in extra_args.iter().enumerate() {
            if arg == "--interval" {
                if let Some(value) = extra_args.get(i + 1).and_then(|v| v.parse::<u64>().ok()) {
                    return value;
                }
            }
        }
        (1_000_000_000.0 / DEFAULT_HZ) as u64
    }

    fn agent_option(&self, collapsed_path: &Path, interval_ns: u64) -> String {
        format!(
            "-agentpath:{}=start,event=cpu,interval={},file={},collapsed",
            self.agent_path(),
            interval_ns,
            collapsed_path.to_string_lossy()
        )
    }

    /// Splits a `java` argv into `(jvm_options, rest)`: everything starting
    /// with `-` up to (not including) the first positional argument, which
    /// is either `-jar <file>` or the main class.
    fn split_jvm_options(args: &[String]) -> (Vec<String>, Vec<String>) {
        let mut jvm_options = Vec::new();
        let mut i = 0;
        while i < args.len() {
            let arg = &args[i];
            if arg == "-jar" || arg == "-cp" || arg == "-classpath" {
                jvm_options.push(arg.clone());
                if let Some(next) = args.get(i + 1) {
                    jvm_options.push(next.clone());
                    i += 2;
                } else {
                    i += 1;
                }
                if arg == "-jar" {
                    break;
                }
                continue;
            }
            if arg.starts_with('-') {
                jvm_options.push(arg.clone());
                i += 1;
            } else {
                break;
            }
        }
        (jvm_options, args[i..].to_vec())
    }
}

impl Default for JvmPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPlugin for JvmPlugin {
    fn name(&self) -> &'static str {
        "jvm"
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
        if !Path::new(&self.agent_path()).exists() {
            return EnvironmentCheck::missing(
                "libasyncProfiler.so was not found; set UNIPROF_ASYNC_PROFILER_PATH or install async-profiler",
            );
        }
        EnvironmentCheck::ok()
    }

    fn default_container_image(&self) -> Option<&'static str> {
        Some("jvm")
    }

    fn build_command(
        &self,
        _mode: ProfilerRunMode,
        target: &[String],
        options: &RecordOptions,
        context: &mut ProfileContext,
    ) -> Result<ProfilerCommand, PluginError> {
        let collapsed = options.cwd.join(".uniprof-jvm.collapsed.txt");
        context.register_temp_file(&collapsed);
        context.set_raw_artifact(RawArtifactType::Collapsed, &collapsed);

        let interval_ns = Self::interval_ns(&options.extra_profiler_args);
        let agent_option = self.agent_option(&collapsed, interval_ns);
        let launcher = basename(Path::new(&target[0]));

        match launcher.as_str() {
            "gradlew" => {
                context.add_runtime_env("JAVA_TOOL_OPTIONS", agent_option);
                Ok(ProfilerCommand::new(&target[0]).args(target[1..].iter().cloned()))
            }
            "mvnw" => {
                context.add_runtime_env("MAVEN_OPTS", agent_option);
                Ok(ProfilerCommand::new(&target[0]).args(target[1..].iter().cloned()))
            }
            _ => {
                let (jvm_options, rest) = Self::split_jvm_options(&target[1..]);
                let mut cmd = ProfilerCommand::new(&target[0]).args(jvm_options);
                cmd = cmd.arg(agent_option);
                cmd = cmd.args(rest);
                Ok(cmd)
            }
        }
    }

    fn post_process(
        &self,
        context: &ProfileContext,
        profile_name: &str,
    ) -> Result<SpeedscopeFile, PluginError> {
        let Some(artifact) = &context.raw_artifact else {
            return Err(PluginError::Other("jvm plugin produced no raw artifact".to_string()));
        };
        let contents = std::fs::read_to_string(&artifact.path)?;
        folded_stack::convert(&contents, profile_name, "uniprof-jvm", clean_java_method_name)
            .map_err(PluginError::Convert)
    }
}

fn clean_java_method_name(raw: &str) -> String {
    folded_stack::clean_java_method_name(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_java_and_wrappers() {
        let plugin = JvmPlugin::new();
        assert!(plugin.detect_command(Path::new("/usr/bin/java")));
        assert!(plugin.detect_command(Path::new("./gradlew")));
        assert!(plugin.detect_command(Path::new("app.jar")));
    }

    #[test]
    fn splits_jvm_options_before_main_class() {
        let args = vec![
            "-Xmx512m".to_string(),
            "-Dfoo=bar".to_string(),
            "com.example.Main".to_string(),
            "arg1".to_string(),
        ];
        let (jvm_options, rest) = JvmPlugin::split_jvm_options(&args);
        assert_eq!(jvm_options, vec!["-Xmx512m".to_string(), "-Dfoo=bar".to_string()]);
        assert_eq!(rest, vec!["com.example.Main".to_string(), "arg1".to_string()]);
    }

    #[test]
    fn splits_jvm_options_before_jar_flag_value() {
        let args = vec!["-jar".to_string(), "app.jar".to_string(), "arg1".to_string()];
        let (jvm_options, rest) = JvmPlugin::split_jvm_options(&args);
        assert_eq!(jvm_options, vec!["-jar".to_string(), "app.jar".to_string()]);
        assert_eq!(rest, vec!["arg1".to_string()]);
    }
}
