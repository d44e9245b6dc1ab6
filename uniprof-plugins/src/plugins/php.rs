use std::path::Path;

use uniprof_schema::SpeedscopeFile;

use crate::context::{ProfileContext, ProfilerRunMode, RawArtifactType, RecordOptions};
use crate::error::PluginError;
use crate::plugin::{EnvironmentCheck, PlatformPlugin, ProfilerCommand};

use super::basename;

const EXECUTABLES: &[&str] = &["php", "composer"];
const EXTENSIONS: &[&str] = &["php"];
const DEFAULT_HZ: f64 = 999.0;

/// Excimer integration (spec.md §4.4 "PHP"). Unlike py-spy/rbspy, Excimer is
/// a PHP extension, not a standalone sampler: we inject a generated
/// bootstrap script via `auto_prepend_file` and a drop-in ini directory
/// (`PHP_INI_SCAN_DIR`), leaving the user's own argv (`php`, `composer`, …)
/// untouched.
pub struct PhpPlugin;

impl PhpPlugin {
    pub fn new() -> Self {
        Self
    }

    fn period_seconds(extra_args: &[String]) -> f64 {
        for (i, arg) in extra_args.iter().enumerate() {
            if arg == "--period" {
                if let Some(value) = extra_args.get(i + 1).and_then(|v| v.parse::<f64>().ok()) {
                    return value;
                }
            }
            if let Some(value) = arg.strip_prefix("--period=") {
                if let Ok(value) = value.parse::<f64>() {
                    return value;
                }
            }
        }
        1.0 / DEFAULT_HZ
    }

    fn bootstrap_script(output_path: &Path, period_seconds: f64) -> String {
        format!(
            r#"<?php
if (extension_loaded('excimer')) {{
    $profiler = new ExcimerProfiler();
    $profiler->setPeriod({period});
    $profiler->setEventType(EXCIMER_REAL);
    $profiler->start();
    register_shutdown_function(function () use ($profiler) {{
        $profiler->stop();
        $log = $profiler->getLog();
        file_put_contents({path}, json_encode($log->getSpeedscopeData()));
    }});
}}
"#,
            period = period_seconds,
            path = php_string_literal(&output_path.to_string_lossy()),
        )
    }
}

fn php_string_literal(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

impl Default for PhpPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformPlugin for PhpPlugin {
    fn name(&self) -> &'static str {
        "php"
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
        let php = which::which("php");
        if php.is_err() {
            return EnvironmentCheck::missing("php was not found in PATH");
        }
        EnvironmentCheck::ok()
    }

    fn default_container_image(&self) -> Option<&'static str> {
        Some("php")
    }

    fn build_command(
        &self,
        _mode: ProfilerRunMode,
        target: &[String],
        options: &RecordOptions,
        context: &mut ProfileContext,
    ) -> Result<ProfilerCommand, PluginError> {
        let scan_dir = options.cwd.join(".uniprof-php-ini");
        std::fs::create_dir_all(&scan_dir)?;
        context.register_temp_dir(&scan_dir);

        let output = options.cwd.join(".uniprof-php.speedscope.json");
        context.register_temp_file(&output);
        context.set_raw_artifact(RawArtifactType::Speedscope, &output);

        let bootstrap_path = scan_dir.join("uniprof-bootstrap.php");
        let period = Self::period_seconds(&options.extra_profiler_args);
        std::fs::write(&bootstrap_path, Self::bootstrap_script(&output, period))?;
        context.register_temp_file(&bootstrap_path);

        let ini_path = scan_dir.join("99-uniprof.ini");
        std::fs::write(
            &ini_path,
            format!(
                "auto_prepend_file={}\n",
                bootstrap_path.to_string_lossy()
            ),
        )?;
        context.register_temp_file(&ini_path);

        let existing_scan_dir = std::env::var("PHP_INI_SCAN_DIR").unwrap_or_default();
        let merged_scan_dir = if existing_scan_dir.is_empty() {
            scan_dir.to_string_lossy().to_string()
        } else {
            format!("{}:{}", scan_dir.to_string_lossy(), existing_scan_dir)
        };
        context.add_runtime_env("PHP_INI_SCAN_DIR", merged_scan_dir);

        let mut cmd = ProfilerCommand::new(&target[0]);
        cmd = cmd.args(target[1..].iter().cloned());
        Ok(cmd)
    }

    fn post_process(
        &self,
        context: &ProfileContext,
        _profile_name: &str,
    ) -> Result<SpeedscopeFile, PluginError> {
        let Some(artifact) = &context.raw_artifact else {
            return Err(PluginError::Other("php plugin produced no raw artifact".to_string()));
        };
        let contents = std::fs::read_to_string(&artifact.path)?;
        let mut file: SpeedscopeFile = SpeedscopeFile::read_from_str(&contents)
            .map_err(|e| PluginError::Other(e.to_string()))?;
        file.exporter = Some("uniprof-php".to_string());
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_php_launcher_and_scripts() {
        let plugin = PhpPlugin::new();
        assert!(plugin.detect_command(Path::new("/usr/bin/php")));
        assert!(plugin.detect_command(Path::new("index.php")));
        assert!(!plugin.detect_command(Path::new("index.js")));
    }

    #[test]
    fn period_defaults_to_999hz() {
        let period = PhpPlugin::period_seconds(&[]);
        assert!((period - 1.0 / 999.0).abs() < 1e-9);
    }

    #[test]
    fn period_honors_explicit_flag() {
        let period = PhpPlugin::period_seconds(&["--period".to_string(), "0.002".to_string()]);
        assert!((period - 0.002).abs() < 1e-12);
    }
}
