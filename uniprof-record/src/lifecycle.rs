//! Profiling lifecycle orchestrator (spec.md §4.3): the six phases that turn
//! a resolved plugin and target command into a canonical profile on disk.
//! Each phase is a free function so the CLI can drive them directly and so
//! tests can exercise path mapping/signal/exit-code classification without
//! spawning a real profiler.

use std::path::{Path, PathBuf};
use std::time::Duration;

use uniprof_plugins::{
    ModeSelector, OutputFormat, PlatformPlugin, PluginRegistry, ProfileContext, ProfilerRunMode,
    RecordOptions,
};

use crate::error::RecordError;
use crate::exec::{run_host_command, ExecOutcome};
use crate::path_mapping;
use crate::signal::{self, TwoStageSigint};

/// Everything Phase 1 needs: the raw argv (`argv[0]` is the target binary or
/// interpreter, the rest are its own arguments) plus the user's options.
/// `options.platform` doubles as the explicit plugin override.
pub struct RecordRequest {
    pub target_argv: Vec<String>,
    pub options: RecordOptions,
}

/// What a successful run produced.
pub struct RecordOutcome {
    pub output_path: PathBuf,
    pub plugin_name: &'static str,
    pub mode: ProfilerRunMode,
}

/// Runs all six phases in order. `registry` is created once at process
/// start by the caller (spec.md §4.2 "Created once at process start").
pub fn run(registry: &PluginRegistry, request: RecordRequest) -> Result<RecordOutcome, RecordError> {
    let RecordRequest {
        target_argv,
        mut options,
    } = request;

    let platform_override = options.platform.clone();
    let (plugin, mode) = resolve(registry, &target_argv, &options, platform_override.as_deref())?;

    // Phase 2: in container mode the target must already be path-mapped into
    // container form before the plugin builds its command (spec.md §4.3
    // Phase 2; `PlatformPlugin::build_command` doc). Only `target_argv[1..]`
    // (the command's own arguments) are classified/rewritten — the binary
    // itself at index 0 is the plugin's concern, not a path argument.
    let container_target_argv = if mode == ProfilerRunMode::Container {
        let mapped_args = validate_paths(&options.cwd, &target_argv[1..])?;
        let mut mapped = Vec::with_capacity(target_argv.len());
        mapped.push(target_argv[0].clone());
        mapped.extend(mapped_args);
        Some(mapped)
    } else {
        None
    };

    let output_path = prepare_output(&options)?;
    options.output = Some(output_path.clone());

    let mut context = ProfileContext::new();
    let outcome = match mode {
        ProfilerRunMode::Container => execute_container(
            plugin.as_ref(),
            container_target_argv.as_deref().unwrap_or(&target_argv),
            &options,
            &mut context,
        ),
        ProfilerRunMode::Host => execute_host(plugin.as_ref(), &target_argv, &options, &mut context),
    };

    let post_process_result = outcome.and_then(|()| {
        post_process(plugin.as_ref(), &context, &output_path, &options)
    });

    context.cleanup();

    let output_path = post_process_result?;
    Ok(RecordOutcome {
        output_path,
        plugin_name: plugin.name(),
        mode,
    })
}

/// Phase 1 — Resolve: pick the plugin and the run mode.
fn resolve(
    registry: &PluginRegistry,
    target_argv: &[String],
    options: &RecordOptions,
    platform_override: Option<&str>,
) -> Result<(std::sync::Arc<dyn PlatformPlugin>, ProfilerRunMode), RecordError> {
    let Some(binary) = target_argv.first() else {
        return Err(RecordError::UserInput("no target command given".to_string()));
    };

    let plugin = match platform_override {
        Some(name) => registry
            .get(name)
            .ok_or_else(|| RecordError::UserInput(format!("unknown platform {name:?}")))?,
        None => registry
            .detect_from_command(Path::new(binary))
            .ok_or_else(|| {
                RecordError::UserInput(format!(
                    "could not detect a profiler for {binary:?}; pass --platform explicitly"
                ))
            })?,
    };

    let mode = resolve_mode(plugin.as_ref(), target_argv, options)?;

    if mode == ProfilerRunMode::Host && cfg!(target_os = "windows") {
        return Err(RecordError::UserInput(
            "host mode is not supported on Windows; use --mode container".to_string(),
        ));
    }

    if mode == ProfilerRunMode::Container
        && cfg!(target_os = "macos")
        && plugin.name() == "native"
        && is_macho(Path::new(binary))
    {
        return Err(RecordError::UserInput(
            "native Mach-O binaries can only be profiled in host mode on macOS".to_string(),
        ));
    }

    Ok((plugin, mode))
}

fn is_macho(path: &Path) -> bool {
    matches!(
        uniprof_plugins::binary_validator::detect_binary_format(path),
        Some(uniprof_plugins::binary_validator::BinaryFormat::MachO)
    )
}

/// `auto` consults the plugin's own hint first, then probes for a working
/// container runtime (spec.md §4.3 Phase 1 step 6).
fn resolve_mode(
    plugin: &dyn PlatformPlugin,
    target_argv: &[String],
    options: &RecordOptions,
) -> Result<ProfilerRunMode, RecordError> {
    match options.mode {
        ModeSelector::Host => Ok(ProfilerRunMode::Host),
        ModeSelector::Container => Ok(ProfilerRunMode::Container),
        ModeSelector::Auto => {
            if let Some(hint) = plugin.default_mode_hint(target_argv) {
                return Ok(hint);
            }
            if container_runtime_available() {
                Ok(ProfilerRunMode::Container)
            } else {
                Ok(ProfilerRunMode::Host)
            }
        }
    }
}

fn container_runtime_available() -> bool {
    which::which("docker").is_ok() || which::which("podman").is_ok()
}

/// Phase 2 — Path validation (container only). Aborts on positional
/// unmapped paths; logs warnings for embedded ones; returns the rewritten
/// args (absolute and relative in-cwd paths mapped to `/workspace/...`) so
/// the caller can thread them into the actual container invocation.
fn validate_paths(cwd: &Path, args_after_target: &[String]) -> Result<Vec<String>, RecordError> {
    match path_mapping::map_argv(cwd, args_after_target) {
        Ok(result) => {
            for warning in result.warnings {
                log::warn!("{warning}");
            }
            Ok(result.mapped_args)
        }
        Err(unmapped) => Err(RecordError::PathMapping(unmapped)),
    }
}

/// Phase 3 — Output preparation: resolve `output`, delete any stale file at
/// that path, and create its parent directory.
fn prepare_output(options: &RecordOptions) -> Result<PathBuf, RecordError> {
    let path = match &options.output {
        Some(path) => path.clone(),
        None => {
            let dir = std::env::temp_dir();
            dir.join(format!("uniprof-{}.json", uuid::Uuid::new_v4()))
        }
    };

    if path.is_dir() {
        return Err(RecordError::UserInput(format!(
            "output path {} is a directory",
            path.display()
        )));
    }
    if path.exists() {
        std::fs::remove_file(&path)?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(path)
}

/// Phase 4 — Execute (host sub-flow): environment checks, command
/// assembly, sudo prefixing, two-stage SIGINT wiring, spawn and wait.
fn execute_host(
    plugin: &dyn PlatformPlugin,
    target_argv: &[String],
    options: &RecordOptions,
    context: &mut ProfileContext,
) -> Result<(), RecordError> {
    let check = plugin.check_environment(ProfilerRunMode::Host);
    for warning in &check.warnings {
        log::warn!("{warning}");
    }
    if !check.is_ready() {
        return Err(RecordError::Environment {
            message: format!("{} is missing required tools", plugin.name()),
            setup_instructions: check.missing,
        });
    }

    let profiler_cmd = plugin.build_command(ProfilerRunMode::Host, target_argv, options, context)?;

    let mut cmd = if profiler_cmd.needs_elevated_privileges {
        crate::exec::prepend_sudo(&profiler_cmd.program, &profiler_cmd.args)
    } else {
        profiler_cmd.to_std_command()
    };
    cmd.current_dir(&options.cwd);
    if profiler_cmd.needs_elevated_privileges {
        for (key, value) in &profiler_cmd.env {
            cmd.env(key, value);
        }
    }
    for (key, value) in &context.runtime_env {
        cmd.env(key, value);
    }

    let extra_names = plugin.profiler_process_names();
    let denylist = signal::default_denylist(&profiler_cmd.program, &extra_names);
    let sigint = TwoStageSigint::install(std::process::id(), denylist).ok();

    let outcome = run_host_command(cmd, options.verbose, sigint.as_ref())
        .map_err(|e| RecordError::ExecutionFailure(e.to_string()))?;

    match outcome {
        ExecOutcome::Success => Ok(()),
        ExecOutcome::Cancelled => Err(RecordError::Cancellation),
        ExecOutcome::Failed {
            captured_stdout,
            captured_stderr,
        } => {
            if !captured_stdout.is_empty() {
                log::error!("{captured_stdout}");
            }
            if !captured_stderr.is_empty() {
                log::error!("{captured_stderr}");
            }
            Err(RecordError::ExecutionFailure(format!(
                "{} exited with an error",
                plugin.name()
            )))
        }
    }
}

/// Phase 4 — Execute (container sub-flow): validate the runtime, pull the
/// image (best-effort), install a UI-only SIGINT handler, and run the
/// plugin's trampoline inside `docker run`/`podman run`.
fn execute_container(
    plugin: &dyn PlatformPlugin,
    target_argv: &[String],
    options: &RecordOptions,
    context: &mut ProfileContext,
) -> Result<(), RecordError> {
    let runtime = container_runtime_binary()
        .ok_or_else(|| RecordError::Environment {
            message: "no working container runtime found".to_string(),
            setup_instructions: vec!["install Docker or Podman".to_string()],
        })?;

    let image = plugin
        .default_container_image()
        .map(uniprof_plugins::container::default_image_reference)
        .ok_or_else(|| {
            RecordError::UserInput(format!(
                "{} has no container image available on this platform",
                plugin.name()
            ))
        })?;

    let pull_status = std::process::Command::new(&runtime)
        .arg("pull")
        .arg(&image)
        .status();
    if let Err(err) = pull_status {
        log::warn!("failed to pull {image}: {err}");
    }

    let ui_only_hard_exit = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = ui_only_hard_exit.clone();
    let _ = ctrlc::set_handler(move || {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
        log::info!("stopping profiled program...");
    });

    let profiler_cmd = plugin.build_command(
        ProfilerRunMode::Container,
        target_argv,
        options,
        context,
    )?;

    let trampoline = uniprof_plugins::container::build_trampoline_script(
        &profiler_cmd.program,
        &profiler_cmd.args,
        &[],
    );

    let mut capabilities = uniprof_plugins::container::base_capabilities();
    capabilities.extend(plugin.container_capabilities());

    let mut cmd = std::process::Command::new(&runtime);
    cmd.arg("run").arg("--rm");
    for capability in capabilities {
        cmd.arg("--cap-add").arg(capability);
    }
    if options.enable_host_networking {
        cmd.arg("--network=host");
    }
    cmd.arg("-v").arg(format!(
        "{}:{}",
        options.cwd.display(),
        uniprof_plugins::container::WORKSPACE_MOUNT
    ));
    cmd.arg(&image).arg("bash").arg("-c").arg(&trampoline);
    cmd.stdin(std::process::Stdio::inherit());
    if options.verbose {
        cmd.stdout(std::process::Stdio::inherit());
        cmd.stderr(std::process::Stdio::inherit());
    }

    let status = cmd
        .status()
        .map_err(|e| RecordError::ExecutionFailure(e.to_string()))?;

    if ui_only_hard_exit.load(std::sync::atomic::Ordering::SeqCst) && !status.success() {
        return Err(RecordError::Cancellation);
    }
    if !status.success() {
        return Err(RecordError::ExecutionFailure(format!(
            "container run exited with {status}"
        )));
    }
    Ok(())
}

fn container_runtime_binary() -> Option<&'static str> {
    if which::which("docker").is_ok() {
        Some("docker")
    } else if which::which("podman").is_ok() {
        Some("podman")
    } else {
        None
    }
}

/// Phase 5 — Post-process: convert the raw artifact, write canonical JSON,
/// and report its size.
fn post_process(
    plugin: &dyn PlatformPlugin,
    context: &ProfileContext,
    output_path: &Path,
    options: &RecordOptions,
) -> Result<PathBuf, RecordError> {
    let profile_name = options
        .cwd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profile".to_string());

    let file = plugin
        .post_process(context, &profile_name)
        .map_err(|e| RecordError::Conversion(e.to_string()))?;

    let json = file
        .to_pretty_json()
        .map_err(|e| RecordError::Conversion(e.to_string()))?;
    std::fs::write(output_path, json)?;

    let size = std::fs::metadata(output_path).map(|m| m.len()).unwrap_or(0);
    log::info!("wrote {} ({} bytes)", output_path.display(), size);

    if options.format == OutputFormat::Json {
        log::info!("use `uniprof analyze {}` to inspect hotspots", output_path.display());
    }

    Ok(output_path.to_path_buf())
}

/// The spinner-idle pause `needsSudo()` hosts get before the password
/// prompt blocks the terminal (spec.md §4.3 "pause the spinner to allow the
/// password prompt").
pub fn sudo_prompt_pause() {
    std::thread::sleep(Duration::from_millis(50));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_defaults_under_temp_dir_when_omitted() {
        let options = RecordOptions {
            output: None,
            verbose: false,
            extra_profiler_args: Vec::new(),
            mode: ModeSelector::Host,
            cwd: std::env::temp_dir(),
            enable_host_networking: false,
            platform: None,
            format: OutputFormat::Pretty,
        };
        let path = prepare_output(&options).unwrap();
        assert!(path.starts_with(std::env::temp_dir()));
        assert!(path.to_string_lossy().ends_with(".json"));
    }

    #[test]
    fn output_path_rejects_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let options = RecordOptions {
            output: Some(dir.path().to_path_buf()),
            verbose: false,
            extra_profiler_args: Vec::new(),
            mode: ModeSelector::Host,
            cwd: dir.path().to_path_buf(),
            enable_host_networking: false,
            platform: None,
            format: OutputFormat::Pretty,
        };
        assert!(prepare_output(&options).is_err());
    }

    #[test]
    fn output_path_removes_stale_file_before_recreating() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        std::fs::write(&target, b"stale").unwrap();
        let options = RecordOptions {
            output: Some(target.clone()),
            verbose: false,
            extra_profiler_args: Vec::new(),
            mode: ModeSelector::Host,
            cwd: dir.path().to_path_buf(),
            enable_host_networking: false,
            platform: None,
            format: OutputFormat::Pretty,
        };
        let path = prepare_output(&options).unwrap();
        assert_eq!(path, target);
        assert!(!target.exists());
    }
}
