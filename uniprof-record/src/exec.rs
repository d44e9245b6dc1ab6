//! Host-mode subprocess execution (spec.md §4.3 Phase 4 "Host sub-flow").
//!
//! Spawns the profiler with stdin inherited, stdout/stderr inherited in
//! verbose mode or else captured on background threads, and classifies the
//! exit status per spec.md §4.3 "Exit code classification".

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use crate::signal::TwoStageSigint;

/// Outcome of a completed (or cancelled) host subprocess run.
pub enum ExecOutcome {
    Success,
    Cancelled,
    Failed { captured_stdout: String, captured_stderr: String },
}

/// Runs `cmd`, draining captured output fully before classifying the exit
/// code (spec.md §4.3 "Wait for exit; drain captured streams fully before
/// classifying the exit code").
pub fn run_host_command(
    mut cmd: Command,
    verbose: bool,
    sigint: Option<&TwoStageSigint>,
) -> std::io::Result<ExecOutcome> {
    cmd.stdin(Stdio::inherit());
    if verbose {
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
    } else {
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
    }

    let mut child = cmd.spawn()?;

    let stdout_handle = (!verbose).then(|| drain_in_background(child.stdout.take()));
    let stderr_handle = (!verbose).then(|| drain_in_background(child.stderr.take()));

    let status = child.wait()?;

    let captured_stdout = stdout_handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();
    let captured_stderr = stderr_handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default();

    Ok(classify_exit(status, captured_stdout, captured_stderr, sigint))
}

fn drain_in_background<R>(stream: Option<R>) -> thread::JoinHandle<String>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_string(&mut buf);
        }
        buf
    })
}

/// `0`: success. `130`/`143`, `SIGINT`/`SIGTERM`, or the hard-exit flag:
/// cancellation. Anything else: failure carrying captured output.
fn classify_exit(
    status: ExitStatus,
    captured_stdout: String,
    captured_stderr: String,
    sigint: Option<&TwoStageSigint>,
) -> ExecOutcome {
    if status.success() {
        return ExecOutcome::Success;
    }

    if let Some(sigint) = sigint {
        if sigint.is_hard_exit() || sigint.interrupt_count() > 0 {
            return ExecOutcome::Cancelled;
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if matches!(status.signal(), Some(libc::SIGINT) | Some(libc::SIGTERM)) {
            return ExecOutcome::Cancelled;
        }
    }

    if matches!(status.code(), Some(130) | Some(143)) {
        return ExecOutcome::Cancelled;
    }

    ExecOutcome::Failed {
        captured_stdout,
        captured_stderr,
    }
}

/// `sudo` prefix applied when `plugin.needsSudo()` is true (spec.md §4.3
/// "If needsSudo(), prepend sudo").
pub fn prepend_sudo(program: &str, args: &[String]) -> Command {
    let mut cmd = Command::new("sudo");
    cmd.arg(program);
    cmd.args(args);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_command_classifies_as_success() {
        let mut cmd = Command::new("true");
        cmd.stdin(Stdio::null());
        let outcome = run_host_command(cmd, false, None).unwrap();
        assert!(matches!(outcome, ExecOutcome::Success));
    }

    #[test]
    fn failing_command_captures_stderr() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo boom >&2; exit 7");
        let outcome = run_host_command(cmd, false, None).unwrap();
        match outcome {
            ExecOutcome::Failed { captured_stderr, .. } => {
                assert!(captured_stderr.contains("boom"));
            }
            _ => panic!("expected Failed"),
        }
    }

    #[test]
    fn sigint_exit_code_classifies_as_cancelled() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("kill -INT $$");
        let outcome = run_host_command(cmd, false, None).unwrap();
        assert!(matches!(outcome, ExecOutcome::Cancelled));
    }
}
