//! Two-stage Ctrl+C handling during a host-mode profiler run (spec.md §5
//! "Cancellation and timeouts", §8 scenario S4).
//!
//! First SIGINT/SIGTERM: walk the profiler's process tree, denylist the
//! profiler's own internals, and send `SIGINT` to the survivors so the
//! *profiled program* stops while the profiler is left alone to finalize its
//! artifact. Second SIGINT within a 2-second window: mark a hard-exit flag,
//! signal the profiler process itself, and let the caller exit 130.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::process_tree::{descendants, read_process_table};

const INTERRUPT_WINDOW_MS: i64 = 2000;
const CHILD_DISCOVERY_RETRIES: u32 = 10;
const CHILD_DISCOVERY_RETRY_SPACING_MS: u64 = 100;

/// Shared state the `ctrlc` callback and the orchestrator both observe.
/// `AtomicI64` holds the millisecond timestamp of the last SIGINT we saw, or
/// `i64::MIN` before the first one.
pub struct TwoStageSigint {
    profiler_pid: u32,
    denylist: HashSet<String>,
    last_interrupt_ms: Arc<AtomicI64>,
    hard_exit: Arc<AtomicBool>,
    interrupt_count: Arc<AtomicI64>,
}

impl TwoStageSigint {
    /// Installs the process-wide `ctrlc` handler. Only one of these may be
    /// active at a time per process (spec.md §5: signal handler installation
    /// happens strictly before subprocess spawn, removal strictly after).
    pub fn install(profiler_pid: u32, denylist: HashSet<String>) -> Result<Self, ctrlc::Error> {
        let last_interrupt_ms = Arc::new(AtomicI64::new(i64::MIN));
        let hard_exit = Arc::new(AtomicBool::new(false));
        let interrupt_count = Arc::new(AtomicI64::new(0));

        let last_interrupt_ms_cb = last_interrupt_ms.clone();
        let hard_exit_cb = hard_exit.clone();
        let interrupt_count_cb = interrupt_count.clone();
        let denylist_cb = denylist.clone();

        ctrlc::set_handler(move || {
            let now = now_ms();
            let previous = last_interrupt_ms_cb.swap(now, Ordering::SeqCst);
            let count = interrupt_count_cb.fetch_add(1, Ordering::SeqCst) + 1;

            if count >= 2 && now - previous <= INTERRUPT_WINDOW_MS {
                log::warn!("second interrupt within window; hard-exiting");
                hard_exit_cb.store(true, Ordering::SeqCst);
                signal_profiler_and_children(profiler_pid, &denylist_cb, true);
            } else {
                log::info!("stopping profiled program...");
                signal_profiler_and_children(profiler_pid, &denylist_cb, false);
            }
        })?;

        Ok(Self {
            profiler_pid,
            denylist,
            last_interrupt_ms,
            hard_exit,
            interrupt_count,
        })
    }

    pub fn is_hard_exit(&self) -> bool {
        self.hard_exit.load(Ordering::SeqCst)
    }

    pub fn interrupt_count(&self) -> i64 {
        self.interrupt_count.load(Ordering::SeqCst)
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Sends SIGINT to the profiler's child tree (excluding the profiler's own
/// internals per the denylist), or on a second interrupt, also signals the
/// profiler process itself. Falls back to the process-group signal when
/// child discovery comes up empty after the retry window (spec.md §5
/// "Process-group signaling fallback", §9).
fn signal_profiler_and_children(profiler_pid: u32, denylist: &HashSet<String>, hard_exit: bool) {
    let mut candidates = discover_children_with_retry(profiler_pid, denylist);

    if candidates.is_empty() {
        #[cfg(unix)]
        {
            log::warn!(
                "no child processes discovered for pid {profiler_pid} after {CHILD_DISCOVERY_RETRIES} retries; \
                 falling back to process-group SIGINT"
            );
            send_sigint_to_group(profiler_pid);
        }
    } else {
        for pid in &candidates {
            send_sigint(*pid);
        }
    }

    if hard_exit {
        candidates.push(profiler_pid);
        send_sigint(profiler_pid);
    }
}

fn discover_children_with_retry(profiler_pid: u32, denylist: &HashSet<String>) -> Vec<u32> {
    for attempt in 0..CHILD_DISCOVERY_RETRIES {
        let table = read_process_table();
        let found = descendants(&table, profiler_pid, denylist);
        if !found.is_empty() || attempt == CHILD_DISCOVERY_RETRIES - 1 {
            return found;
        }
        std::thread::sleep(std::time::Duration::from_millis(
            CHILD_DISCOVERY_RETRY_SPACING_MS,
        ));
    }
    Vec::new()
}

#[cfg(unix)]
fn send_sigint(pid: u32) {
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGINT);
    }
}

#[cfg(not(unix))]
fn send_sigint(_pid: u32) {}

#[cfg(unix)]
fn send_sigint_to_group(pid: u32) {
    unsafe {
        libc::kill(-(pid as libc::pid_t), libc::SIGINT);
    }
}

/// Default denylist for a plugin: its profiler process names plus the
/// profiler binary itself (spec.md §4.3 Phase 4 "Apply the profiler's
/// process-name denylist").
pub fn default_denylist(profiler_binary: &str, extra_names: &[&str]) -> HashSet<String> {
    let mut set: HashSet<String> = extra_names.iter().map(|s| s.to_string()).collect();
    set.insert(profiler_binary.to_string());
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_denylist_includes_profiler_binary() {
        let set = default_denylist("py-spy", &["py-spy-internal"]);
        assert!(set.contains("py-spy"));
        assert!(set.contains("py-spy-internal"));
    }
}
