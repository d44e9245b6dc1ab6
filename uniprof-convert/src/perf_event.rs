/// A single parsed stack frame from a perf-script event, before it has been
/// interned into a canonical `Frame`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfStackFrame {
    pub address: String,
    pub symbol_name: String,
    pub file: String,
}

/// One perf-script event: a header line plus its stack. Frames are already
/// ordered outermost-caller to innermost-callee by the time this is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfEvent {
    pub command: String,
    pub process_id: Option<u32>,
    pub thread_id: u32,
    pub time: f64,
    pub event_type: String,
    pub stack: Vec<PerfStackFrame>,
}

impl PerfEvent {
    /// Key used to group events into per-thread canonical profiles, matching
    /// spec.md §4.5.1: `"command (pid: P, tid: T)"` or the narrower
    /// `"command (tid: T)"` when no pid was present on the header line.
    pub fn thread_profile_name(&self) -> String {
        match self.process_id {
            Some(pid) => format!("{} (pid: {}, tid: {})", self.command, pid, self.thread_id),
            None => format!("{} (tid: {})", self.command, self.thread_id),
        }
    }
}
