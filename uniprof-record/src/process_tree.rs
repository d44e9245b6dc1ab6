//! Process-tree discovery for the two-stage Ctrl+C handler (spec.md §5,
//! §8 property 3 "process-tree closure"). Parses `/proc/<pid>/stat` for
//! `(pid, ppid)` pairs, matching the teacher's own `/proc` parsing style in
//! `linux/proc_maps.rs` (hand-rolled field splitting, no external crate).

use std::collections::{HashSet, VecDeque};
use std::fs;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    pub comm: String,
}

/// Reads the whole system process table from `/proc`. Entries that vanish
/// mid-scan (process exited) or that we fail to parse are skipped rather
/// than aborting the scan.
#[cfg(target_os = "linux")]
pub fn read_process_table() -> Vec<ProcessInfo> {
    let mut out = Vec::new();
    let Ok(entries) = fs::read_dir("/proc") else {
        return out;
    };
    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let stat_path = entry.path().join("stat");
        let Ok(contents) = fs::read_to_string(&stat_path) else {
            continue;
        };
        if let Some(info) = parse_stat_line(pid, &contents) {
            out.push(info);
        }
    }
    out
}

#[cfg(not(target_os = "linux"))]
pub fn read_process_table() -> Vec<ProcessInfo> {
    Vec::new()
}

/// Parses a `/proc/<pid>/stat` line. The `comm` field is parenthesized and
/// may itself contain spaces or parentheses, so we split on the *last* `)`
/// rather than tokenizing naively.
fn parse_stat_line(pid: u32, line: &str) -> Option<ProcessInfo> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if close <= open {
        return None;
    }
    let comm = line[open + 1..close].to_string();
    let rest = line[close + 1..].trim_start();
    let mut fields = rest.split_whitespace();
    let _state = fields.next()?;
    let ppid: u32 = fields.next()?.parse().ok()?;
    Some(ProcessInfo { pid, ppid, comm })
}

/// Computes the transitive closure of descendants of `root` and excludes
/// denylisted pids from the *result*, without pruning traversal through
/// them — a denylisted process's own children still count (spec.md §8
/// property 3, scenario S4: denylisting the profiler's direct child must
/// not hide the grandchildren it spawned). `root` itself is never included.
pub fn descendants(table: &[ProcessInfo], root: u32, denylist: &HashSet<String>) -> Vec<u32> {
    let mut children_of: std::collections::HashMap<u32, Vec<&ProcessInfo>> = Default::default();
    for info in table {
        children_of.entry(info.ppid).or_default().push(info);
    }

    let mut result = Vec::new();
    let mut queue: VecDeque<u32> = VecDeque::new();
    queue.push_back(root);
    let mut visited: HashSet<u32> = HashSet::from([root]);

    while let Some(pid) = queue.pop_front() {
        let Some(children) = children_of.get(&pid) else {
            continue;
        };
        for child in children {
            if !visited.insert(child.pid) {
                continue;
            }
            queue.push_back(child.pid);
            if !denylist.contains(&child.comm) {
                result.push(child.pid);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proc(pid: u32, ppid: u32, comm: &str) -> ProcessInfo {
        ProcessInfo {
            pid,
            ppid,
            comm: comm.to_string(),
        }
    }

    #[test]
    fn s4_descendants_exclude_denylisted_pid_but_include_its_children() {
        // 100 -> 101, 102; 101 -> 103. 101 runs "py-spy" and is denylisted.
        let table = vec![
            proc(101, 100, "py-spy"),
            proc(102, 100, "worker"),
            proc(103, 101, "python"),
        ];
        let denylist: HashSet<String> = ["py-spy".to_string()].into_iter().collect();
        let result = descendants(&table, 100, &denylist);
        assert!(!result.contains(&101), "denylisted pid must not appear");
        assert!(result.contains(&102));
        // 103 is a grandchild reached through the denylisted 101; traversal
        // still passes through 101, it's just excluded from the result set.
        assert!(result.contains(&103));
    }

    #[test]
    fn transitive_closure_reaches_grandchildren() {
        let table = vec![proc(2, 1, "a"), proc(3, 2, "b"), proc(4, 3, "c")];
        let result = descendants(&table, 1, &HashSet::new());
        assert_eq!(result.len(), 3);
        assert!(result.contains(&4));
    }

    #[test]
    fn parses_stat_line_with_parens_in_comm() {
        let line = "123 (my (weird) prog) S 45 123 123 0 -1 4194304 100 0 0 0 1 1 0 0 20 0 1 0";
        let info = parse_stat_line(123, line).unwrap();
        assert_eq!(info.comm, "my (weird) prog");
        assert_eq!(info.ppid, 45);
    }
}
