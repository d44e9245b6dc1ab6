use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Evicts least-recently-used files under a managed directory once it grows
/// past a byte budget. A synchronous, directory-scanning cousin of
/// `samply-quota-manager`'s `QuotaManager`: that crate tracks file access in
/// a sqlite-backed inventory and evicts from a background tokio task, which
/// is more machinery than a per-plugin dependency cache directory needs here
/// — this walks the directory tree on demand instead.
pub struct QuotaManager {
    root: PathBuf,
    max_size_bytes: u64,
}

#[derive(Debug, Clone)]
struct TrackedFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

impl QuotaManager {
    pub fn new(root: impl Into<PathBuf>, max_size_bytes: u64) -> Self {
        Self {
            root: root.into(),
            max_size_bytes,
        }
    }

    /// Walks `root` recursively, deleting the oldest-by-mtime files first
    /// until total size is back under budget. Best-effort: unreadable
    /// entries are skipped rather than aborting the whole prune.
    pub fn prune(&self) -> std::io::Result<Vec<PathBuf>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        collect_files(&self.root, &mut files);

        let total: u64 = files.iter().map(|f| f.size).sum();
        if total <= self.max_size_bytes {
            return Ok(Vec::new());
        }

        files.sort_by_key(|f| f.modified);

        let mut removed = Vec::new();
        let mut remaining = total;
        for file in files {
            if remaining <= self.max_size_bytes {
                break;
            }
            if fs::remove_file(&file.path).is_ok() {
                remaining = remaining.saturating_sub(file.size);
                removed.push(file.path);
            }
        }
        Ok(removed)
    }
}

fn collect_files(dir: &Path, out: &mut Vec<TrackedFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if metadata.is_dir() {
            collect_files(&path, out);
        } else if metadata.is_file() {
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            out.push(TrackedFile {
                path,
                size: metadata.len(),
                modified,
            });
        }
    }
}

/// `<user-cache>/uniprof/<plugin>/<hash-of-cwd>` (spec.md §6 persisted state
/// layout).
pub fn plugin_cache_dir(cache_base: &Path, plugin_name: &str, cwd: &Path) -> PathBuf {
    cache_base
        .join("uniprof")
        .join(plugin_name)
        .join(hash_of_cwd(cwd))
}

fn hash_of_cwd(cwd: &Path) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = rustc_hash::FxHasher::default();
    cwd.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn prunes_oldest_files_first_until_under_budget() {
        let dir = tempfile::tempdir().unwrap();
        for (name, size) in [("a", 10), ("b", 10), ("c", 10)] {
            let path = dir.path().join(name);
            let mut f = fs::File::create(&path).unwrap();
            f.write_all(&vec![0u8; size]).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let manager = QuotaManager::new(dir.path(), 15);
        let removed = manager.prune().unwrap();
        assert!(!removed.is_empty());
        let total: u64 = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.metadata().unwrap().len())
            .sum();
        assert!(total <= 15);
    }

    #[test]
    fn no_prune_needed_under_budget() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a"), b"hi").unwrap();
        let manager = QuotaManager::new(dir.path(), 1_000_000);
        assert!(manager.prune().unwrap().is_empty());
    }

    #[test]
    fn cache_dir_is_stable_for_same_cwd() {
        let base = Path::new("/cache");
        let cwd = Path::new("/home/u/project");
        assert_eq!(
            plugin_cache_dir(base, "python", cwd),
            plugin_cache_dir(base, "python", cwd)
        );
    }
}
