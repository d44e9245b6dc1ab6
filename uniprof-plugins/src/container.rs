use std::path::{Path, PathBuf};

/// A bind mount from the host into the container.
#[derive(Debug, Clone)]
pub struct VolumeMount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

impl VolumeMount {
    pub fn new(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// `host:container[:ro]`, the form passed to `-v`.
    pub fn to_docker_arg(&self) -> String {
        if self.read_only {
            format!("{}:{}:ro", self.host_path.display(), self.container_path)
        } else {
            format!("{}:{}", self.host_path.display(), self.container_path)
        }
    }
}

pub const WORKSPACE_MOUNT: &str = "/workspace";

/// `<registry>/uniprof-<plugin>:latest` (spec.md §6 container contract).
pub fn default_image_reference(plugin_name: &str) -> String {
    format!("ghcr.io/uniprof-dev/uniprof-{plugin_name}:latest")
}

/// Capabilities every container run carries plus anything a plugin adds on
/// top via `container_capabilities()`.
pub fn base_capabilities() -> Vec<&'static str> {
    vec!["SYS_PTRACE"]
}

/// Builds the bash trampoline a container entrypoint runs: source the
/// image's bootstrap, then invoke the profiler, with `pre_args` (the
/// profiler's own flags) separated from `app_args` (the profiled command)
/// by a `::` sentinel so the bootstrap can tell them apart (spec.md §4.3
/// Phase 4, container sub-flow).
pub fn build_trampoline_script(
    profiler_program: &str,
    pre_args: &[String],
    app_args: &[String],
) -> String {
    let mut script = String::from("#!/usr/bin/env bash\nset -euo pipefail\n");
    script.push_str("source /usr/local/bin/bootstrap.sh\n\n");
    script.push_str(&shell_quote(profiler_program));
    for arg in pre_args {
        script.push(' ');
        script.push_str(&shell_quote(arg));
    }
    script.push_str(" ::");
    for arg in app_args {
        script.push(' ');
        script.push_str(&shell_quote(arg));
    }
    script.push('\n');
    script
}

fn shell_quote(s: &str) -> String {
    if s.chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:=+".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}

/// Rewrites a host-side path under `cwd` to its mount point inside the
/// container (spec.md §8 property 1, path mapping round-trip). Paths not
/// under `cwd` are returned unchanged.
pub fn to_container_path(cwd: &Path, path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    match pathdiff(&absolute, cwd) {
        Some(rel) if !rel.starts_with("..") => {
            let rel = rel.to_string_lossy().replace('\\', "/");
            PathBuf::from(format!("{WORKSPACE_MOUNT}/{rel}"))
        }
        _ => path.to_path_buf(),
    }
}

fn pathdiff(path: &Path, base: &Path) -> Option<PathBuf> {
    let path = clean_path(path);
    let base = clean_path(base);
    let rel = path.strip_prefix(&base).ok()?;
    Some(rel.to_path_buf())
}

fn clean_path(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_and_absolute_paths_under_cwd_map_identically() {
        let cwd = Path::new("/home/u/project");
        let abs = to_container_path(cwd, Path::new("/home/u/project/src/main.rs"));
        let rel = to_container_path(cwd, Path::new("src/main.rs"));
        assert_eq!(abs, PathBuf::from("/workspace/src/main.rs"));
        assert_eq!(rel, abs);
    }

    #[test]
    fn path_outside_cwd_is_returned_unchanged() {
        let cwd = Path::new("/home/u/project");
        let outside = to_container_path(cwd, Path::new("/etc/hosts"));
        assert_eq!(outside, PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn trampoline_separates_pre_and_app_args_with_sentinel() {
        let script = build_trampoline_script(
            "py-spy",
            &["record".to_string(), "--rate".to_string(), "999".to_string()],
            &["python".to_string(), "app.py".to_string()],
        );
        assert!(script.contains("py-spy record --rate 999 :: python app.py"));
    }

    #[test]
    fn trampoline_quotes_args_with_special_characters() {
        let script = build_trampoline_script("cmd", &[], &["--cfg=value with spaces".to_string()]);
        assert!(script.contains("'--cfg=value with spaces'"));
    }
}
