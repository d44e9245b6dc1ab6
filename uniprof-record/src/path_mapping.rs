//! Phase 2 path validation for container runs (spec.md §4.3 Phase 2).
//!
//! Every argv element after the first (the target binary/command itself) is
//! classified as mapped, unmapped-positional (hard error), or
//! unmapped-embedded (warning only, since uniprof cannot know a flag's
//! value schema). Both absolute and relative paths under `cwd` are rewritten
//! to the `/workspace` mount point; WSL-style `/mnt/<drive>/...` paths are
//! normalized first so a Windows-style absolute path inside the project
//! still maps correctly.

use std::path::{Path, PathBuf};

use uniprof_plugins::container::to_container_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgClassification {
    /// Not a path, or a path already under `cwd`: rewritten in place.
    Mapped(String),
    /// An absolute path outside `cwd` appearing as its own argv element.
    UnmappedPositional(PathBuf),
    /// An absolute path outside `cwd` embedded in an option value
    /// (`--cfg=/abs/...` or the separated `--cfg /abs/...` form).
    UnmappedEmbedded(PathBuf),
}

/// Result of mapping a full argv: the rewritten args plus any warnings, or a
/// hard failure carrying every unmapped positional path (spec.md §4.3 Phase
/// 2 "Positional unmapped paths abort with error").
pub struct MappingResult {
    pub mapped_args: Vec<String>,
    pub warnings: Vec<String>,
}

/// Maps `argv[1..]` (the first element, the target binary, is handled by the
/// plugin separately) into container form under `cwd`.
pub fn map_argv(cwd: &Path, argv: &[String]) -> Result<MappingResult, Vec<PathBuf>> {
    let mut mapped_args = Vec::with_capacity(argv.len());
    let mut warnings = Vec::new();
    let mut unmapped_positional = Vec::new();

    // A bare flag (`--cfg`, not `--cfg=...`) makes its following value
    // "embedded" rather than positional: we can't know the flag's value
    // schema, so a path there only warns (spec.md §4.3 Phase 2, the
    // separated `--cfg /abs/...` form).
    let mut previous_was_bare_flag = false;

    for arg in argv.iter() {
        let treat_as_embedded = previous_was_bare_flag;
        previous_was_bare_flag = is_bare_flag(arg);

        match classify_arg(cwd, arg, treat_as_embedded) {
            ArgClassification::Mapped(rewritten) => mapped_args.push(rewritten),
            ArgClassification::UnmappedPositional(path) => {
                unmapped_positional.push(path);
                mapped_args.push(arg.clone());
            }
            ArgClassification::UnmappedEmbedded(path) => {
                warnings.push(format!(
                    "argument {arg:?} contains a path ({}) outside the working directory; \
                     it will not be visible inside the container",
                    path.display()
                ));
                mapped_args.push(arg.clone());
            }
        }
    }

    if !unmapped_positional.is_empty() {
        return Err(unmapped_positional);
    }

    Ok(MappingResult {
        mapped_args,
        warnings,
    })
}

fn is_bare_flag(arg: &str) -> bool {
    arg.starts_with('-') && !arg.contains('=')
}

fn classify_arg(cwd: &Path, arg: &str, treat_as_embedded: bool) -> ArgClassification {
    if let Some((flag, value)) = split_embedded_flag(arg) {
        return match classify_path_value(cwd, value) {
            Some(PathVerdict::Under(container_path)) => {
                ArgClassification::Mapped(format!("{flag}={container_path}"))
            }
            Some(PathVerdict::Outside(host_path)) => ArgClassification::UnmappedEmbedded(host_path),
            None => ArgClassification::Mapped(arg.to_string()),
        };
    }

    match classify_path_value(cwd, arg) {
        Some(PathVerdict::Under(container_path)) => ArgClassification::Mapped(container_path),
        Some(PathVerdict::Outside(host_path)) => {
            if treat_as_embedded {
                ArgClassification::UnmappedEmbedded(host_path)
            } else {
                ArgClassification::UnmappedPositional(host_path)
            }
        }
        None => ArgClassification::Mapped(arg.to_string()),
    }
}

enum PathVerdict {
    Under(String),
    Outside(PathBuf),
}

fn classify_path_value(cwd: &Path, value: &str) -> Option<PathVerdict> {
    let normalized = normalize_wsl_path(value);
    let path = Path::new(&normalized);
    if !looks_like_absolute_path(&normalized) && !looks_like_relative_path(cwd, &normalized) {
        return None;
    }

    let mapped = to_container_path(cwd, path);
    if mapped.to_string_lossy().starts_with(uniprof_plugins::container::WORKSPACE_MOUNT) {
        Some(PathVerdict::Under(mapped.to_string_lossy().into_owned()))
    } else {
        Some(PathVerdict::Outside(path.to_path_buf()))
    }
}

/// Path-likeness heuristic for a non-absolute value (spec.md §4.3 Phase 2
/// "Under `cwd`, all absolute and relative paths are rewritten"): a relative
/// value is treated as a path when it contains a separator (`src/main.py`)
/// or when it resolves to something that actually exists under `cwd`
/// (`app.py` with no separator). A bare token like `"999"` matches neither
/// and passes through unchanged.
fn looks_like_relative_path(cwd: &Path, value: &str) -> bool {
    if value.is_empty() || Path::new(value).is_absolute() {
        return false;
    }
    if value.contains('/') || value.contains('\\') {
        return true;
    }
    cwd.join(value).exists()
}

fn split_embedded_flag(arg: &str) -> Option<(&str, &str)> {
    if !arg.starts_with('-') {
        return None;
    }
    arg.split_once('=')
}

fn looks_like_absolute_path(s: &str) -> bool {
    Path::new(s).is_absolute() || is_windows_style_absolute(s)
}

fn is_windows_style_absolute(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
}

/// Rewrites a Windows-style absolute path (`C:\Users\...`) to the WSL mount
/// form (`/mnt/c/Users/...`) so it compares equal to a `cwd` expressed the
/// way a WSL process actually sees it (spec.md §4.3 Phase 2 "Under a WSL
/// layout (`/mnt/<drive>/...`), Windows-style absolute paths within cwd are
/// normalized to the same mount"). Paths already in `/mnt/...` form, or any
/// other path, pass through unchanged.
fn normalize_wsl_path(value: &str) -> String {
    if is_windows_style_absolute(value) {
        let drive = value.as_bytes()[0].to_ascii_lowercase() as char;
        let tail = &value[2..].replace('\\', "/");
        let tail = tail.strip_prefix('/').unwrap_or(tail);
        return format!("/mnt/{drive}/{tail}");
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_path_under_cwd_is_rewritten() {
        let cwd = Path::new("/home/u/project");
        let result = map_argv(cwd, &["src/main.py".to_string()]).unwrap();
        assert_eq!(result.mapped_args, vec!["/workspace/src/main.py".to_string()]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn positional_path_outside_cwd_aborts() {
        let cwd = Path::new("/home/u/project");
        let err = map_argv(cwd, &["/etc/passwd".to_string()]).unwrap_err();
        assert_eq!(err, vec![PathBuf::from("/etc/passwd")]);
    }

    #[test]
    fn embedded_path_outside_cwd_only_warns() {
        let cwd = Path::new("/home/u/project");
        let result = map_argv(cwd, &["--cfg=/etc/app.conf".to_string()]).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.mapped_args, vec!["--cfg=/etc/app.conf".to_string()]);
    }

    #[test]
    fn separated_flag_value_path_outside_cwd_only_warns() {
        let cwd = Path::new("/home/u/project");
        let result = map_argv(
            cwd,
            &["--cfg".to_string(), "/etc/app.conf".to_string()],
        )
        .unwrap();
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn embedded_path_under_cwd_is_rewritten_in_place() {
        let cwd = Path::new("/home/u/project");
        let result = map_argv(cwd, &["--cfg=config/app.toml".to_string()]).unwrap();
        assert_eq!(
            result.mapped_args,
            vec!["--cfg=/workspace/config/app.toml".to_string()]
        );
    }

    #[test]
    fn non_path_args_pass_through_unchanged() {
        let cwd = Path::new("/home/u/project");
        let result = map_argv(cwd, &["--rate".to_string(), "999".to_string()]).unwrap();
        assert_eq!(result.mapped_args, vec!["--rate".to_string(), "999".to_string()]);
    }

    #[test]
    fn windows_style_path_under_wsl_cwd_normalizes_to_mount() {
        let cwd = Path::new("/mnt/c/Users/u/project");
        let result =
            map_argv(cwd, &["C:\\Users\\u\\project\\app.py".to_string()]).unwrap();
        assert_eq!(result.mapped_args, vec!["/workspace/app.py".to_string()]);
    }

    #[test]
    fn bare_relative_filename_existing_under_cwd_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), b"").unwrap();
        let result = map_argv(dir.path(), &["app.py".to_string()]).unwrap();
        assert_eq!(result.mapped_args, vec!["/workspace/app.py".to_string()]);
    }

    #[test]
    fn bare_non_path_token_without_matching_file_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let result = map_argv(dir.path(), &["999".to_string()]).unwrap();
        assert_eq!(result.mapped_args, vec!["999".to_string()]);
    }
}
