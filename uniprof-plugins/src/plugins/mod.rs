pub mod beam;
pub mod dotnet;
pub mod jvm;
pub mod native;
pub mod nodejs;
pub mod perf;
pub mod php;
pub mod python;
pub mod ruby;
pub mod xctrace;

/// Splits a quoted-argument string the way the CLI's alias parser does for
/// `extraProfilerArgs` elements (spec.md §4.3 Phase 1 step 4): `"-F 500"` and
/// `["-F","500"]` must be equivalent. Grounded on `shlex`, which the
/// workspace already depends on for the same purpose in the CLI crate.
pub fn split_extra_args(raw: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for item in raw {
        match shlex::split(item) {
            Some(tokens) => out.extend(tokens),
            None => out.push(item.clone()),
        }
    }
    out
}

pub fn basename(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn extension(path: &std::path::Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_extra_args_normalizes_quoted_and_array_forms() {
        let quoted = split_extra_args(&["-F 500".to_string()]);
        let array = split_extra_args(&["-F".to_string(), "500".to_string()]);
        assert_eq!(quoted, array);
    }
}
