//! Top-level argv alias normalization (spec.md §6 "Alias normalization").
//!
//! `uniprof python app.py` has no recognized subcommand as its first token,
//! so it is rewritten to `uniprof record --analyze -- python app.py` before
//! `clap` ever sees it. `--visualize` among the leading options changes the
//! implicit action to `--visualize` instead of `--analyze`. This module only
//! ever looks at the argv *shape*; it knows nothing about what a plugin does
//! with the result.

const KNOWN_SUBCOMMANDS: &[&str] = &["bootstrap", "record", "analyze", "visualize", "mcp"];

const BOOLEAN_FLAGS: &[&str] = &[
    "-v",
    "--verbose",
    "--analyze",
    "--visualize",
    "--enable-host-networking",
];

const VALUE_FLAGS: &[&str] = &["-o", "--output", "--mode", "--cwd", "--platform", "--format"];

const EXTRA_PROFILER_ARGS_FLAG: &str = "--extra-profiler-args";

/// Rewrites `argv` (the program name already stripped) into a form that
/// always starts with a known subcommand. A no-op when `argv` already does,
/// which is what makes applying this twice idempotent (spec.md §8 property 2).
pub fn normalize(argv: &[String]) -> Vec<String> {
    let Some(first) = argv.first() else {
        return argv.to_vec();
    };

    if KNOWN_SUBCOMMANDS.contains(&first.as_str())
        || matches!(first.as_str(), "-h" | "--help" | "-V" | "--version")
    {
        return argv.to_vec();
    }

    let mut collected_options: Vec<String> = Vec::new();
    let mut i = 0;
    while i < argv.len() {
        let tok = &argv[i];
        if tok == EXTRA_PROFILER_ARGS_FLAG {
            i += 1;
            let (joined, consumed) = collect_extra_profiler_args(&argv[i..]);
            collected_options.push(EXTRA_PROFILER_ARGS_FLAG.to_string());
            collected_options.push(joined);
            i += consumed;
        } else if BOOLEAN_FLAGS.contains(&tok.as_str()) {
            collected_options.push(tok.clone());
            i += 1;
        } else if VALUE_FLAGS.contains(&tok.as_str()) {
            collected_options.push(tok.clone());
            if let Some(value) = argv.get(i + 1) {
                collected_options.push(value.clone());
            }
            i += 2;
        } else if let Some((flag, value)) = split_eq_flag(tok) {
            if VALUE_FLAGS.contains(&flag.as_str()) {
                collected_options.push(flag);
                collected_options.push(value);
                i += 1;
            } else {
                break;
            }
        } else {
            break;
        }
    }

    let target: Vec<String> = argv[i..].to_vec();

    let has_analyze = collected_options.iter().any(|o| o == "--analyze");
    let has_visualize = collected_options.iter().any(|o| o == "--visualize");
    if !has_analyze && !has_visualize {
        collected_options.push("--analyze".to_string());
    }

    let mut result = vec!["record".to_string()];
    result.extend(collected_options);
    result.push("--".to_string());
    result.extend(target);
    result
}

fn split_eq_flag(tok: &str) -> Option<(String, String)> {
    let (flag, value) = tok.split_once('=')?;
    if !flag.starts_with('-') {
        return None;
    }
    Some((flag.to_string(), value.to_string()))
}

/// Greedily collects `--extra-profiler-args`' own tokens: the mandatory
/// first token, then any further dash-prefixed tokens (flags or negative
/// numerics) and the plain values that immediately follow a dash-prefixed
/// one. Stops at the first plain token that follows another plain token —
/// that pair marks the start of the profiled command itself (spec.md §6
/// scenario S6: `--extra-profiler-args --rate 500 python app.py` yields the
/// token `"--rate 500"` and command `["python", "app.py"]`).
fn collect_extra_profiler_args(rest: &[String]) -> (String, usize) {
    let mut collected: Vec<String> = Vec::new();
    let mut prev_was_flag = false;
    let mut idx = 0;

    while idx < rest.len() {
        let tok = &rest[idx];
        let flag = is_flag(tok);
        let negative_number = is_negative_number(tok);

        if collected.is_empty() {
            // Mandatory first token for the flag.
            collected.push(tok.clone());
            prev_was_flag = flag;
            idx += 1;
            continue;
        }
        if flag || negative_number || prev_was_flag {
            collected.push(tok.clone());
            prev_was_flag = flag;
            idx += 1;
        } else {
            break;
        }
    }

    (collected.join(" "), idx)
}

/// A true flag: dash-prefixed and not itself parseable as a number (so a
/// following plain token is assumed to be its value).
fn is_flag(tok: &str) -> bool {
    tok.starts_with('-') && tok.parse::<f64>().is_err()
}

fn is_negative_number(tok: &str) -> bool {
    tok.starts_with('-') && tok[1..].parse::<f64>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_known_subcommand_rewrites_to_record_analyze() {
        let result = normalize(&v(&["python", "app.py"]));
        assert_eq!(result, v(&["record", "--analyze", "--", "python", "app.py"]));
    }

    #[test]
    fn visualize_flag_suppresses_default_analyze() {
        let result = normalize(&v(&["--visualize", "python", "app.py"]));
        assert_eq!(
            result,
            v(&["record", "--visualize", "--", "python", "app.py"])
        );
    }

    #[test]
    fn extra_profiler_args_collects_dashed_and_plain_tokens_then_stops_at_command() {
        let result = normalize(&v(&[
            "--extra-profiler-args",
            "--rate",
            "500",
            "python",
            "app.py",
        ]));
        assert_eq!(
            result,
            v(&[
                "record",
                "--extra-profiler-args",
                "--rate 500",
                "--analyze",
                "--",
                "python",
                "app.py",
            ])
        );
    }

    #[test]
    fn known_subcommands_pass_through_untouched() {
        let input = v(&["record", "--platform", "python", "--", "app.py"]);
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn applying_normalize_twice_is_idempotent() {
        let once = normalize(&v(&["python", "app.py"]));
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn applying_normalize_twice_is_idempotent_with_extra_profiler_args() {
        let once = normalize(&v(&[
            "--extra-profiler-args",
            "--rate",
            "500",
            "python",
            "app.py",
        ]));
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn negative_numeric_extra_profiler_args_are_collected() {
        let result = normalize(&v(&["--extra-profiler-args", "-5", "python", "app.py"]));
        assert_eq!(
            result,
            v(&[
                "record",
                "--extra-profiler-args",
                "-5",
                "--analyze",
                "--",
                "python",
                "app.py",
            ])
        );
    }
}
