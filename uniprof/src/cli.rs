//! `clap`-derived CLI surface (spec.md §6). Mirrors the teacher's
//! `samply::cli` shape: one top-level `Opt` with a `Subcommand` enum, each
//! variant flattening its own `Args` struct.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "uniprof",
    version,
    about = r#"
uniprof is a universal CPU profiler front-end for Python, Node.js, Ruby,
PHP, the JVM, .NET, BEAM, and native binaries.

EXAMPLES:
    # Detect the right profiler and analyze the result in one step:
    uniprof python app.py

    # Same thing, spelled out:
    uniprof record --analyze -- python app.py

    # Record only, to a specific file:
    uniprof record -o profile.json -- node server.js

    # Analyze a profile recorded earlier:
    uniprof analyze profile.json

    # Check which profilers are available on this machine:
    uniprof bootstrap
"#
)]
pub struct Opt {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// Check host environment readiness for every built-in plugin.
    Bootstrap(BootstrapArgs),

    /// Detect a profiler for the given command, run it, and write a
    /// canonical profile.
    Record(RecordArgs),

    /// Analyze a previously recorded canonical profile for hotspots.
    Analyze(AnalyzeArgs),

    /// Open a recorded profile in the bundled viewer.
    Visualize(VisualizeArgs),

    /// MCP tool-surface shim (protocol itself is an external collaborator).
    Mcp(McpArgs),
}

#[derive(Debug, Args)]
pub struct BootstrapArgs {
    /// Only check this plugin instead of every built-in one.
    #[arg(long)]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Host,
    Container,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Pretty,
    Json,
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Path to the final canonical JSON profile. Auto-generated under the
    /// system temp dir when omitted and `--analyze`/`--visualize` is given.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Inherit child stdio instead of capturing it.
    #[arg(short, long)]
    pub verbose: bool,

    /// Analyze the recorded profile immediately after recording.
    #[arg(long)]
    pub analyze: bool,

    /// Open the recorded profile in the bundled viewer immediately after
    /// recording. Mutually exclusive with `--analyze`.
    #[arg(long)]
    pub visualize: bool,

    /// Share the host network namespace with the container (container mode
    /// only).
    #[arg(long)]
    pub enable_host_networking: bool,

    /// `host`, `container`, or `auto` (default; consults the plugin, then
    /// probes for a container runtime).
    #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
    pub mode: ModeArg,

    /// Working directory used for both execution and container path
    /// mapping. Defaults to the current directory.
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Force a specific plugin by name, bypassing detection.
    #[arg(long)]
    pub platform: Option<String>,

    /// Output format for an inline `--analyze`.
    #[arg(long, value_enum, default_value_t = FormatArg::Pretty)]
    pub format: FormatArg,

    /// Extra arguments appended to the profiler command, after uniprof's
    /// own flags. May be repeated; each value is itself split through a
    /// quoted-argument tokenizer, so `"-F 500"` and two separate uses are
    /// equivalent.
    #[arg(long = "extra-profiler-args")]
    pub extra_profiler_args: Vec<String>,

    /// The command to profile, e.g. `python app.py`.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
    pub target: Vec<String>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Path to a canonical JSON profile written by `uniprof record`.
    pub file: PathBuf,

    /// Drop frames under this percent of total time.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Keep only frames whose name or `file:line` matches this regex.
    #[arg(long)]
    pub filter: Option<String>,

    /// Drop frames seen in fewer than this many samples.
    #[arg(long)]
    pub min_samples: Option<usize>,

    /// Truncate every sample to its leaf-most N frames before aggregating.
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = FormatArg::Pretty)]
    pub format: FormatArg,
}

#[derive(Debug, Args)]
pub struct VisualizeArgs {
    /// Path to a canonical JSON profile written by `uniprof record`.
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct McpArgs {
    #[command(subcommand)]
    pub action: McpAction,
}

#[derive(Debug, Subcommand)]
pub enum McpAction {
    /// Run the MCP server (external collaborator; not implemented here).
    Run,
    /// Install MCP tool registration for a given client (external
    /// collaborator; not implemented here).
    Install { client: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_shape_is_valid() {
        Opt::command().debug_assert();
    }

    #[test]
    fn record_requires_a_target_command() {
        let result = Opt::try_parse_from(["uniprof", "record", "--"]);
        assert!(result.is_err());
    }

    #[test]
    fn record_parses_a_target_after_double_dash() {
        let opt = Opt::try_parse_from(["uniprof", "record", "--", "python", "app.py"]).unwrap();
        match opt.action {
            Action::Record(args) => assert_eq!(args.target, vec!["python", "app.py"]),
            _ => panic!("expected Record"),
        }
    }
}
