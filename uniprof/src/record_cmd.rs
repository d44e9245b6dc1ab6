//! `record` and `analyze` subcommand handlers (spec.md §4.3, §4.6, §7 error
//! policy table).

use std::path::PathBuf;

use uniprof_analyze::{format, AnalyzeOptions};
use uniprof_plugins::{ModeSelector, OutputFormat as PluginOutputFormat, PluginRegistry, RecordOptions};
use uniprof_record::{ErrorKind, RecordError, RecordRequest};
use uniprof_schema::SpeedscopeFile;

use crate::cli::{AnalyzeArgs, FormatArg, ModeArg, RecordArgs};

pub fn run_record(args: RecordArgs) -> i32 {
    if args.analyze && args.visualize {
        eprintln!("error: --analyze and --visualize cannot be used together");
        return 1;
    }

    let cwd = match args.cwd.clone() {
        Some(cwd) => cwd,
        None => match std::env::current_dir() {
            Ok(cwd) => cwd,
            Err(err) => {
                eprintln!("error: could not determine the current directory: {err}");
                return 1;
            }
        },
    };

    let extra_profiler_args = uniprof_plugins::plugins::split_extra_args(&args.extra_profiler_args);

    let record_format = match (args.format, args.analyze) {
        (FormatArg::Json, true) => PluginOutputFormat::Json,
        _ => PluginOutputFormat::Pretty,
    };

    let options = RecordOptions {
        output: args.output.clone(),
        verbose: args.verbose,
        extra_profiler_args,
        mode: match args.mode {
            ModeArg::Host => ModeSelector::Host,
            ModeArg::Container => ModeSelector::Container,
            ModeArg::Auto => ModeSelector::Auto,
        },
        cwd,
        enable_host_networking: args.enable_host_networking,
        platform: args.platform.clone(),
        format: record_format,
    };

    let registry = PluginRegistry::with_builtins();
    let request = RecordRequest {
        target_argv: args.target.clone(),
        options,
    };

    match uniprof_record::run(&registry, request) {
        Ok(outcome) => {
            log::info!(
                "recorded {} profile with {} to {}",
                format_mode(outcome.mode),
                outcome.plugin_name,
                outcome.output_path.display()
            );

            if args.analyze {
                let analyze_format = match args.format {
                    FormatArg::Pretty => format::OutputFormat::Pretty,
                    FormatArg::Json => format::OutputFormat::Json,
                };
                analyze_file(&outcome.output_path, &AnalyzeOptions::default(), analyze_format)
            } else if args.visualize {
                crate::visualize_cmd::open_path(&outcome.output_path)
            } else {
                println!(
                    "wrote {}\nrun `uniprof analyze {}` to inspect hotspots, or `uniprof visualize {}` to view it",
                    outcome.output_path.display(),
                    outcome.output_path.display(),
                    outcome.output_path.display()
                );
                0
            }
        }
        Err(err) => report_record_error(&err),
    }
}

fn format_mode(mode: uniprof_plugins::ProfilerRunMode) -> &'static str {
    match mode {
        uniprof_plugins::ProfilerRunMode::Host => "host",
        uniprof_plugins::ProfilerRunMode::Container => "container",
    }
}

fn report_record_error(err: &RecordError) -> i32 {
    match err.kind() {
        ErrorKind::Cancellation => {
            eprintln!("Profiling cancelled by user");
        }
        ErrorKind::Environment => {
            eprintln!("error: {err}");
            if let RecordError::Environment {
                setup_instructions, ..
            } = err
            {
                for line in setup_instructions {
                    eprintln!("  - {line}");
                }
            }
        }
        ErrorKind::PathMapping => {
            eprintln!("error: {err}");
        }
        _ => {
            eprintln!("error: {err}");
        }
    }
    err.exit_code()
}

pub fn run_analyze(args: AnalyzeArgs) -> i32 {
    let options = AnalyzeOptions {
        threshold: args.threshold,
        filter_regex: args.filter.clone(),
        min_samples: args.min_samples,
        max_depth: args.max_depth,
    };
    let format = match args.format {
        FormatArg::Pretty => format::OutputFormat::Pretty,
        FormatArg::Json => format::OutputFormat::Json,
    };
    analyze_file(&args.file, &options, format)
}

fn analyze_file(path: &PathBuf, options: &AnalyzeOptions, format: format::OutputFormat) -> i32 {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            eprintln!("error: could not read {}: {err}", path.display());
            return 1;
        }
    };

    let file: SpeedscopeFile = match SpeedscopeFile::read_from_str(&contents) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("error: could not parse {} as a canonical profile: {err}", path.display());
            return 1;
        }
    };

    let result = match uniprof_analyze::analyze(&file, options) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };

    match format {
        format::OutputFormat::Pretty => {
            println!("{}", format::render_pretty(&result.summary, &result.hotspots));
        }
        format::OutputFormat::Json => match format::render_json(&result.summary, &result.hotspots) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("error: failed to render JSON: {err}");
                return 1;
            }
        },
    }
    0
}
