//! CLI front-end (spec.md §6): alias parsing, subcommand routing, and the
//! single place that maps `RecordError`/`AnalyzeError` kinds to process exit
//! codes, the same shape as the teacher's `do_record_action`/`main` match in
//! `samply/src/main.rs`.

mod alias;
mod bootstrap_cmd;
mod cli;
mod mcp_cmd;
mod record_cmd;
mod visualize_cmd;

use clap::Parser;

fn main() {
    env_logger::init();

    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let normalized = alias::normalize(&raw_args);

    let mut full_args = vec!["uniprof".to_string()];
    full_args.extend(normalized);

    let opt = match cli::Opt::try_parse_from(full_args) {
        Ok(opt) => opt,
        Err(err) => err.exit(),
    };

    let exit_code = match opt.action {
        cli::Action::Bootstrap(args) => bootstrap_cmd::run(args),
        cli::Action::Record(args) => record_cmd::run_record(args),
        cli::Action::Analyze(args) => record_cmd::run_analyze(args),
        cli::Action::Visualize(args) => visualize_cmd::run(args),
        cli::Action::Mcp(args) => mcp_cmd::run(args),
    };

    std::process::exit(exit_code);
}
