//! `bootstrap` subcommand: runs every plugin's environment check and prints
//! a combined readiness report (spec.md §6 CLI surface; grounded on
//! `PlatformPlugin::check_environment`/`EnvironmentCheck`, spec.md §4.1
//! "Environment checks").

use uniprof_plugins::{ProfilerRunMode, PluginRegistry};

use crate::cli::BootstrapArgs;

pub fn run(args: BootstrapArgs) -> i32 {
    let registry = PluginRegistry::with_builtins();

    let plugins: Vec<_> = match &args.platform {
        Some(name) => match registry.get(name) {
            Some(plugin) => vec![plugin],
            None => {
                eprintln!("error: unknown platform {name:?}");
                return 1;
            }
        },
        None => registry.iter().cloned().collect(),
    };

    let mut any_missing = false;
    for plugin in &plugins {
        let check = plugin.check_environment(ProfilerRunMode::Host);
        if check.is_ready() {
            println!("[ok]      {:<10} {}", plugin.name(), plugin.default_container_image().unwrap_or("-"));
        } else {
            any_missing = true;
            println!("[missing] {:<10}", plugin.name());
            for instruction in &check.missing {
                println!("            {instruction}");
            }
        }
        for warning in &check.warnings {
            println!("            warning: {warning}");
        }
    }

    if any_missing {
        1
    } else {
        0
    }
}
