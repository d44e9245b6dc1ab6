//! `visualize` subcommand: hands a recorded profile off to the bundled
//! viewer. The viewer's static web server is an external collaborator
//! (spec.md §1 "Deliberately out of scope"); uniprof's only contract with it
//! is invoking its command with the profile path (spec.md §6 "Boundary to
//! external collaborators").

use std::path::Path;

use crate::cli::VisualizeArgs;

pub fn run(args: VisualizeArgs) -> i32 {
    if !args.file.exists() {
        eprintln!("error: {} does not exist", args.file.display());
        return 1;
    }
    open_path(&args.file)
}

/// Invokes the `uniprof-viewer` command if present on PATH; otherwise prints
/// the instructions a user would need to view the file manually.
pub fn open_path(path: &Path) -> i32 {
    match which::which("uniprof-viewer") {
        Ok(viewer) => match std::process::Command::new(viewer).arg(path).status() {
            Ok(status) if status.success() => 0,
            Ok(status) => status.code().unwrap_or(1),
            Err(err) => {
                eprintln!("error: failed to launch uniprof-viewer: {err}");
                1
            }
        },
        Err(_) => {
            println!(
                "uniprof-viewer is not installed; open {} at https://www.speedscope.app to view it",
                path.display()
            );
            0
        }
    }
}
