//! `mcp run`/`mcp install <client>` shim. MCP tool-schema registration and
//! protocol serving are explicitly out of scope (spec.md §1 "Deliberately
//! out of scope"); this only documents the contract an external MCP tool
//! relies on (spec.md §6 "Boundary to external collaborators").

use crate::cli::{McpArgs, McpAction};

pub fn run(args: McpArgs) -> i32 {
    match args.action {
        McpAction::Run => {
            eprintln!(
                "uniprof mcp run: the MCP protocol server is an external collaborator and is not \
                 bundled with this build. An MCP tool should re-invoke this binary as \
                 `uniprof record --analyze --format json -- <command>` and parse the JSON it \
                 writes to stdout."
            );
            1
        }
        McpAction::Install { client } => {
            eprintln!(
                "uniprof mcp install {client}: MCP client registration is an external \
                 collaborator and is not bundled with this build."
            );
            1
        }
    }
}
