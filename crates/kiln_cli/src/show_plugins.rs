//! Implementation of the `kiln show-plugins` command.

use std::fmt::Write;

use clap::CommandFactory;
use kiln_compiler::FilterRegistry;

use crate::data_source::CliResult;
use crate::Cli;

/// Runs `kiln show-plugins`.
pub fn run() -> CliResult<i32> {
    let commands: Vec<String> = Cli::command()
        .get_subcommands()
        .map(|c| c.get_name().to_string())
        .collect();
    print!("{}", render(&FilterRegistry::with_builtins(), &commands));
    Ok(0)
}

/// Lists the filters of `filters`, then `commands`.
fn render(filters: &FilterRegistry, commands: &[String]) -> String {
    let mut out = String::from("Filters:\n\n");
    for name in filters.names() {
        if filters.is_always_outdated(name) {
            let _ = writeln!(out, "  {name} (always outdated)");
        } else {
            let _ = writeln!(out, "  {name}");
        }
    }
    out.push_str("\nCommands:\n\n");
    for name in commands {
        let _ = writeln!(out, "  {name}");
    }
    out
}
