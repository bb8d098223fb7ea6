//! Kiln CLI: the command-line interface for the Kiln site compiler.
//!
//! Provides `kiln compile` to build a site incrementally, `kiln show-data`
//! to inspect the recorded dependencies and what the next compile would do,
//! and `kiln show-plugins` to list the available filters and commands.

#![warn(missing_docs)]

mod compile;
mod data_source;
mod diff;
mod show_data;
mod show_plugins;

use std::error::Error;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Kiln, an incremental site compiler.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Kiln site compiler")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Site directory. Defaults to the nearest directory containing `kiln.toml`.
    #[arg(long, global = true)]
    pub site: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Compile the site, recompiling only what changed.
    Compile(CompileArgs),
    /// Show dependencies and outdatedness without compiling.
    ShowData,
    /// List the available filters and commands.
    ShowPlugins,
}

/// Arguments for `kiln compile`.
#[derive(Args, Debug, Default, PartialEq, Eq)]
pub struct CompileArgs {
    /// Write a unified diff of every changed output file to `output.diff`.
    #[arg(long)]
    pub diff: bool,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Explicit site directory.
    pub site: Option<PathBuf>,
}

/// Log level selected by the flags; `RUST_LOG` takes precedence.
fn default_directive(global: &GlobalArgs) -> &'static str {
    if global.verbose {
        "debug"
    } else if global.quiet {
        "error"
    } else {
        "warn"
    }
}

fn init_tracing(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(global)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// The error followed by each cause its parent message does not already
/// spell out.
fn report(err: &dyn Error) -> Vec<String> {
    let mut lines = vec![format!("error: {err}")];
    let mut parent = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parent.contains(&text) {
            lines.push(format!("  caused by: {text}"));
        }
        parent = text;
        source = cause.source();
    }
    lines
}

fn main() {
    let cli = Cli::parse();
    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        site: cli.site,
    };
    init_tracing(&global);

    let result = match cli.command {
        Command::Compile(args) => compile::run(&global, &args),
        Command::ShowData => show_data::run(&global),
        Command::ShowPlugins => show_plugins::run(),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            for line in report(e.as_ref()) {
                eprintln!("{line}");
            }
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(quiet: bool, verbose: bool) -> GlobalArgs {
        GlobalArgs {
            quiet,
            verbose,
            site: None,
        }
    }

    #[test]
    fn parse_compile() {
        let cli = Cli::parse_from(["kiln", "compile"]);
        assert_eq!(cli.command, Command::Compile(CompileArgs { diff: false }));
        assert!(!cli.quiet);
        assert!(!cli.verbose);
        assert!(cli.site.is_none());
    }

    #[test]
    fn parse_compile_with_diff() {
        let cli = Cli::parse_from(["kiln", "compile", "--diff"]);
        assert_eq!(cli.command, Command::Compile(CompileArgs { diff: true }));
    }

    #[test]
    fn parse_show_commands() {
        let cli = Cli::parse_from(["kiln", "show-data"]);
        assert_eq!(cli.command, Command::ShowData);
        let cli = Cli::parse_from(["kiln", "show-plugins"]);
        assert_eq!(cli.command, Command::ShowPlugins);
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["kiln", "--quiet", "compile", "--site", "/srv/blog"]);
        assert!(cli.quiet);
        assert_eq!(cli.site, Some(PathBuf::from("/srv/blog")));

        let cli = Cli::parse_from(["kiln", "-v", "show-data"]);
        assert!(cli.verbose);
    }

    #[test]
    fn missing_command_is_an_error() {
        assert!(Cli::try_parse_from(["kiln"]).is_err());
        assert!(Cli::try_parse_from(["kiln", "view"]).is_err());
    }

    #[test]
    fn report_lists_each_cause_once() {
        use kiln_common::Identifier;
        use kiln_compiler::{CompilationError, CompileError};
        use kiln_model::ItemRep;

        let rep = ItemRep::default_of(Identifier::new("/a.md").unwrap());
        let failed = CompileError::from(CompilationError::new(
            rep,
            "filter 'explode'",
            Box::new(std::io::Error::other("exploded on /a.md")),
        ));
        assert_eq!(
            report(&failed),
            vec![
                "error: error while compiling item /a.md, rep default (filter 'explode')",
                "  caused by: exploded on /a.md",
            ]
        );

        let unwritable = CompileError::Io {
            path: PathBuf::from("output/a.html"),
            source: std::io::Error::other("read-only file system"),
        };
        assert_eq!(
            report(&unwritable),
            vec!["error: failed to write output/a.html: read-only file system"]
        );
    }

    #[test]
    fn log_level_follows_flags() {
        assert_eq!(default_directive(&global(false, false)), "warn");
        assert_eq!(default_directive(&global(true, false)), "error");
        assert_eq!(default_directive(&global(false, true)), "debug");
    }
}
