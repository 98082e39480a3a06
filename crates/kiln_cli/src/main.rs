//! Kiln CLI, the command-line interface for the kiln build coordinator.
//!
//! Provides `kiln build` for incremental builds and `kiln state` for
//! inspecting the recorded dependency graph.

#![warn(missing_docs)]

mod build;
mod logger;
mod options;
mod state;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Kiln, an incremental build coordinator.
#[derive(Parser, Debug)]
#[command(name = "kiln", version, about = "Incremental build coordinator")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to the `kiln.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bring the output directory up to date.
    Build(BuildArgs),
    /// Show the recorded build state.
    State(StateArgs),
}

/// Overrides for values in `kiln.toml`.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Compiled source root; replaces `build.roots` (repeatable).
    #[arg(long = "root")]
    pub roots: Vec<PathBuf>,

    /// Link-only source root; replaces `build.link_roots` (repeatable).
    #[arg(long = "link-root")]
    pub link_roots: Vec<PathBuf>,

    /// Artifact output directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory holding the state file.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Maximum number of worker threads.
    #[arg(short = 'j', long, value_parser = clap::value_parser!(u16).range(1..))]
    pub cores: Option<u16>,

    /// Keep files in output directories that no package produced.
    #[arg(long)]
    pub permit_unidentified_artifacts: bool,

    /// File listing the sources the scan must find, one per line.
    #[arg(long)]
    pub compare_found_sources: Option<PathBuf>,
}

/// Arguments for the `kiln state` subcommand.
#[derive(Args, Debug)]
pub struct StateArgs {
    /// Show one package (`module:package`, or just `package` for the
    /// unnamed module).
    #[arg(short, long)]
    pub package: Option<String>,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub build: BuildArgs,
}

/// Controls whether colored output is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Detect from terminal capabilities.
    Auto,
    /// Always produce colored output.
    Always,
    /// Never produce colored output.
    Never,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Whether to use colored output.
    pub color: bool,
    /// Optional path to a custom config file.
    pub config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorChoice::Auto => std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };
    logger::init_logger(global.verbose, global.quiet, !global.color);

    let result = match cli.command {
        Command::Build(ref args) => build::run(args, &global),
        Command::State(ref args) => state::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
