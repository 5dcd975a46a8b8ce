//! Combine CLI - static site builder.
//!
//! Provides commands for:
//! - `build`: Build the site, optionally running output checks
//! - `work`: Build, watch for changes and serve the site locally
//! - `utils highlight-css`: Print the CSS for a code highlighting theme

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{BuildArgs, UtilsCommand, WorkArgs};
use output::Output;

/// Combine - build static sites from templates, Markdown and plain files.
#[derive(Parser)]
#[command(name = "combine", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site (typically during deployment).
    Build(BuildArgs),
    /// Start a local server to build the site while you work.
    Work(WorkArgs),
    /// Utility commands.
    #[command(subcommand)]
    Utils(UtilsCommand),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let debug = match &cli.command {
        Commands::Build(args) => args.debug,
        Commands::Work(args) => args.debug,
        Commands::Utils(_) => false,
    };

    // --debug enables DEBUG level, otherwise use RUST_LOG or default to WARN
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Build(args) => args.execute(),
        Commands::Work(args) => args.execute(),
        Commands::Utils(cmd) => cmd.execute(),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
