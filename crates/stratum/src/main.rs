//! Stratum CLI - layered dependency analysis from the command line.
//!
//! Builds a project's dependency graph from its entity records, writes the
//! migration order back, and queries the mirrored graph store.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod cli;

/// Stratum: layered dependency graph engine.
#[derive(Parser)]
#[command(name = "stratum")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to ./stratum.yaml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default stratum.yaml and create the record directory
    Init,

    /// Build the graph, order it and write the order back to the records
    Build {
        /// Project name (reads <data-dir>/<project>.jsonl)
        project: String,

        /// Compute and print the order without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Mirror the graph into the graph store after writing
        #[arg(long)]
        sync: bool,
    },

    /// Show everything that depends on a node
    Impact {
        /// Node key, e.g. "Table:USUARIO"
        key: String,

        /// Maximum number of hops to follow
        #[arg(short, long, default_value = "3")]
        depth: u32,
    },

    /// Show the shortest connections between two nodes
    Path {
        /// Start node key
        from: String,

        /// End node key
        to: String,

        /// Maximum path length in hops
        #[arg(long, default_value = "6")]
        max_hops: u32,
    },

    /// List the most connected nodes
    Hubs {
        /// Minimum number of incoming plus outgoing edges
        #[arg(short, long, default_value = "5")]
        min: usize,
    },

    /// List procedures and classes nothing depends on
    DeadCode {
        /// Entry-point name prefix to exclude (repeatable; replaces the configured list)
        #[arg(short, long = "prefix")]
        prefixes: Vec<String>,
    },

    /// Find dependency cycles among nodes of one type in the graph store
    Cycles {
        /// Node type: table, class, procedure or page
        node_type: String,

        /// Longest cycle to report
        #[arg(long, default_value = "5")]
        max_length: usize,
    },

    /// Export a project's ordered graph
    Export {
        /// Project name
        project: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "dot")]
        format: cli::export::Format,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init => cli::init::run(Path::new(".")).await,
        command => match cli::App::load(cli.config.as_deref(), cli.json).await {
            Ok(app) => run_command(&app, command).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_error(&e),
    }
}

/// Dispatch a command that needs the loaded configuration.
async fn run_command(app: &cli::App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init => cli::init::run(Path::new(".")).await,
        Commands::Build {
            project,
            dry_run,
            sync,
        } => cli::build::run(app, &project, dry_run, sync).await,
        Commands::Impact { key, depth } => cli::impact::run(app, &key, depth).await,
        Commands::Path { from, to, max_hops } => cli::path::run(app, &from, &to, max_hops).await,
        Commands::Hubs { min } => cli::hubs::run(app, min).await,
        Commands::DeadCode { prefixes } => cli::dead_code::run(app, &prefixes).await,
        Commands::Cycles {
            node_type,
            max_length,
        } => cli::cycles::run(app, &node_type, max_length).await,
        Commands::Export { project, format } => cli::export::run(app, &project, format).await,
    }
}

/// Print an error with its cause chain.
fn report_error(e: &anyhow::Error) -> ExitCode {
    eprintln!("{}: {e}", "error".red().bold());
    for cause in e.chain().skip(1) {
        eprintln!("  {}: {cause}", "caused by".dimmed());
    }
    ExitCode::FAILURE
}
