#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::struct_excessive_bools)]

mod commands;
mod logging;

use clap::Parser;
use miette::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "depot")]
#[command(author, version, about = "A content-addressed package install cache", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Resolve, fetch and materialize the declared dependencies
    Install(commands::install::InstallArgs),

    /// Inspect the package cache
    Cache {
        #[command(subcommand)]
        cache_cmd: CacheCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum CacheCommands {
    /// List cached package entries
    Ls {
        /// Cache root directory override
        #[arg(long, value_name = "PATH")]
        cache_dir: Option<PathBuf>,
    },
}

/// Global CLI context shared by subcommands.
#[derive(Debug, Clone)]
pub struct Context {
    pub cwd: PathBuf,
    pub json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.json);

    let cwd = match cli.cwd {
        Some(path) => path,
        None => std::env::current_dir()
            .map_err(|e| miette::miette!("failed to determine working directory: {e}"))?,
    };

    let ctx = Context {
        cwd,
        json: cli.json,
    };

    match cli.command {
        Commands::Install(args) => commands::install::run(&ctx, args).await,
        Commands::Cache { cache_cmd } => match cache_cmd {
            CacheCommands::Ls { cache_dir } => commands::cache::ls(&ctx, cache_dir),
        },
    }
}
