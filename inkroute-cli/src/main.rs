//! InkRoute CLI - Command-line interface
//!
//! Runs the tracker core against a simulated GPS receiver and manages the
//! configuration file.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::RunArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "inkroute")]
#[command(version, about = "E-paper GPS tracker core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a route with a simulated GPS receiver
    Run {
        /// Route file (JSON)
        #[arg(long)]
        route: PathBuf,

        /// Configuration file (default: ~/.inkroute/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Distance between simulated GPS readings in metres
        #[arg(long, default_value = "10")]
        step_m: f64,

        /// Delay between simulated GPS readings in milliseconds
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Write the last rendered frame to this PNG file
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Only track the position, without turn-by-turn navigation
        #[arg(long)]
        no_navigation: bool,
    },

    /// View the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            route,
            config,
            step_m,
            interval_ms,
            snapshot,
            no_navigation,
        } => run_async(RunArgs {
            route,
            config,
            step_m,
            interval_ms,
            snapshot,
            navigate: !no_navigation,
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}

fn run_async(args: RunArgs) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(commands::run::run(args))
}
