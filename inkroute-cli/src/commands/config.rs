//! Configuration management CLI commands.
//!
//! Provides `config show`, `config init`, and `config path` for inspecting
//! the settings file from the command line.

use std::path::PathBuf;

use clap::Subcommand;
use inkroute::config::{config_file_path, to_config_string, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration (defaults filled in)
    Show {
        /// Read this file instead of ~/.inkroute/config.ini
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write a default configuration file if none exists
    Init,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show { config } => run_show(config),
        ConfigCommands::Init => run_init(),
        ConfigCommands::Path => run_path(),
    }
}

fn run_show(path: Option<PathBuf>) -> Result<(), CliError> {
    let path = path.unwrap_or_else(config_file_path);
    let config = ConfigFile::load_from(&path)?;

    if !path.exists() {
        println!("; {} does not exist, showing defaults", path.display());
        println!();
    }
    print!("{}", to_config_string(&config));
    Ok(())
}

fn run_init() -> Result<(), CliError> {
    let existed = config_file_path().exists();
    let path = ConfigFile::ensure_exists()?;

    if existed {
        println!("Configuration already exists: {}", path.display());
    } else {
        println!("Wrote default configuration: {}", path.display());
    }
    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}
