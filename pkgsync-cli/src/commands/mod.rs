//! CLI subcommands.
//!
//! Each subcommand lives in its own module and exposes a `run` function
//! taking its parsed arguments and the loaded [`ConfigFile`].

mod config;
mod install;
mod packages;
mod remote;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Subcommand;
use pkgsync::config::ConfigFile;
use pkgsync::manager::HttpPackageSource;
use uuid::Uuid;

pub use config::ConfigCommands;

use crate::error::CliError;

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install or update packages
    Install {
        /// Package ids whose manifests are fetched from the server
        ids: Vec<Uuid>,

        /// Install from a local JSON manifest instead of fetching one
        #[arg(long = "manifest", value_name = "FILE")]
        manifests: Vec<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// List installed packages
    List,

    /// Show the files installed packages ask to run, without contacting the server
    Outcome {
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete an installed package's files and forget it
    Remove {
        /// Package name
        name: String,
    },

    /// Ask the server which installed packages have newer versions
    Check {
        /// Print the offered manifests as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove installed packages the server has revoked
    Prune {
        /// Delete the whole distribution root instead (no server needed)
        #[arg(long)]
        all: bool,
    },

    /// View or create the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Dispatch a parsed subcommand.
pub fn run(command: Commands, config: &ConfigFile, config_path: &Path) -> Result<(), CliError> {
    match command {
        Commands::Install {
            ids,
            manifests,
            json,
        } => install::run(&ids, &manifests, json, config),
        Commands::List => packages::run_list(config),
        Commands::Outcome { json } => packages::run_outcome(json, config),
        Commands::Remove { name } => packages::run_remove(&name, config),
        Commands::Check { json } => remote::run_check(json, config),
        Commands::Prune { all: true } => packages::run_remove_all(config),
        Commands::Prune { all: false } => remote::run_prune(config),
        Commands::Config(command) => config::run(command, config, config_path),
    }
}

/// HTTP source for the configured server.
fn http_source(config: &ConfigFile) -> Result<HttpPackageSource, CliError> {
    let base_url = config.server.base_url.as_deref().ok_or_else(|| {
        CliError::Config("No server configured. Set base_url in the [server] section.".to_string())
    })?;
    Ok(HttpPackageSource::with_timeout(
        base_url,
        Duration::from_secs(config.server.request_timeout_secs),
    )?)
}
