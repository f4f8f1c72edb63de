//! Configuration file CLI commands.
//!
//! Provides `config path`, `config show`, and `config init`.

use std::path::Path;

use clap::Subcommand;
use pkgsync::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective settings
    Show,

    /// Write a configuration file with the current settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, config: &ConfigFile, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            run_show(config);
            Ok(())
        }
        ConfigCommands::Init { force } => run_init(config, path, force),
    }
}

fn run_show(config: &ConfigFile) {
    let manager = config.to_manager_config();
    println!("[packages]");
    println!("  distribution_root    = {}", manager.distribution_root.display());
    println!("  state_dir            = {}", manager.state_dir.display());
    println!("  chunk_size           = {}", manager.chunk_size);
    println!("  max_attempts         = {}", manager.max_attempts);
    println!("[server]");
    println!(
        "  base_url             = {}",
        config.server.base_url.as_deref().unwrap_or("(not set)")
    );
    println!("  request_timeout_secs = {}", config.server.request_timeout_secs);
    println!("[logging]");
    println!("  directory            = {}", config.log_directory().display());
}

fn run_init(config: &ConfigFile, path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    config.save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
