//! pkgsync command-line interface.

mod commands;
mod error;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use console::style;
use pkgsync::config::ConfigFile;

use commands::Commands;
use error::CliError;

/// Install and update packages from a distribution server.
#[derive(Debug, Parser)]
#[command(name = "pkgsync", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to <config dir>/pkgsync/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("error:").red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli
        .config
        .or_else(ConfigFile::default_path)
        .ok_or_else(|| {
            CliError::Config("No configuration directory on this platform; use --config".to_string())
        })?;
    let config = ConfigFile::load(&config_path)?;

    // Held until exit so buffered log lines are flushed.
    let _log_guard = pkgsync::logging::init_logging(&config.log_directory())?;
    tracing::debug!(config = %config_path.display(), "Configuration loaded");

    commands::run(cli.command, &config, &config_path)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_install_with_manifests() {
        let cli = Cli::try_parse_from([
            "pkgsync",
            "install",
            "7f1c9a52-3d2e-4b8a-9c41-0f6e2d5b8a13",
            "--manifest",
            "extra.json",
            "--config",
            "/tmp/pkgsync.ini",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/pkgsync.ini")));
        match cli.command {
            Commands::Install { ids, manifests, .. } => {
                assert_eq!(ids.len(), 1);
                assert_eq!(manifests, vec![PathBuf::from("extra.json")]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_package_id() {
        assert!(Cli::try_parse_from(["pkgsync", "install", "not-a-uuid"]).is_err());
    }
}
