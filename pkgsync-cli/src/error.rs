//! CLI error types.

use std::fmt;
use std::io;
use std::path::PathBuf;

use pkgsync::config::ConfigError;
use pkgsync::logging::LoggingError;
use pkgsync::manager::ManagerError;

/// Errors surfaced to the user by `pkgsync` commands.
#[derive(Debug)]
pub enum CliError {
    /// Missing or contradictory settings.
    Config(String),

    /// The configuration file could not be loaded or saved.
    ConfigFile(ConfigError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// The install engine failed.
    Manager(ManagerError),

    /// A manifest file could not be read or parsed.
    Manifest { path: PathBuf, reason: String },

    /// Writing output failed.
    Output(String),

    /// Local I/O failed.
    Io(io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Manager(e) => write!(f, "{}", e),
            CliError::Manifest { path, reason } => {
                write!(f, "Invalid manifest {}: {}", path.display(), reason)
            }
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Manager(e) => Some(e),
            CliError::Io(e) => Some(e),
            CliError::Config(_) | CliError::Manifest { .. } | CliError::Output(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<ManagerError> for CliError {
    fn from(e: ManagerError) -> Self {
        CliError::Manager(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}
