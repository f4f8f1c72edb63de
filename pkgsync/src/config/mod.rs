//! INI configuration file.
//!
//! ```ini
//! [packages]
//! distribution_root = /opt/pkgsync
//! state_dir = ~/.local/share/pkgsync
//! chunk_size = 65000
//! max_attempts = 3
//!
//! [server]
//! base_url = https://dist.example
//! request_timeout_secs = 300
//!
//! [logging]
//! directory = ~/.local/share/pkgsync/logs
//! ```
//!
//! Every key is optional. A leading `~/` expands to the home directory.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::manager::{
    parse_chunk_size, ManagerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_REQUEST_TIMEOUT,
};

const PACKAGES: &str = "packages";
const SERVER: &str = "server";
const LOGGING: &str = "logging";

/// Errors loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid INI.
    #[error("config file {} is not valid INI: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// A key holds a value of the wrong shape.
    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[packages]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagesSettings {
    pub distribution_root: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub chunk_size: usize,
    pub max_attempts: u32,
}

impl Default for PackagesSettings {
    fn default() -> Self {
        Self {
            distribution_root: None,
            state_dir: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: Option<PathBuf>,
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub packages: PackagesSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// `config_dir()/pkgsync/config.ini`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("pkgsync").join("config.ini"))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => ConfigError::Parse {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;
        Self::from_ini(&ini)
    }

    /// Parse from INI text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Write every set value to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut ini = Ini::new();
        if let Some(root) = &self.packages.distribution_root {
            ini.set_to(Some(PACKAGES), "distribution_root".into(), root.display().to_string());
        }
        if let Some(state_dir) = &self.packages.state_dir {
            ini.set_to(Some(PACKAGES), "state_dir".into(), state_dir.display().to_string());
        }
        ini.set_to(Some(PACKAGES), "chunk_size".into(), self.packages.chunk_size.to_string());
        ini.set_to(Some(PACKAGES), "max_attempts".into(), self.packages.max_attempts.to_string());

        if let Some(base_url) = &self.server.base_url {
            ini.set_to(Some(SERVER), "base_url".into(), base_url.clone());
        }
        ini.set_to(
            Some(SERVER),
            "request_timeout_secs".into(),
            self.server.request_timeout_secs.to_string(),
        );

        if let Some(directory) = &self.logging.directory {
            ini.set_to(Some(LOGGING), "directory".into(), directory.display().to_string());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        ini.write_to_file(path).map_err(io_error)
    }

    /// Build the installer configuration.
    ///
    /// Unset directories fall back to the [`ManagerConfig`] defaults.
    pub fn to_manager_config(&self) -> ManagerConfig {
        let mut config = ManagerConfig::default();
        if let Some(state_dir) = &self.packages.state_dir {
            config = config.with_state_dir(state_dir.clone());
            config.distribution_root = state_dir.join("packages");
        }
        if let Some(root) = &self.packages.distribution_root {
            config.distribution_root = root.clone();
        }
        config
            .with_chunk_size(self.packages.chunk_size)
            .with_max_attempts(self.packages.max_attempts)
            .with_request_timeout(Duration::from_secs(self.server.request_timeout_secs))
    }

    /// Directory for log files.
    pub fn log_directory(&self) -> PathBuf {
        self.logging
            .directory
            .clone()
            .unwrap_or_else(|| self.to_manager_config().state_dir.join("logs"))
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some(PACKAGES)) {
            config.packages.distribution_root = section.get("distribution_root").and_then(path_value);
            config.packages.state_dir = section.get("state_dir").and_then(path_value);
            if let Some(value) = section.get("chunk_size") {
                config.packages.chunk_size =
                    parse_chunk_size(value).map_err(|e| invalid(PACKAGES, "chunk_size", value, e))?;
            }
            if let Some(value) = section.get("max_attempts") {
                config.packages.max_attempts = match value.trim().parse::<u32>() {
                    Ok(0) => return Err(invalid(PACKAGES, "max_attempts", value, "must be at least 1")),
                    Ok(attempts) => attempts,
                    Err(e) => return Err(invalid(PACKAGES, "max_attempts", value, e)),
                };
            }
        }

        if let Some(section) = ini.section(Some(SERVER)) {
            config.server.base_url = section
                .get("base_url")
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string);
            if let Some(value) = section.get("request_timeout_secs") {
                config.server.request_timeout_secs = value
                    .trim()
                    .parse()
                    .map_err(|e| invalid(SERVER, "request_timeout_secs", value, e))?;
            }
        }

        if let Some(section) = ini.section(Some(LOGGING)) {
            config.logging.directory = section.get("directory").and_then(path_value);
        }

        Ok(config)
    }
}

fn invalid(section: &str, key: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn path_value(value: &str) -> Option<PathBuf> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return Some(home.join(rest));
        }
    }
    Some(PathBuf::from(value))
}
