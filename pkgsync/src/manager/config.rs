//! Configuration for the package manager.

use std::path::PathBuf;
use std::time::Duration;

use super::error::{ManagerError, ManagerResult};

/// Default transfer chunk size in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 65_000;

/// Largest accepted transfer chunk size (64 MiB); the buffer is allocated up front.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Default HTTP request timeout (5 minutes, to tolerate large files).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Default number of attempts per file.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// File name of the installed packages document.
pub const INSTALLED_PACKAGES_FILE: &str = "installed_packages.json";

/// File name of the downloaded packages log.
pub const DOWNLOAD_LOG_FILE: &str = "downloaded_packages.log";

/// Configuration for the package manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory packages are installed into unless they override it.
    pub distribution_root: PathBuf,

    /// Directory holding the installed packages document and download log.
    pub state_dir: PathBuf,

    /// Bytes read from the remote stream per chunk.
    pub chunk_size: usize,

    /// HTTP request timeout.
    pub request_timeout: Duration,

    /// Attempts per file before the batch is aborted.
    pub max_attempts: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        let state_dir = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("pkgsync");
        Self {
            distribution_root: state_dir.join("packages"),
            state_dir,
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration with the given distribution root.
    pub fn new(distribution_root: impl Into<PathBuf>) -> Self {
        Self {
            distribution_root: distribution_root.into(),
            ..Default::default()
        }
    }

    /// Set the state directory.
    pub fn with_state_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_dir = path.into();
        self
    }

    /// Set the transfer chunk size, clamped to `1..=MAX_CHUNK_SIZE`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    /// Set the HTTP request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the number of attempts per file (minimum 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Path of the installed packages document.
    pub fn installed_packages_path(&self) -> PathBuf {
        self.state_dir.join(INSTALLED_PACKAGES_FILE)
    }

    /// Path of the downloaded packages log.
    pub fn download_log_path(&self) -> PathBuf {
        self.state_dir.join(DOWNLOAD_LOG_FILE)
    }
}

/// Parse a chunk size from its string setting.
///
/// # Example
///
/// ```
/// use pkgsync::manager::parse_chunk_size;
///
/// assert_eq!(parse_chunk_size(" 65000 ").unwrap(), 65000);
/// assert!(parse_chunk_size("0").is_err());
/// assert!(parse_chunk_size("lots").is_err());
/// assert!(parse_chunk_size("10000000000").is_err());
/// ```
pub fn parse_chunk_size(value: &str) -> ManagerResult<usize> {
    let trimmed = value.trim();
    match trimmed.parse::<usize>() {
        Ok(0) => Err(ManagerError::InvalidConfig(
            "chunk_size must be greater than zero".to_string(),
        )),
        Ok(size) if size > MAX_CHUNK_SIZE => Err(ManagerError::InvalidConfig(format!(
            "chunk_size {} exceeds the maximum of {} bytes",
            size, MAX_CHUNK_SIZE
        ))),
        Ok(size) => Ok(size),
        Err(e) => Err(ManagerError::InvalidConfig(format!(
            "chunk_size '{}' is not a number: {}",
            trimmed, e
        ))),
    }
}
