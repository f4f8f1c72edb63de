//! Error types for the package manager.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::package::InvalidName;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Whether an error may succeed on another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A single transfer attempt failed; the file may be retried.
    Retryable,
    /// Aborts the whole batch.
    Fatal,
}

/// Errors that can occur during package management operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// A transfer attempt failed (connection reset, read error).
    #[error("transfer of {remote_id} failed: {reason}")]
    Transfer { remote_id: Uuid, reason: String },

    /// The server answered with a non-success status.
    #[error("download of {remote_id} returned HTTP {status}")]
    HttpStatus { remote_id: Uuid, status: u16 },

    /// Network timeout.
    #[error("request for {remote_id} timed out after {timeout_secs}s")]
    Timeout { remote_id: Uuid, timeout_secs: u64 },

    /// Every attempt for a file failed.
    #[error("giving up on {} after {attempts} attempts", path.display())]
    RetriesExhausted {
        path: PathBuf,
        attempts: u32,
        #[source]
        last: Box<ManagerError>,
    },

    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write a file.
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to delete a file or folder. During an install this is logged,
    /// never propagated.
    #[error("failed to delete {}: {source}", path.display())]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to fetch or parse a package manifest.
    #[error("failed to fetch manifest for package {package_id}: {reason}")]
    ManifestFetch { package_id: Uuid, reason: String },

    /// A manifest names a folder or file that would leave the package root.
    #[error("manifest of package '{package}' is invalid: {source}")]
    InvalidManifest {
        package: String,
        #[source]
        source: InvalidName,
    },

    /// A package listing query (available or revoked packages) failed.
    #[error("{query} query failed: {reason}")]
    ServerQuery { query: &'static str, reason: String },

    /// The installed packages document could not be parsed.
    #[error("installed packages document {} is corrupt: {reason}", path.display())]
    RegistryCorrupt { path: PathBuf, reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background install thread could not be started or panicked.
    #[error("install worker failed: {0}")]
    WorkerFailed(String),
}

impl ManagerError {
    /// Classify the error for the retry loop.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transfer { .. } | Self::HttpStatus { .. } | Self::Timeout { .. } => {
                ErrorKind::Retryable
            }
            _ => ErrorKind::Fatal,
        }
    }

    /// Shorthand for `kind() == ErrorKind::Retryable`.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }
}
