//! Downloaded packages log.
//!
//! One JSON object per line, appended after every recorded package install.
//! The log is informational: failing to write it never fails an install.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::package::Package;

/// One line of the downloaded packages log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLogEntry {
    /// Id of the installed package version.
    pub package_id: Uuid,
    /// Package name.
    pub name: String,
    /// Installed version.
    pub version: u32,
    /// Bytes transferred by the install.
    pub download_size: u64,
    /// When the entry was written.
    pub timestamp: DateTime<Utc>,
}

/// Append-only log of downloaded packages.
#[derive(Debug, Clone)]
pub struct DownloadLog {
    path: PathBuf,
}

impl DownloadLog {
    /// Log backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry for `package`. Failures are logged and swallowed.
    pub fn append(&self, package: &Package, download_size: u64) {
        let entry = DownloadLogEntry {
            package_id: package.id,
            name: package.name.clone(),
            version: package.version,
            download_size,
            timestamp: Utc::now(),
        };

        if let Err(e) = self.write_entry(&entry) {
            warn!(
                path = %self.path.display(),
                package = %package.name,
                error = %e,
                "Failed to append to download log"
            );
        }
    }

    /// Read all parseable entries. Malformed lines are skipped.
    pub fn entries(&self) -> Vec<DownloadLogEntry> {
        let Ok(content) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    fn write_entry(&self, entry: &DownloadLogEntry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}
