//! Attribute policy: download gate and post-download classification.
//!
//! Both functions are pure. The installer feeds them the local file state
//! and the package's upgrade status; nothing here touches the filesystem.

use chrono::{DateTime, Utc};

use crate::package::FileAttributes;

/// What is on disk at a file's destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalFileState {
    /// Nothing exists at the path.
    Missing,
    /// A file exists; `modified` is `None` when the platform cannot report it.
    Present { modified: Option<DateTime<Utc>> },
}

impl LocalFileState {
    /// Whether a file exists locally.
    pub fn exists(&self) -> bool {
        matches!(self, Self::Present { .. })
    }
}

/// Decide whether a file must be transferred.
///
/// Rules, in order:
/// 1. Missing locally: download.
/// 2. Local timestamp equals the remote one: skip.
/// 3. Otherwise `OVERWRITE_NEVER` skips, `OVERWRITE_ON_NEW_PACKAGE_VERSION`
///    skips unless this is a version upgrade, and everything else downloads.
///
/// Timestamps are compared at whole-second precision.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use pkgsync::manager::{should_download, LocalFileState};
/// use pkgsync::package::FileAttributes;
///
/// let now = Utc::now();
/// let local = LocalFileState::Present { modified: Some(now) };
///
/// assert!(!should_download(local, now, FileAttributes::empty(), false));
/// assert!(should_download(LocalFileState::Missing, now, FileAttributes::OVERWRITE_NEVER, false));
/// ```
pub fn should_download(
    local: LocalFileState,
    remote_modified: DateTime<Utc>,
    attrs: FileAttributes,
    is_version_upgrade: bool,
) -> bool {
    let local_modified = match local {
        LocalFileState::Missing => return true,
        LocalFileState::Present { modified } => modified,
    };

    if local_modified.is_some_and(|m| same_instant(m, remote_modified)) {
        return false;
    }

    if attrs.contains(FileAttributes::OVERWRITE_NEVER) {
        return false;
    }

    if attrs.contains(FileAttributes::OVERWRITE_ON_NEW_PACKAGE_VERSION) && !is_version_upgrade {
        return false;
    }

    true
}

/// Post-install classification of a single file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    /// Belongs in the execute list.
    pub execute: bool,
    /// Belongs in the top-level sequence list.
    pub top_level: bool,
}

/// Classify a file after its download decision was carried out.
///
/// `downloaded` is true only when this run transferred the file.
pub fn classify(attrs: FileAttributes, downloaded: bool, is_version_upgrade: bool) -> Classification {
    let execute_once = downloaded && attrs.contains(FileAttributes::EXECUTE_ONCE);
    let execute_per_version = attrs.contains(FileAttributes::EXECUTE_ONCE_PER_VERSION)
        && (downloaded || is_version_upgrade);
    let execute_always = attrs.contains(FileAttributes::EXECUTE_ALWAYS);

    Classification {
        execute: execute_once || execute_per_version || execute_always,
        top_level: attrs.contains(FileAttributes::TOP_LEVEL_FILE),
    }
}

fn same_instant(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.timestamp() == b.timestamp()
}
