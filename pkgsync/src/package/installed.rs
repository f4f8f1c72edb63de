//! Installed package record with filesystem context.
//!
//! An [`InstalledPackageRecord`] is what the registry persists for each
//! package name after a successful install. Besides the version it keeps a
//! snapshot of the installed folder tree, which becomes the "prior tree"
//! the next install diffs against.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attributes::FileAttributes;
use super::core::{Package, PackageFolder};
use super::naming::is_contained_path;

/// Persisted record of an installed package.
///
/// # Example
///
/// ```
/// use pkgsync::package::{InstalledPackageRecord, Package, PackageFolder};
/// use uuid::Uuid;
///
/// let package = Package::new(Uuid::new_v4(), "Firmware", 2)
///     .with_folder(PackageFolder::new("Drivers"));
/// let record = InstalledPackageRecord::from_package(&package, "/opt/dist", 0);
///
/// assert!(record.installed);
/// assert_eq!(record.version, 2);
/// assert_eq!(record.folders.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledPackageRecord {
    /// Id of the installed package version.
    pub package_id: Uuid,

    /// Package name; the registry key (case-sensitive).
    pub name: String,

    /// Installed version.
    pub version: u32,

    /// Whether the install completed.
    pub installed: bool,

    /// When the install completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,

    /// Directory the root folders were installed into.
    pub root_path: PathBuf,

    /// `root_path` is a directory owned by this package alone.
    #[serde(default)]
    pub package_folder: bool,

    /// Bytes transferred by the install that wrote this record.
    #[serde(default)]
    pub download_size: u64,

    /// Snapshot of the installed root folders.
    #[serde(default)]
    pub folders: Vec<PackageFolder>,

    /// Flat list of installed files with their policy flags.
    #[serde(default)]
    pub files: Vec<InstalledFile>,
}

impl InstalledPackageRecord {
    /// Build an installed record from a manifest.
    pub fn from_package(package: &Package, root_path: impl Into<PathBuf>, download_size: u64) -> Self {
        let folders: Vec<PackageFolder> = package.root_folders().cloned().collect();
        let mut files = Vec::new();
        for folder in &folders {
            collect_files(folder, Path::new(""), &mut files);
        }

        Self {
            package_id: package.id,
            name: package.name.clone(),
            version: package.version,
            installed: true,
            installed_at: Some(Utc::now()),
            root_path: root_path.into(),
            package_folder: package.package_folder,
            download_size,
            folders,
            files,
        }
    }

    /// Absolute paths of recorded files carrying `flag`, in record order.
    ///
    /// Recorded paths that would leave `root_path` are skipped.
    pub fn files_with(&self, flag: FileAttributes) -> impl Iterator<Item = PathBuf> + '_ {
        self.files
            .iter()
            .filter(move |file| file.attributes.contains(flag))
            .filter(|file| is_contained_path(&file.path))
            .map(|file| self.root_path.join(&file.path))
    }
}

/// A file recorded as part of an installed package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledFile {
    /// Path relative to the package root directory.
    pub path: PathBuf,

    /// Policy flags the file was installed with.
    pub attributes: FileAttributes,
}

fn collect_files(folder: &PackageFolder, parent: &Path, out: &mut Vec<InstalledFile>) {
    let dir = parent.join(&folder.name);
    for file in &folder.files {
        out.push(InstalledFile {
            path: dir.join(&file.name),
            attributes: file.attributes,
        });
    }
    for child in &folder.folders {
        collect_files(child, &dir, out);
    }
}
