//! Manifest value types.
//!
//! A [`Package`] is fetched fresh from the manifest source for every install
//! pass and is never mutated while the pass runs. Folders own their child
//! files and folders, so the manifest is a tree without cycles.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::attributes::FileAttributes;
use super::naming::is_plain_name;

/// A manifest name that cannot be used as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} name '{name}' is not a single path segment")]
pub struct InvalidName {
    /// What carried the name: `package`, `folder` or `file`.
    pub kind: &'static str,
    /// The rejected name.
    pub name: String,
}

impl InvalidName {
    fn check(kind: &'static str, name: &str) -> Result<(), Self> {
        if is_plain_name(name) {
            Ok(())
        } else {
            Err(Self {
                kind,
                name: name.to_string(),
            })
        }
    }
}

/// A versioned, prioritized bundle of folders and files.
///
/// # Example
///
/// ```
/// use pkgsync::package::{Package, PackageFolder};
/// use uuid::Uuid;
///
/// let package = Package::new(Uuid::new_v4(), "Firmware", 2)
///     .with_priority(10)
///     .with_folder(PackageFolder::new("Drivers"));
///
/// assert_eq!(package.version, 2);
/// assert_eq!(package.root_folders().count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Server-side identity of this package version.
    pub id: Uuid,

    /// Package name. Installed versions are tracked by this name.
    pub name: String,

    /// Monotonically increasing package version.
    pub version: u32,

    /// Install ordering within a batch (ascending).
    #[serde(default)]
    pub priority: i32,

    /// Install under a sub-directory named after the package.
    #[serde(default)]
    pub package_folder: bool,

    /// Per-package override of the distribution root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_directory: Option<PathBuf>,

    /// Free-form description shown by front ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Folder set of the package. Folders without a parent form the root set.
    #[serde(default)]
    pub folders: Vec<PackageFolder>,
}

impl Package {
    /// Create an empty package with default priority.
    pub fn new(id: Uuid, name: impl Into<String>, version: u32) -> Self {
        Self {
            id,
            name: name.into(),
            version,
            priority: 0,
            package_folder: false,
            root_directory: None,
            description: None,
            folders: Vec::new(),
        }
    }

    /// Set the install priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Install below a folder named after the package.
    pub fn with_package_folder(mut self, package_folder: bool) -> Self {
        self.package_folder = package_folder;
        self
    }

    /// Override the distribution root for this package.
    pub fn with_root_directory(mut self, root: impl Into<PathBuf>) -> Self {
        self.root_directory = Some(root.into());
        self
    }

    /// Add a root folder.
    pub fn with_folder(mut self, folder: PackageFolder) -> Self {
        self.folders.push(folder);
        self
    }

    /// Iterate over the root set (folders with no parent).
    pub fn root_folders(&self) -> impl Iterator<Item = &PackageFolder> {
        self.folders
            .iter()
            .filter(|folder| folder.parent_folder_id.is_none())
    }

    /// Sum of the declared sizes of every file in the root set.
    pub fn declared_size(&self) -> u64 {
        self.root_folders().map(PackageFolder::declared_size).sum()
    }

    /// Number of files in the root set.
    pub fn file_count(&self) -> usize {
        self.root_folders().map(PackageFolder::file_count).sum()
    }

    /// Check that every name joined into a local path is one plain segment.
    ///
    /// The package name is checked only when it becomes a directory
    /// (`package_folder`).
    pub fn validate(&self) -> Result<(), InvalidName> {
        if self.package_folder {
            InvalidName::check("package", &self.name)?;
        }
        self.root_folders().try_for_each(PackageFolder::validate)
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// A folder in a package tree.
///
/// Folder identity for diffing is the `name`, which must be unique among
/// siblings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFolder {
    /// Folder name, unique among siblings.
    pub name: String,

    /// Parent folder id on the server; `None` for root folders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_folder_id: Option<Uuid>,

    /// Files directly inside this folder.
    #[serde(default)]
    pub files: Vec<PackageFile>,

    /// Child folders.
    #[serde(default)]
    pub folders: Vec<PackageFolder>,
}

impl PackageFolder {
    /// Create an empty root folder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_folder_id: None,
            files: Vec::new(),
            folders: Vec::new(),
        }
    }

    /// Add a file.
    pub fn with_file(mut self, file: PackageFile) -> Self {
        self.files.push(file);
        self
    }

    /// Add a child folder.
    pub fn with_folder(mut self, folder: PackageFolder) -> Self {
        self.folders.push(folder);
        self
    }

    /// Sum of declared file sizes in this folder and below.
    pub fn declared_size(&self) -> u64 {
        let own: u64 = self.files.iter().map(|f| f.size).sum();
        own + self
            .folders
            .iter()
            .map(PackageFolder::declared_size)
            .sum::<u64>()
    }

    /// Check this folder's name and everything below it.
    pub fn validate(&self) -> Result<(), InvalidName> {
        InvalidName::check("folder", &self.name)?;
        for file in &self.files {
            InvalidName::check("file", &file.name)?;
        }
        self.folders.iter().try_for_each(PackageFolder::validate)
    }

    /// Number of files in this folder and below.
    pub fn file_count(&self) -> usize {
        self.files.len()
            + self
                .folders
                .iter()
                .map(PackageFolder::file_count)
                .sum::<usize>()
    }
}

/// A file entry within a package folder.
///
/// Local identity is `(folder path, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageFile {
    /// Id used to open the remote byte stream.
    pub remote_id: Uuid,

    /// File name within its folder.
    pub name: String,

    /// Remote modification timestamp; the change-detection key.
    pub modified: DateTime<Utc>,

    /// Declared size in bytes; 0 means unknown.
    #[serde(default)]
    pub size: u64,

    /// Overwrite and execution policy flags.
    #[serde(default)]
    pub attributes: FileAttributes,
}

impl PackageFile {
    /// Create a file entry with no attributes and unknown size.
    pub fn new(remote_id: Uuid, name: impl Into<String>, modified: DateTime<Utc>) -> Self {
        Self {
            remote_id,
            name: name.into(),
            modified,
            size: 0,
            attributes: FileAttributes::empty(),
        }
    }

    /// Set the declared size.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Set the attribute flags.
    pub fn with_attributes(mut self, attributes: FileAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn file(name: &str, size: u64) -> PackageFile {
        let modified = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        PackageFile::new(Uuid::new_v4(), name, modified).with_size(size)
    }

    #[test]
    fn test_root_folders_excludes_children() {
        let mut child = PackageFolder::new("nested");
        child.parent_folder_id = Some(Uuid::new_v4());

        let package = Package::new(Uuid::new_v4(), "Tools", 1)
            .with_folder(PackageFolder::new("bin"))
            .with_folder(child);

        let names: Vec<_> = package.root_folders().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["bin"]);
    }

    #[test]
    fn test_declared_size_is_recursive() {
        let package = Package::new(Uuid::new_v4(), "Tools", 1).with_folder(
            PackageFolder::new("bin")
                .with_file(file("a.exe", 100))
                .with_folder(PackageFolder::new("lib").with_file(file("b.dll", 50))),
        );

        assert_eq!(package.declared_size(), 150);
        assert_eq!(package.file_count(), 2);
    }

    #[test]
    fn test_deserialize_manifest_with_defaults() {
        let json = r#"{
            "id": "6f1c9a52-3b43-4d8e-9f57-2b1b8a0c0d11",
            "name": "Firmware",
            "version": 3,
            "folders": [{
                "name": "Drivers",
                "files": [{
                    "remoteId": "0b7d6d0e-8d7e-4e55-8f0a-7c1a5f6d9e21",
                    "name": "driver.dll",
                    "modified": "2024-05-01T12:00:00Z",
                    "attributes": 20
                }]
            }]
        }"#;

        let package: Package = serde_json::from_str(json).unwrap();
        assert_eq!(package.priority, 0);
        assert!(!package.package_folder);

        let file = &package.folders[0].files[0];
        assert_eq!(file.size, 0);
        assert!(file.attributes.contains(FileAttributes::TOP_LEVEL_FILE));
        assert!(file
            .attributes
            .contains(FileAttributes::OVERWRITE_ON_NEW_PACKAGE_VERSION));
    }

    #[test]
    fn test_package_display() {
        let package = Package::new(Uuid::new_v4(), "Firmware", 7);
        assert_eq!(package.to_string(), "Firmware v7");
    }

    #[test]
    fn test_validate_accepts_plain_names() {
        let package = Package::new(Uuid::new_v4(), "Tools", 1)
            .with_package_folder(true)
            .with_folder(PackageFolder::new("bin").with_file(file("run.sh", 1)));
        assert!(package.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_escaping_names() {
        for bad in ["..", "a/b", "/etc", "a\\b", ""] {
            let folder = Package::new(Uuid::new_v4(), "Tools", 1).with_folder(PackageFolder::new(bad));
            let err = folder.validate().unwrap_err();
            assert_eq!(err.kind, "folder");
            assert_eq!(err.name, bad);

            let nested = Package::new(Uuid::new_v4(), "Tools", 1).with_folder(
                PackageFolder::new("bin").with_folder(PackageFolder::new("lib").with_file(file(bad, 1))),
            );
            assert_eq!(nested.validate().unwrap_err().kind, "file");
        }
    }

    #[test]
    fn test_validate_package_name_only_as_folder() {
        let flat = Package::new(Uuid::new_v4(), "../Tools", 1);
        assert!(flat.validate().is_ok());

        let nested = flat.with_package_folder(true);
        assert_eq!(nested.validate().unwrap_err().kind, "package");
    }
}
