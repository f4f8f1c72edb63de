//! Installed package registry.
//!
//! A JSON document in the state directory lists one record per package
//! name. It is read before and written after each package install. Writes
//! are last-writer-wins; there is no protection against concurrent writers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::package::{InstalledPackageRecord, Package};

use super::error::{ManagerError, ManagerResult};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    packages: Vec<InstalledPackageRecord>,
}

/// Persisted record of installed package versions.
#[derive(Debug)]
pub struct InstalledPackageRegistry {
    path: PathBuf,
    document: RegistryDocument,
}

impl InstalledPackageRegistry {
    /// Open the registry at `path`.
    ///
    /// A missing document yields an empty registry; it is created on the
    /// first write.
    pub fn open(path: impl Into<PathBuf>) -> ManagerResult<Self> {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => RegistryDocument::default(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| ManagerError::RegistryCorrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => RegistryDocument::default(),
            Err(source) => return Err(ManagerError::ReadFailed { path, source }),
        };

        debug!(
            path = %path.display(),
            packages = document.packages.len(),
            "Opened installed package registry"
        );
        Ok(Self { path, document })
    }

    /// Path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in document order.
    pub fn records(&self) -> &[InstalledPackageRecord] {
        &self.document.packages
    }

    /// Version recorded for an installed package with exactly this name.
    pub fn recorded_version(&self, name: &str) -> Option<u32> {
        self.previous_install(name).map(|record| record.version)
    }

    /// The installed record for this name, if any.
    pub fn previous_install(&self, name: &str) -> Option<&InstalledPackageRecord> {
        self.document
            .packages
            .iter()
            .find(|record| record.installed && record.name == name)
    }

    /// Record a completed install of `package` and save the document.
    ///
    /// Any existing record with the same name is replaced.
    pub fn record_installed(
        &mut self,
        package: &Package,
        root_path: &Path,
        download_size: u64,
    ) -> ManagerResult<()> {
        let record = InstalledPackageRecord::from_package(package, root_path, download_size);
        self.document
            .packages
            .retain(|existing| existing.name != package.name);
        self.document.packages.push(record);
        self.save()
    }

    /// Forget a package. Returns the removed record.
    pub fn remove(&mut self, name: &str) -> ManagerResult<Option<InstalledPackageRecord>> {
        let Some(index) = self
            .document
            .packages
            .iter()
            .position(|record| record.name == name)
        else {
            return Ok(None);
        };

        let removed = self.document.packages.remove(index);
        self.document.packages.retain(|record| record.name != name);
        self.save()?;
        Ok(Some(removed))
    }

    fn save(&self) -> ManagerResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ManagerError::CreateDirFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(&self.document).map_err(|e| {
            ManagerError::RegistryCorrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            }
        })?;

        fs::write(&self.path, content).map_err(|source| ManagerError::WriteFailed {
            path: self.path.clone(),
            source,
        })
    }
}
