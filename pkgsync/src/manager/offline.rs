//! Registry operations that need no server connection.
//!
//! Without a server nothing is downloaded, so only files that run on every
//! start (`EXECUTE_ALWAYS`) and top-level sequences can be derived, both
//! from the flat file lists of installed records. Wiping the distribution
//! root is also a purely local operation.

use std::fs;
use std::io;

use tracing::info;

use crate::package::{FileAttributes, InstalledPackageRecord};

use super::config::ManagerConfig;
use super::error::{ManagerError, ManagerResult};
use super::installer::InstallOutcome;
use super::registry::InstalledPackageRegistry;

/// Build the outcome of an offline start from recorded installs.
///
/// Records are visited sorted by package name; within a record, files keep
/// their recorded order.
pub fn offline_outcome(registry: &InstalledPackageRegistry) -> InstallOutcome {
    let mut records: Vec<_> = registry
        .records()
        .iter()
        .filter(|record| record.installed)
        .collect();
    records.sort_by(|a, b| a.name.cmp(&b.name));

    let mut outcome = InstallOutcome::default();
    for record in records {
        for path in record.files_with(FileAttributes::EXECUTE_ALWAYS) {
            outcome.push_execute(path);
        }
        outcome
            .top_level_sequences
            .extend(record.files_with(FileAttributes::TOP_LEVEL_FILE));
    }
    outcome
}

/// Delete the distribution root and forget every package installed below it.
///
/// Packages installed under their own `root_directory` elsewhere are left in
/// place and stay recorded. Returns the forgotten records.
pub fn remove_all_packages(config: &ManagerConfig) -> ManagerResult<Vec<InstalledPackageRecord>> {
    let root = &config.distribution_root;
    match fs::remove_dir_all(root) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ManagerError::DeleteFailed {
                path: root.clone(),
                source,
            })
        }
    }

    let mut registry = InstalledPackageRegistry::open(config.installed_packages_path())?;
    let forgotten: Vec<InstalledPackageRecord> = registry
        .records()
        .iter()
        .filter(|record| record.root_path.starts_with(root))
        .cloned()
        .collect();
    for record in &forgotten {
        registry.remove(&record.name)?;
    }

    info!(
        root = %root.display(),
        packages = forgotten.len(),
        "Distribution root cleared"
    );
    Ok(forgotten)
}
