//! Obsolete content removal.
//!
//! The [`TreeDiffer`] compares the folder tree of the previously installed
//! package version with the new manifest and deletes what the new manifest
//! no longer names. Folders and files are matched by name. Cleanup is best
//! effort: failures are logged and counted, never propagated.
//!
//! Prior trees come from persisted records, so every name is checked again
//! before it is joined into a path. Names that are not a single plain
//! segment are never deleted.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::package::{is_plain_name, InstalledPackageRecord, PackageFolder};

use super::error::ManagerError;

/// Summary of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Obsolete files deleted.
    pub files_removed: usize,
    /// Obsolete folders deleted (each with everything below it).
    pub folders_removed: usize,
    /// Paths that could not be deleted.
    pub failures: Vec<PathBuf>,
    /// Recorded names skipped because they would leave the directory.
    pub rejected_names: usize,
}

impl CleanupReport {
    /// Whether the pass removed nothing and hit no failures.
    pub fn is_noop(&self) -> bool {
        self.files_removed == 0
            && self.folders_removed == 0
            && self.failures.is_empty()
            && self.rejected_names == 0
    }

    fn accept_name(&mut self, dir: &Path, name: &str) -> bool {
        if is_plain_name(name) {
            return true;
        }
        warn!(dir = %dir.display(), name = %name, "Skipping recorded name outside the package tree");
        self.rejected_names += 1;
        false
    }

    fn record_failure(&mut self, error: ManagerError) {
        warn!(error = %error, "Cleanup of obsolete content failed");
        if let ManagerError::DeleteFailed { path, .. } = error {
            self.failures.push(path);
        }
    }
}

/// Recursive prior-tree vs new-tree reconciler.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeDiffer;

impl TreeDiffer {
    /// Create a new differ.
    pub fn new() -> Self {
        Self
    }

    /// Delete everything under `current_dir` that `existing` names and
    /// `new` does not.
    ///
    /// - An existing folder with no same-named new folder is deleted with
    ///   one recursive delete.
    /// - For folders present in both, files missing from the new folder are
    ///   deleted individually and sub-folders are reconciled recursively.
    ///
    /// When `new` holds duplicate names the first one wins.
    pub fn reconcile(
        &self,
        current_dir: &Path,
        existing: &[PackageFolder],
        new: &[PackageFolder],
    ) -> CleanupReport {
        let mut report = CleanupReport::default();
        self.reconcile_into(current_dir, existing, new, &mut report);

        debug!(
            dir = %current_dir.display(),
            files_removed = report.files_removed,
            folders_removed = report.folders_removed,
            failures = report.failures.len(),
            "Obsolete content reconciled"
        );
        report
    }

    /// Delete every recorded file of `folders`, then remove folders left
    /// empty. Files not named by `folders` are kept, as are the folders
    /// containing them.
    pub fn remove_tree(&self, current_dir: &Path, folders: &[PackageFolder]) -> CleanupReport {
        let mut report = CleanupReport::default();
        for folder in folders {
            if report.accept_name(current_dir, &folder.name) {
                self.remove_folder_contents(&current_dir.join(&folder.name), folder, &mut report);
            }
        }
        report
    }

    /// Delete everything an installed record owns.
    ///
    /// A package installed into its own folder loses that whole folder;
    /// otherwise only its recorded files go, as in [`remove_tree`](Self::remove_tree).
    pub fn remove_record(&self, record: &InstalledPackageRecord) -> CleanupReport {
        if !record.package_folder {
            return self.remove_tree(&record.root_path, &record.folders);
        }

        let mut report = CleanupReport::default();
        match delete_dir(&record.root_path) {
            Ok(true) => report.folders_removed += 1,
            Ok(false) => {}
            Err(e) => report.record_failure(e),
        }
        report
    }

    fn reconcile_into(
        &self,
        current_dir: &Path,
        existing: &[PackageFolder],
        new: &[PackageFolder],
        report: &mut CleanupReport,
    ) {
        let new_by_name = index_by_name(new);

        for existing_folder in existing {
            if !report.accept_name(current_dir, &existing_folder.name) {
                continue;
            }
            let dir = current_dir.join(&existing_folder.name);

            let Some(new_folder) = new_by_name.get(existing_folder.name.as_str()) else {
                match delete_dir(&dir) {
                    Ok(true) => report.folders_removed += 1,
                    Ok(false) => {}
                    Err(e) => report.record_failure(e),
                }
                continue;
            };

            let new_files: HashSet<&str> = new_folder
                .files
                .iter()
                .map(|file| file.name.as_str())
                .collect();

            for file in &existing_folder.files {
                if new_files.contains(file.name.as_str()) || !report.accept_name(&dir, &file.name) {
                    continue;
                }
                match delete_file(&dir.join(&file.name)) {
                    Ok(true) => report.files_removed += 1,
                    Ok(false) => {}
                    Err(e) => report.record_failure(e),
                }
            }

            self.reconcile_into(&dir, &existing_folder.folders, &new_folder.folders, report);
        }
    }

    fn remove_folder_contents(&self, dir: &Path, folder: &PackageFolder, report: &mut CleanupReport) {
        for file in &folder.files {
            if !report.accept_name(dir, &file.name) {
                continue;
            }
            match delete_file(&dir.join(&file.name)) {
                Ok(true) => report.files_removed += 1,
                Ok(false) => {}
                Err(e) => report.record_failure(e),
            }
        }

        for child in &folder.folders {
            if report.accept_name(dir, &child.name) {
                self.remove_folder_contents(&dir.join(&child.name), child, report);
            }
        }

        match fs::read_dir(dir) {
            Ok(mut entries) => {
                if entries.next().is_none() {
                    match fs::remove_dir(dir) {
                        Ok(()) => report.folders_removed += 1,
                        Err(source) => report.record_failure(ManagerError::DeleteFailed {
                            path: dir.to_path_buf(),
                            source,
                        }),
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => report.record_failure(ManagerError::DeleteFailed {
                path: dir.to_path_buf(),
                source,
            }),
        }
    }
}

fn index_by_name(folders: &[PackageFolder]) -> HashMap<&str, &PackageFolder> {
    let mut index = HashMap::with_capacity(folders.len());
    for folder in folders {
        index.entry(folder.name.as_str()).or_insert(folder);
    }
    index
}

/// Returns `Ok(false)` when the folder was already gone.
fn delete_dir(path: &Path) -> Result<bool, ManagerError> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed obsolete folder");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ManagerError::DeleteFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Returns `Ok(false)` when the file was already gone.
fn delete_file(path: &Path) -> Result<bool, ManagerError> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "Removed obsolete file");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ManagerError::DeleteFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::package::PackageFile;

    fn file(name: &str) -> PackageFile {
        PackageFile::new(Uuid::new_v4(), name, Utc::now())
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_unmatched_folder_removed_recursively() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("Drivers/Legacy/old.sys"));
        touch(&root.join("Drivers/Legacy/deep/more.sys"));
        touch(&root.join("Drivers/current.sys"));

        let existing = vec![PackageFolder::new("Drivers")
            .with_file(file("current.sys"))
            .with_folder(PackageFolder::new("Legacy").with_file(file("old.sys")))];
        let new = vec![PackageFolder::new("Drivers").with_file(file("current.sys"))];

        let report = TreeDiffer::new().reconcile(root, &existing, &new);

        assert!(!root.join("Drivers/Legacy").exists());
        assert!(root.join("Drivers/current.sys").exists());
        assert_eq!(report.folders_removed, 1);
        assert_eq!(report.files_removed, 0);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_unmatched_file_removed_individually() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("bin/keep.exe"));
        touch(&root.join("bin/drop.exe"));
        touch(&root.join("bin/untracked.txt"));

        let existing = vec![PackageFolder::new("bin")
            .with_file(file("keep.exe"))
            .with_file(file("drop.exe"))];
        let new = vec![PackageFolder::new("bin").with_file(file("keep.exe"))];

        let report = TreeDiffer::new().reconcile(root, &existing, &new);

        assert!(root.join("bin/keep.exe").exists());
        assert!(!root.join("bin/drop.exe").exists());
        assert!(root.join("bin/untracked.txt").exists());
        assert_eq!(report.files_removed, 1);
    }

    #[test]
    fn test_nested_reconcile() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("a/b/c/gone.txt"));
        touch(&root.join("a/b/stay.txt"));

        let existing = vec![PackageFolder::new("a").with_folder(
            PackageFolder::new("b")
                .with_file(file("stay.txt"))
                .with_folder(PackageFolder::new("c").with_file(file("gone.txt"))),
        )];
        let new = vec![PackageFolder::new("a")
            .with_folder(PackageFolder::new("b").with_file(file("stay.txt")))];

        TreeDiffer::new().reconcile(root, &existing, &new);

        assert!(!root.join("a/b/c").exists());
        assert!(root.join("a/b/stay.txt").exists());
    }

    #[test]
    fn test_nothing_to_delete_is_noop() {
        let temp = TempDir::new().unwrap();
        let folders = vec![PackageFolder::new("bin").with_file(file("tool.exe"))];

        let report = TreeDiffer::new().reconcile(temp.path(), &folders, &folders);
        assert!(report.is_noop());

        let report = TreeDiffer::new().reconcile(temp.path(), &[], &folders);
        assert!(report.is_noop());
    }

    #[test]
    fn test_already_absent_content_is_not_a_failure() {
        let temp = TempDir::new().unwrap();
        let existing = vec![
            PackageFolder::new("missing"),
            PackageFolder::new("bin").with_file(file("never-written.exe")),
        ];
        let new = vec![PackageFolder::new("bin")];

        let report = TreeDiffer::new().reconcile(temp.path(), &existing, &new);
        assert!(report.is_noop());
    }

    #[test]
    fn test_remove_tree_keeps_foreign_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("app/tool.exe"));
        touch(&root.join("app/lib/core.dll"));
        touch(&root.join("shared/config.ini"));
        touch(&root.join("shared/user.txt"));

        let folders = vec![
            PackageFolder::new("app")
                .with_file(file("tool.exe"))
                .with_folder(PackageFolder::new("lib").with_file(file("core.dll"))),
            PackageFolder::new("shared").with_file(file("config.ini")),
        ];

        let report = TreeDiffer::new().remove_tree(root, &folders);

        assert!(!root.join("app").exists());
        assert!(!root.join("shared/config.ini").exists());
        assert!(root.join("shared/user.txt").exists());
        assert_eq!(report.files_removed, 3);
        assert_eq!(report.folders_removed, 2);
    }

    #[test]
    fn test_recorded_names_never_escape_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("pkgroot");
        fs::create_dir_all(&root).unwrap();
        touch(&temp.path().join("precious/data.txt"));
        touch(&temp.path().join("sibling.txt"));
        let absolute = temp.path().join("precious");

        let existing = vec![
            PackageFolder::new("../precious"),
            PackageFolder::new(".."),
            PackageFolder::new(absolute.to_string_lossy()),
            PackageFolder::new("a/b"),
            PackageFolder::new("bin").with_file(file("../../sibling.txt")),
        ];
        let new = vec![PackageFolder::new("bin")];

        let report = TreeDiffer::new().reconcile(&root, &existing, &new);

        assert!(temp.path().join("precious/data.txt").exists());
        assert!(temp.path().join("sibling.txt").exists());
        assert_eq!(report.rejected_names, 5);
        assert_eq!(report.folders_removed, 0);
        assert_eq!(report.files_removed, 0);
    }

    #[test]
    fn test_remove_tree_skips_escaping_names() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("pkgroot");
        touch(&root.join("app/tool.exe"));
        touch(&temp.path().join("outside.txt"));

        let folders = vec![
            PackageFolder::new("..").with_file(file("outside.txt")),
            PackageFolder::new("app")
                .with_file(file("tool.exe"))
                .with_file(file("../../outside.txt")),
        ];

        let report = TreeDiffer::new().remove_tree(&root, &folders);

        assert!(temp.path().join("outside.txt").exists());
        assert!(!root.join("app").exists());
        assert_eq!(report.rejected_names, 2);
        assert_eq!(report.files_removed, 1);
    }

    #[test]
    fn test_remove_record_with_package_folder_drops_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("Tools");
        touch(&root.join("bin/tool.exe"));
        touch(&root.join("user-notes.txt"));

        let package = crate::package::Package::new(Uuid::new_v4(), "Tools", 1)
            .with_package_folder(true)
            .with_folder(PackageFolder::new("bin").with_file(file("tool.exe")));
        let record = InstalledPackageRecord::from_package(&package, &root, 0);

        let report = TreeDiffer::new().remove_record(&record);

        assert!(!root.exists());
        assert_eq!(report.folders_removed, 1);
    }

    #[test]
    fn test_remove_record_without_package_folder_keeps_foreign_files() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("bin/tool.exe"));
        touch(&temp.path().join("bin/other.exe"));

        let package = crate::package::Package::new(Uuid::new_v4(), "Tools", 1)
            .with_folder(PackageFolder::new("bin").with_file(file("tool.exe")));
        let record = InstalledPackageRecord::from_package(&package, temp.path(), 0);

        let report = TreeDiffer::new().remove_record(&record);

        assert!(!temp.path().join("bin/tool.exe").exists());
        assert!(temp.path().join("bin/other.exe").exists());
        assert_eq!(report.files_removed, 1);
    }
}
