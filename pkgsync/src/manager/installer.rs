//! Package installer.
//!
//! This module orchestrates the installation of a batch of packages:
//! 1. Estimate the bytes the batch will transfer
//! 2. Order packages by ascending priority
//! 3. Per package: resolve the root directory, detect a version upgrade,
//!    remove content the previous version had and this one drops
//! 4. Walk the new folder tree, downloading files the attribute policy
//!    lets through and classifying every file
//! 5. Record the package in the registry and the download log
//!
//! ```text
//! install(packages)
//!   │
//!   ├── estimate_download_size ──► ProgressTracker(total)
//!   │
//!   └── for package in priority order
//!         ├── registry.recorded_version ──► is_version_upgrade
//!         ├── TreeDiffer::reconcile(previous folders, new folders)
//!         ├── walk ──► [ClassifiedFile]
//!         │     └── should_download? ──► FileSyncDownloader::fetch
//!         ├── registry.record_installed
//!         └── DownloadLog::append
//! ```
//!
//! The first fatal error aborts the whole batch. Files already written stay
//! on disk; a later run converges because transferred files carry the
//! remote timestamp.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::package::{package_root_path, InstalledPackageRecord, Package, PackageFile, PackageFolder};

use super::config::ManagerConfig;
use super::diff::TreeDiffer;
use super::download::{
    FileSyncDownloader, ProgressCallback, ProgressCounters, ProgressEvent, ProgressTracker,
};
use super::error::{ManagerError, ManagerResult};
use super::log::DownloadLog;
use super::policy::{classify, should_download, Classification, LocalFileState};
use super::registry::InstalledPackageRegistry;
use super::traits::PackageSource;

/// What an install batch produced for the execution collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutcome {
    /// Files to run, in discovery order, without duplicates.
    pub execute_files: Vec<PathBuf>,
    /// Files flagged as top-level sequences, in discovery order.
    pub top_level_sequences: Vec<PathBuf>,
    /// Packages installed and recorded.
    pub packages_installed: usize,
    /// Files transferred.
    pub files_downloaded: usize,
    /// Files left untouched by the attribute policy.
    pub files_skipped: usize,
    /// Bytes written by successful transfers.
    pub bytes_downloaded: u64,
    /// The batch stopped early on request.
    pub cancelled: bool,
}

impl InstallOutcome {
    /// Add a file to the execute list unless it is already there.
    pub fn push_execute(&mut self, path: PathBuf) {
        if !self.execute_files.contains(&path) {
            self.execute_files.push(path);
        }
    }

    fn count(&mut self, files: &[ClassifiedFile]) {
        for file in files {
            if file.downloaded {
                self.files_downloaded += 1;
                self.bytes_downloaded += file.bytes;
            } else {
                self.files_skipped += 1;
            }
        }
    }

    fn absorb(&mut self, files: Vec<ClassifiedFile>) {
        for file in files {
            if file.classification.top_level {
                self.top_level_sequences.push(file.path.clone());
            }
            if file.classification.execute {
                self.push_execute(file.path);
            }
        }
    }
}

/// A file visited by the tree walk and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedFile {
    /// Local destination path.
    pub path: PathBuf,
    /// Transferred during this run.
    pub downloaded: bool,
    /// Bytes written when transferred.
    pub bytes: u64,
    /// Execute / top-level classification.
    pub classification: Classification,
}

struct PackageRun {
    files: Vec<ClassifiedFile>,
    cancelled: bool,
}

/// Package installer.
///
/// Installs are strictly sequential: one package at a time, one file at a
/// time, on the calling thread. Use [`InstallWorker`](super::InstallWorker)
/// to run a batch in the background.
pub struct PackageInstaller<S: PackageSource> {
    source: S,
    config: ManagerConfig,
    differ: TreeDiffer,
    log: DownloadLog,
    counters: Arc<ProgressCounters>,
    on_progress: Option<ProgressCallback>,
}

impl<S: PackageSource> PackageInstaller<S> {
    /// Create a new package installer.
    ///
    /// # Arguments
    ///
    /// * `source` - Transport for manifests and file contents
    /// * `config` - Directories and transfer settings
    pub fn new(source: S, config: ManagerConfig) -> Self {
        let log = DownloadLog::new(config.download_log_path());
        Self {
            source,
            config,
            differ: TreeDiffer::new(),
            log,
            counters: Arc::new(ProgressCounters::new()),
            on_progress: None,
        }
    }

    /// Set the progress event callback.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Shared counters updated while installing.
    pub fn counters(&self) -> Arc<ProgressCounters> {
        Arc::clone(&self.counters)
    }

    /// Installer configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Package transport.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Open the installed package registry.
    pub fn registry(&self) -> ManagerResult<InstalledPackageRegistry> {
        InstalledPackageRegistry::open(self.config.installed_packages_path())
    }

    /// Fetch the current manifest of every id, then install them.
    ///
    /// Every manifest is fetched before anything is written.
    pub fn install_by_ids(
        &self,
        ids: &[Uuid],
        cancel: &CancellationToken,
    ) -> ManagerResult<InstallOutcome> {
        let packages = ids
            .iter()
            .map(|id| self.source.fetch_manifest(id))
            .collect::<ManagerResult<Vec<_>>>()?;
        self.install(&packages, cancel)
    }

    /// Install a batch of packages.
    ///
    /// Cancellation is observed between files. A cancelled package is not
    /// recorded and contributes no execute or top-level entries; the
    /// returned outcome has `cancelled` set.
    pub fn install(
        &self,
        packages: &[Package],
        cancel: &CancellationToken,
    ) -> ManagerResult<InstallOutcome> {
        for package in packages {
            package
                .validate()
                .map_err(|source| ManagerError::InvalidManifest {
                    package: package.name.clone(),
                    source,
                })?;
        }

        let mut registry = self.registry()?;

        let mut ordered: Vec<&Package> = packages.iter().collect();
        ordered.sort_by_key(|package| package.priority);

        let total_expected = self.estimate_download_size(packages, &registry);
        info!(
            packages = ordered.len(),
            total_expected, "Starting install batch"
        );

        let mut tracker =
            ProgressTracker::new(&self.counters, self.on_progress.as_ref(), total_expected);
        let downloader =
            FileSyncDownloader::new(&self.source, self.config.chunk_size, self.config.max_attempts);
        let mut outcome = InstallOutcome::default();

        for package in ordered {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let run =
                self.install_package(package, &mut registry, &downloader, &mut tracker, cancel)?;
            outcome.count(&run.files);

            if run.cancelled {
                outcome.cancelled = true;
                break;
            }
            outcome.packages_installed += 1;
            outcome.absorb(run.files);
        }

        info!(
            packages_installed = outcome.packages_installed,
            files_downloaded = outcome.files_downloaded,
            files_skipped = outcome.files_skipped,
            bytes_downloaded = outcome.bytes_downloaded,
            cancelled = outcome.cancelled,
            "Install batch finished"
        );
        Ok(outcome)
    }

    /// Bytes the batch is expected to transfer.
    ///
    /// Only files the attribute policy would download count, with their
    /// declared size (unknown sizes count as zero).
    pub fn estimate_download_size(
        &self,
        packages: &[Package],
        registry: &InstalledPackageRegistry,
    ) -> u64 {
        packages
            .iter()
            .map(|package| {
                let root = package_root_path(&self.config.distribution_root, package);
                let is_version_upgrade = registry
                    .recorded_version(&package.name)
                    .is_some_and(|recorded| recorded < package.version);
                package
                    .root_folders()
                    .map(|folder| pending_size(&root, folder, is_version_upgrade))
                    .sum::<u64>()
            })
            .sum()
    }

    /// Delete a recorded package's files and forget it.
    ///
    /// Files the package never recorded are kept. Returns the removed
    /// record, or `None` when no package of that name is installed.
    pub fn uninstall(&self, name: &str) -> ManagerResult<Option<InstalledPackageRecord>> {
        let mut registry = self.registry()?;
        let Some(record) = registry.previous_install(name).cloned() else {
            return Ok(None);
        };

        let report = self.differ.remove_tree(&record.root_path, &record.folders);
        registry.remove(name)?;

        info!(
            package = %name,
            version = record.version,
            files_removed = report.files_removed,
            folders_removed = report.folders_removed,
            failures = report.failures.len(),
            "Package uninstalled"
        );
        Ok(Some(record))
    }

    /// Manifests the server offers that are newer than what is installed.
    ///
    /// Packages the registry does not know are always offered.
    pub fn check_updates(&self) -> ManagerResult<Vec<Package>> {
        let registry = self.registry()?;
        let installed: Vec<Uuid> = registry
            .records()
            .iter()
            .filter(|record| record.installed)
            .map(|record| record.package_id)
            .collect();

        let mut offered = self.source.available_packages(&installed)?;
        offered.retain(|package| {
            registry
                .recorded_version(&package.name)
                .map_or(true, |recorded| recorded < package.version)
        });
        offered.sort_by(|a, b| a.name.cmp(&b.name));

        info!(
            installed = installed.len(),
            available = offered.len(),
            "Checked for package updates"
        );
        Ok(offered)
    }

    /// Remove every installed package the server has revoked.
    ///
    /// A package installed into its own folder loses that folder; other
    /// packages lose only their recorded files. Returns the removed records.
    pub fn remove_revoked(&self) -> ManagerResult<Vec<InstalledPackageRecord>> {
        let mut registry = self.registry()?;
        let installed: Vec<Uuid> = registry
            .records()
            .iter()
            .map(|record| record.package_id)
            .collect();
        if installed.is_empty() {
            return Ok(Vec::new());
        }

        let revoked = self.source.revoked_packages(&installed)?;
        let doomed: Vec<InstalledPackageRecord> = registry
            .records()
            .iter()
            .filter(|record| revoked.contains(&record.package_id))
            .cloned()
            .collect();

        for record in &doomed {
            let report = self.differ.remove_record(record);
            registry.remove(&record.name)?;
            info!(
                package = %record.name,
                version = record.version,
                files_removed = report.files_removed,
                folders_removed = report.folders_removed,
                failures = report.failures.len(),
                "Revoked package removed"
            );
        }
        Ok(doomed)
    }

    fn install_package(
        &self,
        package: &Package,
        registry: &mut InstalledPackageRegistry,
        downloader: &FileSyncDownloader<'_, S>,
        tracker: &mut ProgressTracker<'_>,
        cancel: &CancellationToken,
    ) -> ManagerResult<PackageRun> {
        let root = package_root_path(&self.config.distribution_root, package);
        fs::create_dir_all(&root).map_err(|source| ManagerError::CreateDirFailed {
            path: root.clone(),
            source,
        })?;

        let recorded_version = registry.recorded_version(&package.name);
        let is_version_upgrade = recorded_version.is_some_and(|recorded| recorded < package.version);

        info!(
            package = %package.name,
            version = package.version,
            recorded_version = ?recorded_version,
            is_version_upgrade,
            root = %root.display(),
            "Installing package"
        );
        tracker.emit(ProgressEvent::PackageStarted {
            name: package.name.clone(),
            version: package.version,
        });

        let new_folders: Vec<PackageFolder> = package.root_folders().cloned().collect();

        if let Some(previous) = registry.previous_install(&package.name) {
            let report = self.differ.reconcile(&root, &previous.folders, &new_folders);
            tracker.emit(ProgressEvent::CleanupFinished {
                package: package.name.clone(),
                files_removed: report.files_removed,
                folders_removed: report.folders_removed,
                failures: report.failures.len(),
            });
        }

        let mut walk = TreeWalk {
            downloader,
            tracker: &mut *tracker,
            cancel,
            is_version_upgrade,
            cancelled: false,
        };
        let files = walk.folders(&root, &new_folders)?;

        if walk.cancelled {
            info!(package = %package.name, "Install cancelled, package not recorded");
            return Ok(PackageRun {
                files,
                cancelled: true,
            });
        }

        let bytes: u64 = files.iter().map(|file| file.bytes).sum();
        registry.record_installed(package, &root, bytes)?;
        self.log.append(package, bytes);

        tracker.emit(ProgressEvent::PackageCompleted {
            name: package.name.clone(),
            version: package.version,
        });
        info!(
            package = %package.name,
            version = package.version,
            bytes,
            "Package installed"
        );

        Ok(PackageRun {
            files,
            cancelled: false,
        })
    }
}

/// Recursive walk over a package's new folder tree.
struct TreeWalk<'w, 'd, 't, S: PackageSource> {
    downloader: &'w FileSyncDownloader<'d, S>,
    tracker: &'w mut ProgressTracker<'t>,
    cancel: &'w CancellationToken,
    is_version_upgrade: bool,
    cancelled: bool,
}

impl<S: PackageSource> TreeWalk<'_, '_, '_, S> {
    fn folders(&mut self, dir: &Path, folders: &[PackageFolder]) -> ManagerResult<Vec<ClassifiedFile>> {
        let mut classified = Vec::new();

        for folder in folders {
            let folder_dir = dir.join(&folder.name);
            fs::create_dir_all(&folder_dir).map_err(|source| ManagerError::CreateDirFailed {
                path: folder_dir.clone(),
                source,
            })?;

            for file in &folder.files {
                if self.cancel.is_cancelled() {
                    self.cancelled = true;
                    return Ok(classified);
                }
                classified.push(self.file(&folder_dir, file)?);
            }

            classified.extend(self.folders(&folder_dir, &folder.folders)?);
            if self.cancelled {
                return Ok(classified);
            }
        }

        Ok(classified)
    }

    fn file(&mut self, dir: &Path, file: &PackageFile) -> ManagerResult<ClassifiedFile> {
        let path = dir.join(&file.name);
        let local = local_file_state(&path)?;

        let (downloaded, bytes) =
            if should_download(local, file.modified, file.attributes, self.is_version_upgrade) {
                self.tracker.emit(ProgressEvent::FileStarted {
                    path: path.clone(),
                    expected: file.size,
                });
                let bytes = self.downloader.fetch(
                    &file.remote_id,
                    &path,
                    file.size,
                    file.modified,
                    &mut *self.tracker,
                )?;
                self.tracker.emit(ProgressEvent::FileCompleted {
                    path: path.clone(),
                    bytes,
                });
                (true, bytes)
            } else {
                debug!(
                    path = %path.display(),
                    attributes = %file.attributes,
                    "File skipped"
                );
                (false, 0)
            };

        Ok(ClassifiedFile {
            classification: classify(file.attributes, downloaded, self.is_version_upgrade),
            path,
            downloaded,
            bytes,
        })
    }
}

fn local_file_state(path: &Path) -> ManagerResult<LocalFileState> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(LocalFileState::Present {
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(LocalFileState::Missing),
        Err(source) => Err(ManagerError::ReadFailed {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn pending_size(dir: &Path, folder: &PackageFolder, is_version_upgrade: bool) -> u64 {
    let folder_dir = dir.join(&folder.name);
    let files: u64 = folder
        .files
        .iter()
        .filter(|file| {
            let local =
                local_file_state(&folder_dir.join(&file.name)).unwrap_or(LocalFileState::Missing);
            should_download(local, file.modified, file.attributes, is_version_upgrade)
        })
        .map(|file| file.size)
        .sum();

    files
        + folder
            .folders
            .iter()
            .map(|child| pending_size(&folder_dir, child, is_version_upgrade))
            .sum::<u64>()
}
