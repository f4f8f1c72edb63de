//! Background install worker.
//!
//! [`InstallWorker::spawn`] moves an installer and its batch onto a
//! dedicated thread so the caller stays responsive. The returned
//! [`InstallHandle`] can cancel the batch, poll the shared progress
//! counters and wait for the outcome.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

use crate::package::Package;

use super::download::{ProgressCounters, ProgressSnapshot};
use super::error::{ManagerError, ManagerResult};
use super::installer::{InstallOutcome, PackageInstaller};
use super::traits::PackageSource;

/// Name of the install thread.
pub const WORKER_THREAD_NAME: &str = "pkgsync-install";

/// Spawns install batches on a background thread.
pub struct InstallWorker;

impl InstallWorker {
    /// Run `installer.install(packages)` on a new thread.
    pub fn spawn<S>(installer: PackageInstaller<S>, packages: Vec<Package>) -> ManagerResult<InstallHandle>
    where
        S: PackageSource + 'static,
    {
        Self::spawn_with(installer, move |installer, cancel| {
            installer.install(&packages, cancel)
        })
    }

    /// Run `installer.install_by_ids(ids)` on a new thread.
    pub fn spawn_by_ids<S>(
        installer: PackageInstaller<S>,
        ids: Vec<Uuid>,
    ) -> ManagerResult<InstallHandle>
    where
        S: PackageSource + 'static,
    {
        Self::spawn_with(installer, move |installer, cancel| {
            installer.install_by_ids(&ids, cancel)
        })
    }

    fn spawn_with<S, F>(installer: PackageInstaller<S>, run: F) -> ManagerResult<InstallHandle>
    where
        S: PackageSource + 'static,
        F: FnOnce(&PackageInstaller<S>, &CancellationToken) -> ManagerResult<InstallOutcome>
            + Send
            + 'static,
    {
        let cancel = CancellationToken::new();
        let counters = installer.counters();
        let worker_cancel = cancel.clone();

        let thread = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let result = run(&installer, &worker_cancel);
                if let Err(e) = &result {
                    error!(error = %e, "Install batch failed");
                }
                result
            })
            .map_err(|e| ManagerError::WorkerFailed(format!("failed to spawn thread: {}", e)))?;

        Ok(InstallHandle {
            thread,
            cancel,
            counters,
        })
    }
}

/// Handle to a running install batch.
pub struct InstallHandle {
    thread: JoinHandle<ManagerResult<InstallOutcome>>,
    cancel: CancellationToken,
    counters: Arc<ProgressCounters>,
}

impl InstallHandle {
    /// Request cancellation. Observed before the next file.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the cancellation token, e.g. for a Ctrl-C handler.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current progress.
    pub fn progress(&self) -> ProgressSnapshot {
        self.counters.snapshot()
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the batch to finish.
    pub fn join(self) -> ManagerResult<InstallOutcome> {
        self.thread
            .join()
            .map_err(|_| ManagerError::WorkerFailed("install thread panicked".to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Barrier, Once};

    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::manager::config::ManagerConfig;
    use crate::manager::traits::RemoteStream;
    use crate::package::{PackageFile, PackageFolder};

    /// Serves every file as `size` bytes and blocks the first open on a barrier.
    struct GatedSource {
        size: usize,
        gate: Arc<Barrier>,
        first: Once,
    }

    impl PackageSource for GatedSource {
        fn fetch_manifest(&self, package_id: &Uuid) -> ManagerResult<Package> {
            Err(ManagerError::ManifestFetch {
                package_id: *package_id,
                reason: "offline".to_string(),
            })
        }

        fn open_file_stream(&self, _remote_id: &Uuid) -> ManagerResult<RemoteStream> {
            self.first.call_once(|| {
                self.gate.wait();
                self.gate.wait();
            });
            Ok(RemoteStream::new(
                Cursor::new(vec![0u8; self.size]),
                Some(self.size as u64),
            ))
        }
    }

    fn package(files: usize) -> Package {
        let mut folder = PackageFolder::new("data");
        for i in 0..files {
            folder = folder.with_file(
                PackageFile::new(Uuid::new_v4(), format!("f{}.bin", i), Utc::now()).with_size(16),
            );
        }
        Package::new(Uuid::new_v4(), "Data", 1).with_folder(folder)
    }

    #[test]
    fn test_worker_runs_batch() {
        let temp = TempDir::new().unwrap();
        let gate = Arc::new(Barrier::new(1));
        let source = GatedSource {
            size: 16,
            gate,
            first: Once::new(),
        };
        let installer = PackageInstaller::new(
            source,
            ManagerConfig::new(temp.path().join("dist")).with_state_dir(temp.path()),
        );

        let handle = InstallWorker::spawn(installer, vec![package(3)]).unwrap();
        let outcome = handle.join().unwrap();

        assert_eq!(outcome.files_downloaded, 3);
        assert_eq!(outcome.bytes_downloaded, 48);
        assert!(!outcome.cancelled);
    }

    #[test]
    fn test_cancel_stops_between_files() {
        let temp = TempDir::new().unwrap();
        let gate = Arc::new(Barrier::new(2));
        let source = GatedSource {
            size: 16,
            gate: Arc::clone(&gate),
            first: Once::new(),
        };
        let installer = PackageInstaller::new(
            source,
            ManagerConfig::new(temp.path().join("dist")).with_state_dir(temp.path()),
        );

        let handle = InstallWorker::spawn(installer, vec![package(5)]).unwrap();

        // Worker is inside the first transfer
        gate.wait();
        handle.cancel();
        gate.wait();

        let outcome = handle.join().unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.files_downloaded, 1);
        assert_eq!(outcome.packages_installed, 0);
    }
}
