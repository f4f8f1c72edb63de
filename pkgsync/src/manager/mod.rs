//! Package installation engine.
//!
//! This module reconciles local directory trees with package manifests:
//!
//! - **Attribute policy** (`policy`): download gate and execute / top-level
//!   classification per file
//! - **Registry** (`registry`): persisted versions and folder trees of
//!   installed packages
//! - **Tree differ** (`diff`): removal of content a new version dropped
//! - **Downloads** (`download`): chunked transfer with retry, progress, and
//!   the HTTP package source
//! - **Installer** (`installer`): the orchestrator, plus update checks and
//!   removal of revoked packages
//! - **Offline** (`offline`): outcome and cleanup from the registry alone
//! - **Worker** (`worker`): runs an installer on a background thread
//!
//! # Example
//!
//! ```no_run
//! use pkgsync::manager::{HttpPackageSource, ManagerConfig, PackageInstaller};
//! use tokio_util::sync::CancellationToken;
//! use uuid::Uuid;
//!
//! let source = HttpPackageSource::new("https://dist.example")?;
//! let installer = PackageInstaller::new(source, ManagerConfig::new("/opt/dist"));
//!
//! let outcome = installer.install_by_ids(&[Uuid::nil()], &CancellationToken::new())?;
//! for path in &outcome.execute_files {
//!     println!("run {}", path.display());
//! }
//! # Ok::<(), pkgsync::manager::ManagerError>(())
//! ```

mod config;
mod diff;
mod download;
mod error;
mod installer;
mod log;
mod offline;
mod policy;
mod registry;
mod traits;
mod worker;

pub use config::{
    parse_chunk_size, ManagerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ATTEMPTS, MAX_CHUNK_SIZE,
    DEFAULT_REQUEST_TIMEOUT, DOWNLOAD_LOG_FILE, INSTALLED_PACKAGES_FILE,
};
pub use diff::{CleanupReport, TreeDiffer};
pub use download::{
    FileSyncDownloader, HttpPackageSource, ProgressCallback, ProgressCounters, ProgressEvent,
    ProgressSnapshot, ProgressTracker,
};
pub use error::{ErrorKind, ManagerError, ManagerResult};
pub use installer::{ClassifiedFile, InstallOutcome, PackageInstaller};
pub use log::{DownloadLog, DownloadLogEntry};
pub use offline::{offline_outcome, remove_all_packages};
pub use policy::{classify, should_download, Classification, LocalFileState};
pub use registry::InstalledPackageRegistry;
pub use traits::{PackageSource, RemoteStream};
pub use worker::{InstallHandle, InstallWorker, WORKER_THREAD_NAME};
