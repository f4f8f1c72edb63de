//! File transfer for package installs.
//!
//! This module provides:
//! - Chunked single-file transfer with retry and rollback (`sync`)
//! - Progress counters, events and snapshots (`progress`)
//! - The blocking HTTP package source (`http`)
//!
//! # Architecture
//!
//! ```text
//! PackageInstaller
//!         │
//!         ├── FileSyncDownloader (one file, up to N attempts)
//!         │       │
//!         │       └── PackageSource::open_file_stream
//!         │               └── HttpPackageSource (reqwest, blocking)
//!         │
//!         └── ProgressTracker ──► ProgressCounters (atomic snapshot)
//!                             └─► ProgressCallback (events)
//! ```

mod http;
mod progress;
mod sync;

pub use http::HttpPackageSource;
pub use progress::{
    ProgressCallback, ProgressCounters, ProgressEvent, ProgressSnapshot, ProgressTracker,
};
pub use sync::FileSyncDownloader;
