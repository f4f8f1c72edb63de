//! Trait definitions for package manager components.
//!
//! The installer never talks to the network directly. Everything it needs
//! from the server goes through [`PackageSource`], which keeps the engine
//! testable with an in-memory source.

use std::fmt;
use std::io::Read;

use uuid::Uuid;

use crate::package::Package;

use super::error::ManagerResult;

/// A remote file opened for reading.
pub struct RemoteStream {
    /// Raw body bytes.
    pub reader: Box<dyn Read + Send>,
    /// Length declared by the server, if any.
    pub content_length: Option<u64>,
}

impl RemoteStream {
    /// Wrap a reader with an optional declared length.
    pub fn new(reader: impl Read + Send + 'static, content_length: Option<u64>) -> Self {
        Self {
            reader: Box::new(reader),
            content_length,
        }
    }
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Transport for package manifests and file contents.
///
/// Implementations must be usable from the install worker thread.
pub trait PackageSource: Send + Sync {
    /// Fetch the current manifest of a package.
    ///
    /// Failures are reported as `ManagerError::ManifestFetch`.
    fn fetch_manifest(&self, package_id: &Uuid) -> ManagerResult<Package>;

    /// Open the content stream of a remote file.
    ///
    /// Failures should be retryable errors (`Transfer`, `HttpStatus`,
    /// `Timeout`) so the downloader can try again.
    fn open_file_stream(&self, remote_id: &Uuid) -> ManagerResult<RemoteStream>;

    /// Manifests the server offers for the given installed package ids.
    ///
    /// Sources without a package listing offer nothing.
    fn available_packages(&self, installed: &[Uuid]) -> ManagerResult<Vec<Package>> {
        let _ = installed;
        Ok(Vec::new())
    }

    /// Ids among `installed` that the server has revoked or deleted.
    ///
    /// Sources without a package listing revoke nothing.
    fn revoked_packages(&self, installed: &[Uuid]) -> ManagerResult<Vec<Uuid>> {
        let _ = installed;
        Ok(Vec::new())
    }
}

impl<S: PackageSource + ?Sized> PackageSource for std::sync::Arc<S> {
    fn fetch_manifest(&self, package_id: &Uuid) -> ManagerResult<Package> {
        (**self).fetch_manifest(package_id)
    }

    fn open_file_stream(&self, remote_id: &Uuid) -> ManagerResult<RemoteStream> {
        (**self).open_file_stream(remote_id)
    }

    fn available_packages(&self, installed: &[Uuid]) -> ManagerResult<Vec<Package>> {
        (**self).available_packages(installed)
    }

    fn revoked_packages(&self, installed: &[Uuid]) -> ManagerResult<Vec<Uuid>> {
        (**self).revoked_packages(installed)
    }
}
