//! HTTP package source.
//!
//! Talks to the distribution server with a blocking reqwest client:
//!
//! - `GET {base}/api/internal/Software/GetPackage?packageId={id}` returns the
//!   package manifest as JSON
//! - `GET {base}/api/internal/Software/DownloadFile?repositoryFolderFileId={id}`
//!   returns a file's raw content
//! - `GET {base}/api/internal/Software/GetAvailablePackages?installedPackages={ids}`
//!   returns the manifests offered for the installed packages
//! - `GET {base}/api/internal/Software/GetRevokedPackages?includeRevokedOnly=true&installedPackages={ids}`
//!   returns the installed ids the server has revoked
//!
//! Id lists are comma separated.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use crate::manager::config::DEFAULT_REQUEST_TIMEOUT;
use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::{PackageSource, RemoteStream};
use crate::package::Package;

const MANIFEST_PATH: &str = "api/internal/Software/GetPackage";
const FILE_PATH: &str = "api/internal/Software/DownloadFile";
const AVAILABLE_PATH: &str = "api/internal/Software/GetAvailablePackages";
const REVOKED_PATH: &str = "api/internal/Software/GetRevokedPackages";

/// Blocking HTTP implementation of [`PackageSource`].
#[derive(Debug, Clone)]
pub struct HttpPackageSource {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpPackageSource {
    /// Create a source for `base_url` with the default 5 minute timeout.
    pub fn new(base_url: impl Into<String>) -> ManagerResult<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a source with a custom request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> ManagerResult<Self> {
        let base_url = base_url.into();
        if base_url.trim().is_empty() {
            return Err(ManagerError::InvalidConfig(
                "server base_url is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pkgsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ManagerError::InvalidConfig(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Request timeout applied to every request.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// URL of a package manifest.
    pub fn manifest_url(&self, package_id: &Uuid) -> String {
        format!("{}/{}?packageId={}", self.base_url, MANIFEST_PATH, package_id)
    }

    /// URL of a file's content.
    pub fn file_url(&self, remote_id: &Uuid) -> String {
        format!(
            "{}/{}?repositoryFolderFileId={}",
            self.base_url, FILE_PATH, remote_id
        )
    }

    /// URL listing the packages available for `installed`.
    pub fn available_url(&self, installed: &[Uuid]) -> String {
        format!(
            "{}/{}?installedPackages={}",
            self.base_url,
            AVAILABLE_PATH,
            join_ids(installed)
        )
    }

    /// URL listing which of `installed` are revoked.
    pub fn revoked_url(&self, installed: &[Uuid]) -> String {
        format!(
            "{}/{}?includeRevokedOnly=true&installedPackages={}",
            self.base_url,
            REVOKED_PATH,
            join_ids(installed)
        )
    }

    fn get_json<T: DeserializeOwned>(&self, query: &'static str, url: &str) -> ManagerResult<T> {
        debug!(url = %url, query, "Querying server");
        let query_error = |reason: String| ManagerError::ServerQuery { query, reason };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| query_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(query_error(format!("server returned {}", status)));
        }

        response
            .json::<T>()
            .map_err(|e| query_error(format!("invalid response: {}", e)))
    }

    fn transfer_error(&self, remote_id: &Uuid, error: reqwest::Error) -> ManagerError {
        if error.is_timeout() {
            ManagerError::Timeout {
                remote_id: *remote_id,
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            ManagerError::Transfer {
                remote_id: *remote_id,
                reason: error.to_string(),
            }
        }
    }
}

impl PackageSource for HttpPackageSource {
    fn fetch_manifest(&self, package_id: &Uuid) -> ManagerResult<Package> {
        let url = self.manifest_url(package_id);
        debug!(url = %url, "Fetching package manifest");

        let manifest_error = |reason: String| ManagerError::ManifestFetch {
            package_id: *package_id,
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| manifest_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(manifest_error(format!("server returned {}", status)));
        }

        response
            .json::<Package>()
            .map_err(|e| manifest_error(format!("invalid manifest: {}", e)))
    }

    fn open_file_stream(&self, remote_id: &Uuid) -> ManagerResult<RemoteStream> {
        let url = self.file_url(remote_id);
        debug!(url = %url, "Opening file stream");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.transfer_error(remote_id, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ManagerError::HttpStatus {
                remote_id: *remote_id,
                status: status.as_u16(),
            });
        }

        let content_length = response.content_length();
        Ok(RemoteStream::new(response, content_length))
    }

    fn available_packages(&self, installed: &[Uuid]) -> ManagerResult<Vec<Package>> {
        self.get_json("available packages", &self.available_url(installed))
    }

    fn revoked_packages(&self, installed: &[Uuid]) -> ManagerResult<Vec<Uuid>> {
        if installed.is_empty() {
            return Ok(Vec::new());
        }
        self.get_json("revoked packages", &self.revoked_url(installed))
    }
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
