//! Registry-backed implementation of the package-resolution capability.
//!
//! Talks to an npm-style packument registry: version listings come from the
//! package's metadata document, fetches download the version tarball and
//! unpack it into the caller-provided directory.

use crate::error::Error;
use crate::resolver::{PackageResolver, VersionListing};
use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use reqwest::Client;
use serde_json::Value;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path};
use std::time::Duration;
use tar::Archive;
use url::Url;

/// Default registry URL.
pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org/";

/// Environment variable to override the registry URL.
pub const REGISTRY_ENV: &str = "DEPOT_REGISTRY";

/// Maximum accepted tarball size (200 MB).
pub const MAX_FETCH_SIZE: u64 = 200 * 1024 * 1024;

const CONNECT_TIMEOUT_SECS: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Production resolver over an npm-style registry.
#[derive(Debug, Clone)]
pub struct RegistryResolver {
    base_url: Url,
    http: Client,
}

impl RegistryResolver {
    /// Create a resolver for the given registry base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be
    /// created.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let base_url = Url::parse(base_url).map_err(|e| {
            Error::config(format!("invalid registry URL '{base_url}': {e}"))
        })?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("depot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { base_url, http })
    }

    /// Create a resolver using the registry URL from the environment or the
    /// default.
    ///
    /// # Errors
    /// Returns an error if the client cannot be created.
    pub fn from_env() -> Result<Self, Error> {
        let url = std::env::var(REGISTRY_ENV).unwrap_or_else(|_| DEFAULT_REGISTRY.to_string());
        Self::new(&url)
    }

    /// Get the registry base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The conventional tarball URL for `name@version`.
    fn tarball_url(&self, name: &str, version: &str) -> Result<Url, Error> {
        let basename = name.rsplit('/').next().unwrap_or(name);
        self.base_url
            .join(&format!("{name}/-/{basename}-{version}.tgz"))
            .map_err(|e| Error::fetch(name, version, format!("failed to build tarball URL: {e}")))
    }

    async fn download(&self, name: &str, version: &str, url: &Url) -> Result<Bytes, Error> {
        let response = self
            .http
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| Error::fetch(name, version, format!("download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::fetch(
                name,
                version,
                format!("download failed with status {}", response.status()),
            ));
        }

        if let Some(len) = response.content_length() {
            if len > MAX_FETCH_SIZE {
                return Err(Error::fetch(
                    name,
                    version,
                    format!("tarball too large: {len} bytes (max: {MAX_FETCH_SIZE})"),
                ));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::fetch(name, version, format!("failed to read body: {e}")))?;

        if bytes.len() as u64 > MAX_FETCH_SIZE {
            return Err(Error::fetch(
                name,
                version,
                format!("tarball too large: {} bytes (max: {MAX_FETCH_SIZE})", bytes.len()),
            ));
        }

        Ok(bytes)
    }
}

#[async_trait]
impl PackageResolver for RegistryResolver {
    async fn list_versions(&self, name: &str) -> Result<VersionListing, Error> {
        let encoded = name.replace('/', "%2F");
        let url = self
            .base_url
            .join(&encoded)
            .map_err(|e| Error::resolution(name, format!("failed to build URL: {e}")))?;

        let response = self
            .http
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| Error::resolution(name, format!("registry request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::resolution(name, "package not found"));
        }
        if !response.status().is_success() {
            return Err(Error::resolution(
                name,
                format!("registry returned status {}", response.status()),
            ));
        }

        let packument: Value = response
            .json()
            .await
            .map_err(|e| Error::resolution(name, format!("invalid registry response: {e}")))?;

        parse_listing(name, packument)
    }

    async fn fetch_and_build(&self, name: &str, version: &str, dest: &Path) -> Result<(), Error> {
        let url = self.tarball_url(name, version)?;
        let bytes = self.download(name, version, &url).await?;
        unpack_archive(&bytes, dest)
            .map_err(|e| Error::fetch(name, version, format!("unpack failed: {e}")))
    }
}

/// Build a [`VersionListing`] from a packument document.
///
/// # Errors
/// Returns a resolution error when the document carries no latest tag and no
/// versions.
pub fn parse_listing(name: &str, packument: Value) -> Result<VersionListing, Error> {
    let versions: Vec<String> = packument
        .get("versions")
        .and_then(Value::as_object)
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default();

    let latest = packument
        .get("dist-tags")
        .and_then(|t| t.get("latest"))
        .and_then(Value::as_str)
        .map(String::from)
        .or_else(|| versions.last().cloned())
        .ok_or_else(|| Error::resolution(name, "packument has no latest version"))?;

    Ok(VersionListing {
        latest,
        versions,
        metadata: packument,
    })
}

/// Unpack a gzipped tarball into `dest`, stripping the archive's top-level
/// directory so `dest` holds the package payload directly.
fn unpack_archive(bytes: &[u8], dest: &Path) -> io::Result<()> {
    let gz = GzDecoder::new(bytes);
    let mut archive = Archive::new(gz);

    fs::create_dir_all(dest)?;

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if path.is_absolute() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("archive contains absolute path: {}", path.display()),
            ));
        }
        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("archive contains path traversal: {}", path.display()),
            ));
        }

        // Strip the leading directory (`package/` or the bare package name).
        let mut components = path.components();
        components.next();
        let rel = components.as_path();
        if rel.as_os_str().is_empty() {
            continue;
        }

        let dest_path = dest.join(rel);
        if !dest_path.starts_with(dest) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("archive entry escapes destination: {}", path.display()),
            ));
        }

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else if entry_type.is_file() {
            let mut file = File::create(&dest_path)?;
            io::copy(&mut entry, &mut file)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(mode) = entry.header().mode() {
                    let _ = fs::set_permissions(&dest_path, fs::Permissions::from_mode(mode));
                }
            }
        }
        // Symlinks and special entries are skipped
    }

    Ok(())
}
