//! The package-resolution boundary.
//!
//! The pipeline consumes this capability as an opaque trait so tests can
//! substitute a mock and stricter resolvers can be swapped in without
//! changing the pipeline's shape.

use crate::error::Error;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// Version information for one package name, as reported by the registry.
#[derive(Debug, Clone)]
pub struct VersionListing {
    /// The currently-latest published version.
    pub latest: String,
    /// All published versions.
    pub versions: Vec<String>,
    /// The upstream metadata document, with per-version entries under a
    /// `"versions"` key.
    pub metadata: Value,
}

impl VersionListing {
    /// The metadata slice for one version, or `Null` when absent.
    #[must_use]
    pub fn version_metadata(&self, version: &str) -> Value {
        self.metadata
            .get("versions")
            .and_then(|v| v.get(version))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

/// External package-resolution capability.
#[async_trait]
pub trait PackageResolver: Send + Sync {
    /// Fetch the available versions and latest metadata for a package name.
    ///
    /// # Errors
    /// Returns a resolution error on unknown package or registry failure.
    async fn list_versions(&self, name: &str) -> Result<VersionListing, Error>;

    /// Download and build `name@version` into `dest`.
    ///
    /// On success `dest` contains the package payload directly.
    ///
    /// # Errors
    /// Returns a fetch error on network or build failure.
    async fn fetch_and_build(&self, name: &str, version: &str, dest: &Path) -> Result<(), Error>;
}
