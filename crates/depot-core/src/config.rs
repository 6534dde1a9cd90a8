//! Run configuration for the install pipeline.

use crate::error::Error;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of concurrent units of work per stage.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Name of the destination directory under the working directory.
pub const DEST_DIR_NAME: &str = "modules";

/// Configuration for one install run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Project working directory holding the manifest.
    pub workdir: PathBuf,

    /// Root of the package cache tree.
    pub cache_root: PathBuf,

    /// Destination directory override; defaults to `workdir/modules`.
    pub dest_dir: Option<PathBuf>,

    /// Maximum concurrent units of work per stage.
    pub concurrency: usize,

    /// Include the development dependency group.
    pub include_dev: bool,

    /// Keep an existing destination directory instead of moving it aside.
    pub preserve_dest: bool,

    /// Target architecture tag.
    pub arch: String,

    /// Target binary ABI tag.
    pub abi: String,
}

impl RunConfig {
    /// Create a config for the given working directory with defaults for
    /// everything else.
    #[must_use]
    pub fn new(workdir: PathBuf) -> Self {
        Self {
            workdir,
            cache_root: paths::default_cache_root(),
            dest_dir: None,
            concurrency: DEFAULT_CONCURRENCY,
            include_dev: false,
            preserve_dest: false,
            arch: paths::host_arch(),
            abi: paths::target_abi(),
        }
    }

    /// Set the cache root.
    #[must_use]
    pub fn with_cache_root(mut self, root: PathBuf) -> Self {
        self.cache_root = root;
        self
    }

    /// Set the destination directory.
    #[must_use]
    pub fn with_dest_dir(mut self, dest: PathBuf) -> Self {
        self.dest_dir = Some(dest);
        self
    }

    /// Set the per-stage concurrency limit.
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit;
        self
    }

    /// Include the development dependency group.
    #[must_use]
    pub fn with_dev(mut self, include: bool) -> Self {
        self.include_dev = include;
        self
    }

    /// Preserve an existing destination directory.
    #[must_use]
    pub fn with_preserve_dest(mut self, preserve: bool) -> Self {
        self.preserve_dest = preserve;
        self
    }

    /// Set the target architecture and ABI tags.
    #[must_use]
    pub fn with_target(mut self, arch: impl Into<String>, abi: impl Into<String>) -> Self {
        self.arch = arch.into();
        self.abi = abi.into();
        self
    }

    /// The effective destination directory.
    #[must_use]
    pub fn dest_dir(&self) -> PathBuf {
        self.dest_dir
            .clone()
            .unwrap_or_else(|| self.workdir.join(DEST_DIR_NAME))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns a config error if the working directory does not exist or the
    /// concurrency limit is zero.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.workdir.is_dir() {
            return Err(Error::config(format!(
                "working directory does not exist: {}",
                self.workdir.display()
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::config("concurrency limit must be at least 1"));
        }
        if self.arch.is_empty() || self.abi.is_empty() {
            return Err(Error::config("arch and abi tags must be non-empty"));
        }
        Ok(())
    }
}
