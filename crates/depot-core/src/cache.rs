//! Package cache keyed by (name, version, arch, abi).
//!
//! The cache is a plain directory tree: one entry per cached build of one
//! package version for one platform/ABI combination. Entries are created at
//! most once per run and never mutated or deleted here.

use crate::error::Error;
use depot_util::fs::unique_suffix;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the staging area for in-flight fetches, under the cache root.
pub const STAGING_DIR_NAME: &str = ".staging";

/// Identifies one cached package artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub abi: String,
}

impl CacheKey {
    /// Create a key from its four components.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        arch: impl Into<String>,
        abi: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: arch.into(),
            abi: abi.into(),
        }
    }

    /// Map the key to its entry path under `root`.
    ///
    /// Pure and deterministic: `root/name/version/arch/abi`.
    #[must_use]
    pub fn path(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
            .join(&self.version)
            .join(&self.arch)
            .join(&self.abi)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{} ({}/{})",
            self.name, self.version, self.arch, self.abi
        )
    }
}

/// Package cache manager.
#[derive(Debug, Clone)]
pub struct PackageCache {
    root: PathBuf,
}

impl PackageCache {
    /// Create a cache over the given root directory.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The entry path for a key.
    #[must_use]
    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        key.path(&self.root)
    }

    /// Check whether an entry exists for a key. A filesystem stat, nothing
    /// more.
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        let path = self.entry_path(key);
        path.is_dir()
    }

    /// Ensure the cache root and staging area exist.
    ///
    /// # Errors
    /// Returns an error if the directories cannot be created.
    pub fn ensure_dirs(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.root)?;
        fs::create_dir_all(self.root.join(STAGING_DIR_NAME))?;
        Ok(())
    }

    /// Allocate a uniquely-named scratch directory for an in-flight fetch.
    ///
    /// Scratch directories live under the staging area inside the cache root
    /// so the later publish rename stays on one filesystem.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn scratch_dir(&self, key: &CacheKey) -> Result<PathBuf, Error> {
        let dir = self.root.join(STAGING_DIR_NAME).join(format!(
            "{}-{}-{}",
            sanitize_component(&key.name),
            key.version,
            unique_suffix()
        ));
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// List all cached entries as keys.
    ///
    /// # Errors
    /// Returns an error if a directory level cannot be read.
    pub fn list_entries(&self) -> Result<Vec<CacheKey>, Error> {
        let mut result = Vec::new();

        if !self.root.exists() {
            return Ok(result);
        }

        for name in read_subdirs(&self.root)? {
            for version in read_subdirs(&name.1)? {
                for arch in read_subdirs(&version.1)? {
                    for abi in read_subdirs(&arch.1)? {
                        result.push(CacheKey::new(&name.0, &version.0, &arch.0, &abi.0));
                    }
                }
            }
        }

        result.sort_by(|a, b| (&a.name, &a.version).cmp(&(&b.name, &b.version)));
        Ok(result)
    }
}

/// Enumerate non-hidden subdirectories of `dir` as (name, path) pairs.
fn read_subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>, Error> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        out.push((name.into_owned(), path));
    }
    Ok(out)
}

/// Flatten a package name into a single path component for scratch naming.
fn sanitize_component(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_key_path_mapping() {
        let key = CacheKey::new("left-pad", "1.0.0", "x86_64", "napi8");
        let path = key.path(Path::new("/cache"));
        assert_eq!(
            path,
            Path::new("/cache")
                .join("left-pad")
                .join("1.0.0")
                .join("x86_64")
                .join("napi8")
        );
    }

    #[test]
    fn test_key_path_is_pure() {
        let key = CacheKey::new("chalk", "2.4.2", "aarch64", "generic");
        let a = key.path(Path::new("/cache"));
        let b = key.path(Path::new("/cache"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_keys_distinct_paths() {
        let root = Path::new("/cache");
        let a = CacheKey::new("pkg", "1.0.0", "x86_64", "abi1").path(root);
        let b = CacheKey::new("pkg", "1.0.0", "x86_64", "abi2").path(root);
        let c = CacheKey::new("pkg", "1.0.0", "aarch64", "abi1").path(root);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_contains_false_then_true() {
        let dir = tempdir().unwrap();
        let cache = PackageCache::new(dir.path().to_path_buf());
        let key = CacheKey::new("left-pad", "1.0.0", "x86_64", "generic");

        assert!(!cache.contains(&key));

        fs::create_dir_all(cache.entry_path(&key)).unwrap();
        assert!(cache.contains(&key));
    }

    #[test]
    fn test_scratch_dirs_are_unique() {
        let dir = tempdir().unwrap();
        let cache = PackageCache::new(dir.path().to_path_buf());
        cache.ensure_dirs().unwrap();
        let key = CacheKey::new("left-pad", "1.0.0", "x86_64", "generic");

        let a = cache.scratch_dir(&key).unwrap();
        let b = cache.scratch_dir(&key).unwrap();

        assert_ne!(a, b);
        assert!(a.starts_with(dir.path().join(STAGING_DIR_NAME)));
        assert!(a.is_dir());
        assert!(b.is_dir());
    }

    #[test]
    fn test_list_empty_cache() {
        let dir = tempdir().unwrap();
        let cache = PackageCache::new(dir.path().join("missing"));
        assert!(cache.list_entries().unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_staging() {
        let dir = tempdir().unwrap();
        let cache = PackageCache::new(dir.path().to_path_buf());
        cache.ensure_dirs().unwrap();

        let key = CacheKey::new("chalk", "2.4.2", "x86_64", "generic");
        fs::create_dir_all(cache.entry_path(&key)).unwrap();
        cache.scratch_dir(&key).unwrap();

        let entries = cache.list_entries().unwrap();
        assert_eq!(entries, vec![key]);
    }
}
