//! Cache root and platform tag helpers.

use std::path::PathBuf;

/// Cache layout schema version. Bumped when the key-to-path mapping changes.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Default ABI tag for packages without native components.
pub const DEFAULT_ABI_TAG: &str = "generic";

/// Environment variable overriding the target ABI tag.
pub const ABI_ENV: &str = "DEPOT_ABI";

/// Get the default package cache root.
///
/// Uses platform-appropriate locations with versioning:
/// - Linux: `$XDG_CACHE_HOME/depot/v{N}/packages` or `~/.cache/depot/v{N}/packages`
/// - macOS: `~/Library/Caches/depot/v{N}/packages`
/// - Windows: `%LOCALAPPDATA%\depot\cache\v{N}\packages`
#[must_use]
pub fn default_cache_root() -> PathBuf {
    let base = dirs_next::cache_dir().map_or_else(
        || {
            dirs_next::home_dir().map_or_else(
                || PathBuf::from(".depot-cache"),
                |p| p.join(".cache").join("depot"),
            )
        },
        |p| p.join("depot"),
    );

    base.join(format!("v{CACHE_SCHEMA_VERSION}")).join("packages")
}

/// The host architecture tag (e.g. `x86_64`, `aarch64`).
#[must_use]
pub fn host_arch() -> String {
    std::env::consts::ARCH.to_string()
}

/// The target ABI tag: `DEPOT_ABI` if set, otherwise [`DEFAULT_ABI_TAG`].
#[must_use]
pub fn target_abi() -> String {
    std::env::var(ABI_ENV).unwrap_or_else(|_| DEFAULT_ABI_TAG.to_string())
}
