//! The install pipeline: fetch, publish and cleanup stages.
//!
//! Three sequential stages, each an internally-parallel fan-out bounded by
//! the configured concurrency limit. The fetch stage takes every declared
//! dependency through resolve, cache checks and fetch-or-skip; the publish
//! stage materializes the resolved cache entries into the destination; the
//! cleanup stage removes the scratch directories fetches used.
//!
//! The cache tree is shared across concurrent tasks without locking. The
//! repeated existence checks are best-effort de-duplication: two tasks
//! racing on one key can both fetch, which wastes work but never corrupts
//! the entry because publication is overwrite-tolerant.

use crate::cache::{CacheKey, PackageCache};
use crate::config::RunConfig;
use crate::error::Error;
use crate::manifest::{self, Dependency};
use crate::publish::publish;
use crate::resolver::PackageResolver;
use crate::version;
use depot_util::fs::{mirror_dir, remove_dir_if_exists};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Target platform summary included in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformInfo {
    pub os: String,
    pub arch: String,
    pub abi: String,
}

/// One installed module in the run report.
#[derive(Debug, Clone, Serialize)]
pub struct InstalledModule {
    /// Concrete version the dependency resolved to.
    pub version: String,
    /// Where the module was materialized.
    pub path: PathBuf,
    /// Upstream metadata for the resolved version, `null` for fast-path
    /// cache hits that never contacted the resolver.
    pub metadata: Value,
}

/// Result of a successful run. Discarded, never returned, on failure.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub platform: PlatformInfo,
    pub modules: BTreeMap<String, InstalledModule>,
}

/// Per-dependency outcome of the fetch stage.
#[derive(Debug)]
struct FetchOutcome {
    name: String,
    version: String,
    entry: PathBuf,
    metadata: Value,
    /// Scratch directory allocated for this dependency, if any. Consumed by
    /// the cleanup stage; a successful move leaves it already gone.
    scratch: Option<PathBuf>,
    /// Whether an external fetch happened (as opposed to a cache hit).
    fetched: bool,
}

/// Run the full pipeline for the configured project.
///
/// # Errors
/// Fails fast on the first configuration, manifest, resolution, fetch,
/// publish or cleanup error; no partial report is returned.
pub async fn run(config: &RunConfig, resolver: &dyn PackageResolver) -> Result<RunReport, Error> {
    config.validate()?;

    let manifest = manifest::load(&config.workdir, config.include_dev)?;
    let cache = PackageCache::new(config.cache_root.clone());
    cache.ensure_dirs()?;

    let dest = config.dest_dir();
    prepare_destination(&dest, config.preserve_dest)?;
    fs::create_dir_all(&dest)?;

    info!(
        dependencies = manifest.dependencies.len(),
        concurrency = config.concurrency,
        cache = %cache.root().display(),
        "installing dependencies"
    );

    let outcomes = fetch_all(&manifest.dependencies, &cache, resolver, config).await?;

    let entries: Vec<(String, PathBuf)> = outcomes
        .iter()
        .map(|o| (o.name.clone(), o.entry.clone()))
        .collect();
    publish_all(&entries, &dest, config.concurrency).await?;

    let scratches: Vec<PathBuf> = outcomes.iter().filter_map(|o| o.scratch.clone()).collect();
    cleanup_all(&scratches, config.concurrency).await?;

    let fetched = outcomes.iter().filter(|o| o.fetched).count();
    info!(
        total = outcomes.len(),
        fetched,
        cached = outcomes.len() - fetched,
        "install complete"
    );

    let mut modules = BTreeMap::new();
    for outcome in outcomes {
        let path = dest.join(&outcome.name);
        modules.insert(
            outcome.name,
            InstalledModule {
                version: outcome.version,
                path,
                metadata: outcome.metadata,
            },
        );
    }

    Ok(RunReport {
        platform: PlatformInfo {
            os: std::env::consts::OS.to_string(),
            arch: config.arch.clone(),
            abi: config.abi.clone(),
        },
        modules,
    })
}

/// Move an existing destination aside with a timestamp suffix, unless
/// preservation was requested. Never deletes.
fn prepare_destination(dest: &Path, preserve: bool) -> Result<(), Error> {
    if !dest.exists() {
        return Ok(());
    }
    if preserve {
        debug!(dest = %dest.display(), "preserving existing destination");
        return Ok(());
    }

    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    let file_name = dest
        .file_name()
        .map_or_else(|| "modules".to_string(), |n| n.to_string_lossy().into_owned());
    let backup = dest.with_file_name(format!("{file_name}.bak-{stamp}"));
    fs::rename(dest, &backup)?;
    info!(
        from = %dest.display(),
        to = %backup.display(),
        "moved existing destination aside"
    );
    Ok(())
}

/// Fetch stage: bounded fan-out over the declared dependencies.
async fn fetch_all(
    deps: &[Dependency],
    cache: &PackageCache,
    resolver: &dyn PackageResolver,
    config: &RunConfig,
) -> Result<Vec<FetchOutcome>, Error> {
    let aborted = Arc::new(AtomicBool::new(false));

    let results: Vec<Result<Option<FetchOutcome>, Error>> = stream::iter(deps)
        .map(|dep| {
            let aborted = Arc::clone(&aborted);
            async move {
                if aborted.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                match fetch_one(dep, cache, resolver, config).await {
                    Ok(outcome) => Ok(Some(outcome)),
                    Err(e) => {
                        aborted.store(true, Ordering::Relaxed);
                        Err(e)
                    }
                }
            }
        })
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    collect_stage(results)
}

/// Take one dependency through resolve, cache checks and fetch-or-skip.
/// Steps are strictly sequential within a dependency.
async fn fetch_one(
    dep: &Dependency,
    cache: &PackageCache,
    resolver: &dyn PackageResolver,
    config: &RunConfig,
) -> Result<FetchOutcome, Error> {
    // Fast path: an exact declared version can hit the cache without ever
    // contacting the resolver.
    if version::is_exact(&dep.range) {
        let key = CacheKey::new(&dep.name, dep.range.trim(), &config.arch, &config.abi);
        if cache.contains(&key) {
            debug!(name = %dep.name, version = %key.version, "cache hit (exact version)");
            return Ok(FetchOutcome {
                name: dep.name.clone(),
                version: key.version.clone(),
                entry: cache.entry_path(&key),
                metadata: Value::Null,
                scratch: None,
                fetched: false,
            });
        }
    }

    let listing = resolver.list_versions(&dep.name).await?;
    let resolved = version::select_version(&dep.name, &dep.range, &listing);
    let key = CacheKey::new(&dep.name, &resolved, &config.arch, &config.abi);
    let entry = cache.entry_path(&key);
    let metadata = listing.version_metadata(&resolved);

    // The resolved version may be cached even though the literal range
    // missed.
    if cache.contains(&key) {
        debug!(%key, "cache hit (resolved version)");
        return Ok(FetchOutcome {
            name: dep.name.clone(),
            version: resolved,
            entry,
            metadata,
            scratch: None,
            fetched: false,
        });
    }

    let scratch = cache.scratch_dir(&key)?;
    debug!(%key, scratch = %scratch.display(), "cache miss; fetching");
    resolver.fetch_and_build(&dep.name, &resolved, &scratch).await?;

    // A concurrent task may have populated the key while the fetch was in
    // flight; its entry wins and this task's output goes to cleanup.
    if cache.contains(&key) {
        debug!(%key, "entry appeared during fetch; discarding scratch output");
        return Ok(FetchOutcome {
            name: dep.name.clone(),
            version: resolved,
            entry,
            metadata,
            scratch: Some(scratch),
            fetched: true,
        });
    }

    fs::create_dir_all(&entry)?;
    let mode = publish(&scratch, &entry)?;
    debug!(%key, ?mode, "published cache entry");

    Ok(FetchOutcome {
        name: dep.name.clone(),
        version: resolved,
        entry,
        metadata,
        scratch: Some(scratch),
        fetched: true,
    })
}

/// Publish stage: mirror every resolved cache entry into the destination.
/// Always a copy, never a move: the cache entry must survive for future
/// runs.
async fn publish_all(
    entries: &[(String, PathBuf)],
    dest: &Path,
    limit: usize,
) -> Result<(), Error> {
    let aborted = Arc::new(AtomicBool::new(false));

    let results: Vec<Result<Option<()>, Error>> = stream::iter(entries)
        .map(|(name, entry)| {
            let aborted = Arc::clone(&aborted);
            let target = dest.join(name);
            async move {
                if aborted.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                match mirror_dir(entry, &target) {
                    Ok(()) => {
                        debug!(name = %name, target = %target.display(), "materialized module");
                        Ok(Some(()))
                    }
                    Err(e) => {
                        aborted.store(true, Ordering::Relaxed);
                        Err(Error::copy(entry, &target, e.to_string()))
                    }
                }
            }
        })
        .buffer_unordered(limit)
        .collect()
        .await;

    collect_stage(results).map(|_| ())
}

/// Cleanup stage: remove scratch directories. A directory already gone
/// (e.g. consumed by a successful move) counts as clean.
async fn cleanup_all(scratch_dirs: &[PathBuf], limit: usize) -> Result<(), Error> {
    let aborted = Arc::new(AtomicBool::new(false));

    let results: Vec<Result<Option<()>, Error>> = stream::iter(scratch_dirs)
        .map(|dir| {
            let aborted = Arc::clone(&aborted);
            async move {
                if aborted.load(Ordering::Relaxed) {
                    return Ok(None);
                }
                match remove_dir_if_exists(dir) {
                    Ok(removed) => {
                        if removed {
                            debug!(dir = %dir.display(), "removed scratch directory");
                        }
                        Ok(Some(()))
                    }
                    Err(e) => {
                        aborted.store(true, Ordering::Relaxed);
                        Err(Error::Cleanup {
                            path: dir.clone(),
                            source: e,
                        })
                    }
                }
            }
        })
        .buffer_unordered(limit)
        .collect()
        .await;

    collect_stage(results).map(|_| ())
}

/// Reduce a stage's unordered results: outcomes on success, otherwise the
/// first error observed. Units skipped after an abort contribute nothing.
fn collect_stage<T>(results: Vec<Result<Option<T>, Error>>) -> Result<Vec<T>, Error> {
    let mut outcomes = Vec::new();
    for result in results {
        match result {
            Ok(Some(v)) => outcomes.push(v),
            Ok(None) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(outcomes)
}
