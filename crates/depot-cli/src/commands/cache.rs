//! The `depot cache` subcommands.

use crate::Context;
use depot_core::{paths, PackageCache};
use miette::Result;
use serde_json::json;
use std::path::PathBuf;

pub fn ls(ctx: &Context, cache_dir: Option<PathBuf>) -> Result<()> {
    let root = cache_dir.unwrap_or_else(paths::default_cache_root);
    let cache = PackageCache::new(root);

    let entries = match cache.list_entries() {
        Ok(entries) => entries,
        Err(e) => {
            if ctx.json {
                let output = json!({ "ok": false, "error": { "message": e.to_string() } });
                println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            }
            return Err(miette::miette!("{e}"));
        }
    };

    if ctx.json {
        let listed: Vec<_> = entries
            .iter()
            .map(|key| {
                json!({
                    "name": key.name,
                    "version": key.version,
                    "arch": key.arch,
                    "abi": key.abi,
                })
            })
            .collect();
        let output = json!({ "ok": true, "entries": listed });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        return Ok(());
    }

    if entries.is_empty() {
        println!("cache is empty ({})", cache.root().display());
        return Ok(());
    }
    for key in &entries {
        println!("{key}");
    }
    println!("{} entries", entries.len());

    Ok(())
}
