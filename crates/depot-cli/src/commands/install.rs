//! The `depot install` command.

use crate::Context;
use clap::Args;
use depot_core::{install, paths, RegistryResolver, RunConfig, RunReport};
use miette::Result;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Include the development dependency group
    #[arg(long)]
    dev: bool,

    /// Keep an existing destination directory instead of moving it aside
    #[arg(long)]
    preserve_dest: bool,

    /// Maximum concurrent units of work per stage
    #[arg(long, value_name = "N", default_value_t = depot_core::DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Cache root directory override
    #[arg(long, value_name = "PATH")]
    cache_dir: Option<PathBuf>,

    /// Destination directory override
    #[arg(long, value_name = "PATH")]
    dest: Option<PathBuf>,

    /// Target architecture tag
    #[arg(long, value_name = "TAG")]
    arch: Option<String>,

    /// Target binary ABI tag
    #[arg(long, value_name = "TAG")]
    abi: Option<String>,
}

pub async fn run(ctx: &Context, args: InstallArgs) -> Result<()> {
    let mut config = RunConfig::new(ctx.cwd.clone())
        .with_dev(args.dev)
        .with_preserve_dest(args.preserve_dest)
        .with_concurrency(args.concurrency);

    if let Some(cache_dir) = args.cache_dir {
        config = config.with_cache_root(cache_dir);
    }
    if let Some(dest) = args.dest {
        config = config.with_dest_dir(dest);
    }
    if args.arch.is_some() || args.abi.is_some() {
        let arch = args.arch.unwrap_or_else(paths::host_arch);
        let abi = args.abi.unwrap_or_else(paths::target_abi);
        config = config.with_target(arch, abi);
    }

    let resolver = match RegistryResolver::from_env() {
        Ok(resolver) => resolver,
        Err(e) => return fail(ctx, &e.to_string()),
    };

    match install::run(&config, &resolver).await {
        Ok(report) => {
            if ctx.json {
                let output = json!({ "ok": true, "install": report });
                println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
            } else {
                print_report(&report);
            }
            Ok(())
        }
        Err(e) => fail(ctx, &e.to_string()),
    }
}

fn print_report(report: &RunReport) {
    info!(
        os = %report.platform.os,
        arch = %report.platform.arch,
        abi = %report.platform.abi,
        "target platform"
    );
    if report.modules.is_empty() {
        println!("nothing to install");
        return;
    }
    for (name, module) in &report.modules {
        println!("{name}@{} -> {}", module.version, module.path.display());
    }
    println!("{} module(s) installed", report.modules.len());
}

/// Report a failure in the requested output mode and exit non-zero via the
/// returned error. With `--json`, stdout still carries exactly one valid
/// JSON object.
fn fail(ctx: &Context, message: &str) -> Result<()> {
    if ctx.json {
        let output = json!({ "ok": false, "error": { "message": message } });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
    }
    Err(miette::miette!("{message}"))
}
