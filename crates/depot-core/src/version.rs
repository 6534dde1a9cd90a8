//! Version selection using semver.

use crate::resolver::VersionListing;
use semver::{Version, VersionReq};
use tracing::warn;

/// Check whether a declared range is itself an exact version.
#[must_use]
pub fn is_exact(range: &str) -> bool {
    Version::parse(range.trim()).is_ok()
}

/// Select a concrete version for `range` from a listing.
///
/// # Rules
/// - An empty, `*`, `x` or `latest` range resolves to the latest version.
/// - An exact version that is published resolves to itself.
/// - Otherwise the highest published version that satisfies the range and is
///   `<=` the latest version wins.
/// - A range nothing satisfies falls back to the latest version. This is
///   policy, not an error; it is logged at WARN and the declared constraint
///   is ignored.
#[must_use]
pub fn select_version(name: &str, range: &str, listing: &VersionListing) -> String {
    let range = range.trim();

    if range.is_empty() || range == "*" || range == "x" || range == "X" || range == "latest" {
        return listing.latest.clone();
    }

    if is_exact(range) && listing.versions.iter().any(|v| v == range) {
        return range.to_string();
    }

    let Some(req) = parse_range(range) else {
        warn!(name, range, "unparseable version range; using latest");
        return listing.latest.clone();
    };

    let latest = Version::parse(&listing.latest).ok();

    let mut best: Option<Version> = None;
    for raw in &listing.versions {
        let Ok(version) = Version::parse(raw) else {
            continue;
        };
        if !req.matches(&version) {
            continue;
        }
        if let Some(latest) = &latest {
            if version > *latest {
                continue;
            }
        }
        if best.as_ref().map_or(true, |b| version > *b) {
            best = Some(version);
        }
    }

    best.map_or_else(
        || {
            warn!(
                name,
                range,
                latest = %listing.latest,
                "no published version satisfies range; using latest"
            );
            listing.latest.clone()
        },
        |v| v.to_string(),
    )
}

/// Parse a declared range, normalizing npm-style syntax the semver crate
/// does not accept directly.
fn parse_range(range: &str) -> Option<VersionReq> {
    let range = range.trim();

    // An exact version means equality, not the semver crate's default caret.
    if is_exact(range) {
        return VersionReq::parse(&format!("={range}")).ok();
    }

    // Hyphen ranges: "1.0.0 - 2.0.0" means ">=1.0.0, <=2.0.0".
    if let Some((start, end)) = range.split_once(" - ") {
        return VersionReq::parse(&format!(">={}, <={}", start.trim(), end.trim())).ok();
    }

    // X-ranges: "1.x" means ">=1.0.0, <2.0.0".
    if let Some(converted) = convert_x_range(range) {
        return VersionReq::parse(&converted).ok();
    }

    // Space-separated comparators mean AND: ">= 2.1.2 < 3.0.0".
    VersionReq::parse(&join_comparators(range)).ok()
}

/// Convert an x-range like `1.x` or `1.2.x` to comparator form.
fn convert_x_range(range: &str) -> Option<String> {
    let is_x = |s: &str| matches!(s, "x" | "X" | "*");
    let parts: Vec<&str> = range.split('.').collect();

    match parts.as_slice() {
        [major, minor] if is_x(minor) => {
            let m: u64 = major.parse().ok()?;
            Some(format!(">={m}.0.0, <{}.0.0", m + 1))
        }
        [major, minor, patch] if is_x(patch) => {
            let m: u64 = major.parse().ok()?;
            let n: u64 = minor.parse().ok()?;
            Some(format!(">={m}.{n}.0, <{m}.{}.0", n + 1))
        }
        _ => None,
    }
}

/// Rejoin whitespace-separated comparators with commas, reattaching bare
/// operators to the version that follows them.
fn join_comparators(range: &str) -> String {
    if !range.contains(' ') || range.contains(',') {
        return range.to_string();
    }

    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<String> = None;

    for token in range.split_whitespace() {
        let has_version = token.chars().any(|c| c.is_ascii_digit());
        if has_version {
            match pending_op.take() {
                Some(op) => comparators.push(format!("{op}{token}")),
                None => comparators.push(token.to_string()),
            }
        } else {
            pending_op = Some(token.to_string());
        }
    }

    if let Some(op) = pending_op {
        comparators.push(op);
    }

    comparators.join(", ")
}
