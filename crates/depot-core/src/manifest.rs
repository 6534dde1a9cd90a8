//! Manifest loading.
//!
//! Reads the declared dependency set from the project descriptor file
//! (`depot.json`) in the working directory.

use crate::error::Error;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Name of the project descriptor file.
pub const MANIFEST_NAME: &str = "depot.json";

/// A declared dependency: a package name plus a version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub range: String,
}

/// The loaded manifest.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    /// Project name, if declared.
    pub name: Option<String>,
    /// Declared dependencies, sorted by name. Runtime entries win over
    /// development entries on name collision.
    pub dependencies: Vec<Dependency>,
}

/// Load the manifest from a project directory.
///
/// The runtime `dependencies` group is always read; `devDependencies` only
/// when `include_dev` is set. Entries whose range is not a string are skipped
/// with a warning.
///
/// # Errors
/// Returns `ManifestMissing` if no descriptor file exists, or
/// `ManifestInvalid` if it cannot be read or parsed.
pub fn load(project_dir: &Path, include_dev: bool) -> Result<Manifest, Error> {
    let path = project_dir.join(MANIFEST_NAME);
    if !path.exists() {
        return Err(Error::ManifestMissing { path });
    }

    let content = fs::read_to_string(&path).map_err(|e| Error::ManifestInvalid {
        path: path.clone(),
        message: format!("failed to read: {e}"),
    })?;

    let json: Value = serde_json::from_str(&content).map_err(|e| Error::ManifestInvalid {
        path: path.clone(),
        message: format!("invalid JSON: {e}"),
    })?;

    let root = json.as_object().ok_or_else(|| Error::ManifestInvalid {
        path: path.clone(),
        message: "manifest must be a JSON object".to_string(),
    })?;

    let name = root
        .get("name")
        .and_then(Value::as_str)
        .map(String::from);

    // Dev entries first so runtime entries overwrite on collision.
    let mut ranges: HashMap<String, String> = HashMap::new();
    if include_dev {
        collect_group(root, "devDependencies", &mut ranges);
    }
    collect_group(root, "dependencies", &mut ranges);

    let mut dependencies: Vec<Dependency> = ranges
        .into_iter()
        .map(|(name, range)| Dependency { name, range })
        .collect();
    dependencies.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Manifest { name, dependencies })
}

/// Collect one dependency group into the accumulated range map.
fn collect_group(
    root: &serde_json::Map<String, Value>,
    group: &str,
    ranges: &mut HashMap<String, String>,
) {
    let Some(section) = root.get(group) else {
        return;
    };

    let Some(entries) = section.as_object() else {
        warn!(group, "dependency group is not an object; skipping");
        return;
    };

    for (name, range) in entries {
        if let Some(range) = range.as_str() {
            ranges.insert(name.clone(), range.to_string());
        } else {
            warn!(group, name = %name, "dependency range is not a string; skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, content: &str) {
        fs::write(dir.join(MANIFEST_NAME), content).unwrap();
    }

    #[test]
    fn test_load_runtime_deps() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{"name": "app", "dependencies": {"left-pad": "1.0.0", "chalk": "^2.0.0"}}"#,
        );

        let manifest = load(dir.path(), false).unwrap();
        assert_eq!(manifest.name.as_deref(), Some("app"));
        assert_eq!(
            manifest.dependencies,
            vec![
                Dependency {
                    name: "chalk".to_string(),
                    range: "^2.0.0".to_string()
                },
                Dependency {
                    name: "left-pad".to_string(),
                    range: "1.0.0".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_dev_group_only_when_requested() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{"dependencies": {"a": "1.0.0"}, "devDependencies": {"b": "2.0.0"}}"#,
        );

        let without = load(dir.path(), false).unwrap();
        assert_eq!(without.dependencies.len(), 1);

        let with = load(dir.path(), true).unwrap();
        assert_eq!(with.dependencies.len(), 2);
    }

    #[test]
    fn test_runtime_wins_on_collision() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{"dependencies": {"a": "1.0.0"}, "devDependencies": {"a": "2.0.0"}}"#,
        );

        let manifest = load(dir.path(), true).unwrap();
        assert_eq!(manifest.dependencies.len(), 1);
        assert_eq!(manifest.dependencies[0].range, "1.0.0");
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        let err = load(dir.path(), false).unwrap_err();
        assert!(matches!(err, Error::ManifestMissing { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempdir().unwrap();
        write_manifest(dir.path(), "not json");
        let err = load(dir.path(), false).unwrap_err();
        assert!(matches!(err, Error::ManifestInvalid { .. }));
    }

    #[test]
    fn test_non_string_range_skipped() {
        let dir = tempdir().unwrap();
        write_manifest(
            dir.path(),
            r#"{"dependencies": {"a": "1.0.0", "b": 2}}"#,
        );

        let manifest = load(dir.path(), false).unwrap();
        assert_eq!(manifest.dependencies.len(), 1);
        assert_eq!(manifest.dependencies[0].name, "a");
    }
}
