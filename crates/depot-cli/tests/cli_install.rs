//! Integration tests for the `depot` binary.
//!
//! These run offline: the install scenarios either fail before any network
//! use or are satisfied entirely from a pre-seeded cache.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn depot_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "depot-cli", "--bin", "depot", "--"]);
    cmd
}

fn write_manifest(dir: &Path, content: &str) {
    fs::write(dir.join("depot.json"), content).unwrap();
}

#[test]
fn test_install_help_shows_options() {
    let output = depot_bin()
        .args(["install", "--help"])
        .output()
        .expect("failed to run depot install --help");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--dev"), "help should show --dev");
    assert!(
        stdout.contains("--preserve-dest"),
        "help should show --preserve-dest"
    );
    assert!(
        stdout.contains("--concurrency"),
        "help should show --concurrency"
    );
    assert!(stdout.contains("--cache-dir"), "help should show --cache-dir");
    assert!(stdout.contains("--abi"), "help should show --abi");
}

#[test]
fn test_install_without_manifest_fails_with_json() {
    let dir = tempdir().unwrap();

    let output = depot_bin()
        .args(["--json", "install", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("failed to run depot install");

    assert!(!output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|_| panic!("stdout should be valid JSON: {stdout}"));

    assert_eq!(json["ok"].as_bool(), Some(false));
    let message = json["error"]["message"].as_str().unwrap_or_default();
    assert!(
        message.contains("manifest"),
        "error should mention the manifest: {message}"
    );
}

#[test]
fn test_install_from_seeded_cache_offline() {
    let dir = tempdir().unwrap();
    let project = dir.path().join("project");
    let cache = dir.path().join("cache");
    fs::create_dir_all(&project).unwrap();

    write_manifest(&project, r#"{"name": "app", "dependencies": {"left-pad": "1.0.0"}}"#);

    // Seed the cache entry the exact-version fast path will hit.
    let entry = cache
        .join("left-pad")
        .join("1.0.0")
        .join("x64")
        .join("abi1");
    fs::create_dir_all(&entry).unwrap();
    fs::write(entry.join("index.js"), "module.exports = 42;").unwrap();

    let output = depot_bin()
        .args(["--json", "install", "--arch", "x64", "--abi", "abi1", "--cache-dir"])
        .arg(&cache)
        .arg("--cwd")
        .arg(&project)
        .output()
        .expect("failed to run depot install");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        output.status.success(),
        "install should succeed offline from cache. stdout: {stdout} stderr: {stderr}"
    );

    let json: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|_| panic!("stdout should be valid JSON: {stdout}"));
    assert_eq!(json["ok"].as_bool(), Some(true));
    assert_eq!(
        json["install"]["modules"]["left-pad"]["version"].as_str(),
        Some("1.0.0")
    );

    // The module was materialized into the destination.
    assert!(project
        .join("modules")
        .join("left-pad")
        .join("index.js")
        .exists());
}

#[test]
fn test_cache_ls_empty_json() {
    let dir = tempdir().unwrap();

    let output = depot_bin()
        .args(["--json", "cache", "ls", "--cache-dir"])
        .arg(dir.path())
        .output()
        .expect("failed to run depot cache ls");

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|_| panic!("stdout should be valid JSON: {stdout}"));

    assert_eq!(json["ok"].as_bool(), Some(true));
    assert_eq!(json["entries"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_cache_ls_lists_seeded_entries() {
    let dir = tempdir().unwrap();
    let entry = dir
        .path()
        .join("chalk")
        .join("2.4.2")
        .join("x64")
        .join("abi1");
    fs::create_dir_all(&entry).unwrap();

    let output = depot_bin()
        .args(["--json", "cache", "ls", "--cache-dir"])
        .arg(dir.path())
        .output()
        .expect("failed to run depot cache ls");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|_| panic!("stdout should be valid JSON: {stdout}"));

    assert_eq!(json["ok"].as_bool(), Some(true));
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["name"].as_str(), Some("chalk"));
    assert_eq!(entries[0]["version"].as_str(), Some("2.4.2"));
}
