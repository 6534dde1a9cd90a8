use std::fs;
use std::io;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively mirror the contents of `src` into `dst`.
///
/// Merges into existing `dst` content: directories are created as needed and
/// files are overwritten. Symlinks and other special entries are skipped.
///
/// A missing `src` is tolerated when `dst` already exists (the content is
/// considered mirrored); when both are missing this is an error.
///
/// # Errors
/// Returns an error if `src` and `dst` are both absent, or if any directory
/// creation or file copy fails.
pub fn mirror_dir(src: &Path, dst: &Path) -> io::Result<()> {
    if !src.exists() {
        if dst.exists() {
            return Ok(());
        }
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("mirror source not found: {}", src.display()),
        ));
    }

    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        if rel.as_os_str().is_empty() {
            continue;
        }

        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
        // Symlinks skipped
    }

    Ok(())
}

/// Recursively remove a directory if it exists.
///
/// Returns `true` if the directory was removed, `false` if it was already
/// absent.
///
/// # Errors
/// Returns an error if the removal fails.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(path)?;
    Ok(true)
}

/// Generate a unique suffix for scratch directory names.
///
/// Combines the process id with a hashed timestamp so concurrent tasks in one
/// process and concurrent processes get distinct names.
#[must_use]
pub fn unique_suffix() -> String {
    format!("{}-{:08x}", std::process::id(), rand_u32())
}

#[allow(clippy::cast_possible_truncation)]
fn rand_u32() -> u32 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u64(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0),
    );
    hasher.finish() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_mirror_copies_tree() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let dst_path = dst.path().join("out");

        fs::create_dir_all(src.path().join("sub")).unwrap();
        fs::write(src.path().join("a.txt"), "a").unwrap();
        fs::write(src.path().join("sub").join("b.txt"), "b").unwrap();

        mirror_dir(src.path(), &dst_path).unwrap();

        assert_eq!(fs::read_to_string(dst_path.join("a.txt")).unwrap(), "a");
        assert_eq!(
            fs::read_to_string(dst_path.join("sub").join("b.txt")).unwrap(),
            "b"
        );
        // Source is left in place
        assert!(src.path().join("a.txt").exists());
    }

    #[test]
    fn test_mirror_merges_and_overwrites() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();

        fs::write(src.path().join("a.txt"), "new").unwrap();
        fs::write(dst.path().join("a.txt"), "old").unwrap();
        fs::write(dst.path().join("keep.txt"), "kept").unwrap();

        mirror_dir(src.path(), dst.path()).unwrap();

        assert_eq!(fs::read_to_string(dst.path().join("a.txt")).unwrap(), "new");
        assert_eq!(
            fs::read_to_string(dst.path().join("keep.txt")).unwrap(),
            "kept"
        );
    }

    #[test]
    fn test_mirror_missing_source_with_existing_dest() {
        let dst = tempdir().unwrap();
        let missing = dst.path().join("no-such-src");

        mirror_dir(&missing, dst.path()).unwrap();
    }

    #[test]
    fn test_mirror_missing_source_and_dest_fails() {
        let dir = tempdir().unwrap();
        let missing_src = dir.path().join("no-such-src");
        let missing_dst = dir.path().join("no-such-dst");

        let err = mirror_dir(&missing_src, &missing_dst).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_dir_if_exists() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("scratch");
        fs::create_dir_all(target.join("nested")).unwrap();
        fs::write(target.join("nested").join("f"), "x").unwrap();

        assert!(remove_dir_if_exists(&target).unwrap());
        assert!(!target.exists());

        // Already absent counts as clean
        assert!(!remove_dir_if_exists(&target).unwrap());
    }

    #[test]
    fn test_unique_suffix_contains_pid() {
        let suffix = unique_suffix();
        assert!(suffix.starts_with(&std::process::id().to_string()));
    }
}
