//! Two-phase materialization: atomic move first, recursive copy fallback.

use crate::error::Error;
use depot_util::fs::mirror_dir;
use std::fs;
use std::path::Path;
use tracing::debug;

/// How a publish completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// The source was renamed into place.
    Moved,
    /// The move failed; the source contents were mirror-copied and the
    /// source left in place for later cleanup.
    Copied,
    /// The source was gone but the destination was already populated.
    Kept,
}

/// Publish `src` into `dst`.
///
/// The fast path is an atomic rename, which succeeds whenever both paths are
/// on the same filesystem. Any rename failure (including cross-device) falls
/// back to a recursive mirror copy that merges into existing `dst` content,
/// which keeps a racing publish of the same entry benign.
///
/// A missing `src` is a no-op success when `dst` is already populated.
///
/// # Errors
/// Returns a copy error when `src` and `dst` are both absent, or a publish
/// error when the move and the fallback copy both fail.
pub fn publish(src: &Path, dst: &Path) -> Result<PublishMode, Error> {
    if !src.exists() {
        if dst.exists() {
            debug!(dst = %dst.display(), "destination already populated; nothing to publish");
            return Ok(PublishMode::Kept);
        }
        return Err(Error::copy(src, dst, "source not found"));
    }

    match fs::rename(src, dst) {
        Ok(()) => Ok(PublishMode::Moved),
        Err(rename_err) => {
            debug!(
                src = %src.display(),
                dst = %dst.display(),
                error = %rename_err,
                "rename failed; falling back to mirror copy"
            );
            mirror_dir(src, dst).map_err(|copy_err| {
                Error::publish(
                    src,
                    dst,
                    format!("rename: {rename_err}; copy: {copy_err}"),
                )
            })?;
            Ok(PublishMode::Copied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_move_on_same_volume() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("file.txt"), "content").unwrap();

        let mode = publish(&src, &dst).unwrap();

        assert_eq!(mode, PublishMode::Moved);
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("file.txt")).unwrap(), "content");
    }

    #[test]
    fn test_copy_fallback_when_move_fails() {
        // Renaming onto a non-empty directory fails, standing in for a
        // cross-device move.
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("new.txt"), "new").unwrap();
        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("existing.txt"), "existing").unwrap();

        let mode = publish(&src, &dst).unwrap();

        assert_eq!(mode, PublishMode::Copied);
        // Source survives the fallback
        assert!(src.join("new.txt").exists());
        // Destination merged both
        assert_eq!(fs::read_to_string(dst.join("new.txt")).unwrap(), "new");
        assert_eq!(
            fs::read_to_string(dst.join("existing.txt")).unwrap(),
            "existing"
        );
    }

    #[test]
    fn test_missing_source_with_populated_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("gone");
        let dst = dir.path().join("dst");
        fs::create_dir_all(&dst).unwrap();

        let mode = publish(&src, &dst).unwrap();
        assert_eq!(mode, PublishMode::Kept);
    }

    #[test]
    fn test_missing_source_and_destination_fails() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("gone");
        let dst = dir.path().join("also-gone");

        let err = publish(&src, &dst).unwrap_err();
        assert!(matches!(err, Error::Copy { .. }));
    }

    #[test]
    fn test_publish_twice_is_idempotent() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("file.txt"), "content").unwrap();

        publish(&src, &dst).unwrap();
        // Second publish: source gone, destination populated
        let mode = publish(&src, &dst).unwrap();

        assert_eq!(mode, PublishMode::Kept);
        assert!(dst.join("file.txt").exists());
    }
}
