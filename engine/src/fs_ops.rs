//! Filesystem operations module.
//!
//! This module provides the directory synchronization primitives a transfer is built from:
//! - Clearing a directory's top-level contents
//! - Full recursive copy (overwriting existing files)
//! - One-level overwrite-merge for trees that accumulate across sessions
//! - One-time mirror of a job folder into the default root
//!
//! All operations are blocking and stop at the first error. Nothing is rolled back.

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;
use crate::error::EngineError;

/// Counters accumulated by a copy operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub files_copied: u64,
    pub bytes_copied: u64,
}

impl SyncStats {
    fn add_file(&mut self, bytes: u64) {
        self.files_copied += 1;
        self.bytes_copied += bytes;
    }

    fn merge(&mut self, other: SyncStats) {
        self.files_copied += other.files_copied;
        self.bytes_copied += other.bytes_copied;
    }
}

/// What `mirror_to_default_root` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// The whole job folder was copied
    Copied(SyncStats),
    /// The target already existed and was left alone
    AlreadyExists,
}

/// Remove every direct child of `path`, deleting subdirectories whole.
///
/// Clearing a directory that is empty or does not exist is a no-op.
///
/// # Returns
/// Number of top-level entries removed
pub fn clear_directory(path: &Path) -> Result<usize, EngineError> {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(EngineError::io("clearing directory", path, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io("clearing directory", path, e))?;
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| EngineError::io("clearing directory", &entry_path, e))?;

        // Symlinks are unlinked, never followed
        let result = if file_type.is_dir() {
            fs::remove_dir_all(&entry_path)
        } else {
            fs::remove_file(&entry_path)
        };
        result.map_err(|e| EngineError::io("removing", &entry_path, e))?;

        debug!(path = %entry_path.display(), "removed");
        removed += 1;
    }

    Ok(removed)
}

/// Recursively copy everything under `src` into `dst`, creating `dst` if needed.
///
/// Existing destination files with the same relative path are overwritten.
/// Files present only in `dst` are left in place, so callers wanting an exact
/// mirror clear `dst` first.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<SyncStats, EngineError> {
    fs::create_dir_all(dst).map_err(|e| EngineError::io("creating directory", dst, e))?;

    let mut stats = SyncStats::default();
    let entries = fs::read_dir(src).map_err(|e| EngineError::io("reading directory", src, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io("reading directory", src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if is_dir(&src_path)? {
            stats.merge(copy_tree(&src_path, &dst_path)?);
        } else {
            stats.add_file(copy_file_with_metadata(&src_path, &dst_path)?);
        }
    }

    Ok(stats)
}

/// Copy `src` into `dst`, overwriting same-named files but never deleting anything.
///
/// For each direct child of `src`:
/// - a file is copied over any same-named destination file;
/// - a directory missing from `dst` is copied whole;
/// - a directory already present in `dst` only receives the files directly
///   inside it. Its subdirectories are not descended into.
///
/// A missing `src` is a no-op.
pub fn copy_tree_overwrite_merge(src: &Path, dst: &Path) -> Result<SyncStats, EngineError> {
    let mut stats = SyncStats::default();
    if !src.exists() {
        return Ok(stats);
    }

    fs::create_dir_all(dst).map_err(|e| EngineError::io("creating directory", dst, e))?;

    let entries = fs::read_dir(src).map_err(|e| EngineError::io("reading directory", src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io("reading directory", src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if !is_dir(&src_path)? {
            stats.add_file(copy_file_with_metadata(&src_path, &dst_path)?);
        } else if dst_path.exists() {
            stats.merge(merge_direct_files(&src_path, &dst_path)?);
        } else {
            stats.merge(copy_tree(&src_path, &dst_path)?);
        }
    }

    Ok(stats)
}

/// Copy only the regular files directly inside `src` into the existing `dst`.
fn merge_direct_files(src: &Path, dst: &Path) -> Result<SyncStats, EngineError> {
    let mut stats = SyncStats::default();
    let entries = fs::read_dir(src).map_err(|e| EngineError::io("reading directory", src, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| EngineError::io("reading directory", src, e))?;
        let src_path = entry.path();
        if is_dir(&src_path)? {
            debug!(path = %src_path.display(), "not merging nested directory");
            continue;
        }
        stats.add_file(copy_file_with_metadata(&src_path, &dst.join(entry.file_name()))?);
    }

    Ok(stats)
}

/// Copy a whole job folder to `dst`, unless `dst` already exists.
///
/// An existing target is never merged into or overwritten.
pub fn mirror_to_default_root(src_job_folder: &Path, dst: &Path) -> Result<MirrorOutcome, EngineError> {
    if dst.exists() {
        return Ok(MirrorOutcome::AlreadyExists);
    }
    copy_tree(src_job_folder, dst).map(MirrorOutcome::Copied)
}

fn is_dir(path: &Path) -> Result<bool, EngineError> {
    fs::metadata(path)
        .map(|m| m.is_dir())
        .map_err(|e| EngineError::io("reading metadata of", path, e))
}

/// Copy a file from source to destination, overwriting it and preserving
/// permissions and timestamps where the platform allows.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::io("reading", src, e))?;
    let src_metadata = src_file
        .metadata()
        .map_err(|e| EngineError::io("reading", src, e))?;

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::io("writing", dst, e))?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::io("writing", dst, e)
        } else {
            EngineError::io("copying", src, e)
        }
    })?;
    drop(dst_file);

    // Metadata is best effort; the content is what matters
    let _ = fs::set_permissions(dst, src_metadata.permissions());
    let atime = filetime::FileTime::from_last_access_time(&src_metadata);
    let mtime = filetime::FileTime::from_last_modification_time(&src_metadata);
    let _ = filetime::set_file_times(dst, atime, mtime);

    debug!(src = %src.display(), dst = %dst.display(), bytes = bytes_copied, "copied");
    Ok(bytes_copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(()),
    };

    match fs::metadata(parent) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::io(
            "creating directory",
            parent,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "Parent path exists but is not a directory",
            ),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => fs::create_dir_all(parent)
            .map_err(|e| EngineError::io("creating directory", parent, e)),
        Err(e) => Err(EngineError::io("creating directory", parent, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{snapshot, write_file};

    #[test]
    fn test_clear_directory_removes_files_and_subtrees() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("Label Data");
        write_file(&dir.join("a.txt"), "a");
        write_file(&dir.join("nested/deeper/b.txt"), "b");

        let removed = clear_directory(&dir).expect("Failed to clear");

        assert_eq!(removed, 2);
        assert!(dir.exists(), "The directory itself should survive");
        assert_eq!(fs::read_dir(&dir).expect("Failed to read dir").count(), 0);
    }

    #[test]
    fn test_clear_directory_is_idempotent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dir = temp_dir.path().join("empty");
        fs::create_dir(&dir).expect("Failed to create dir");

        assert_eq!(clear_directory(&dir).expect("Empty dir should clear"), 0);
        assert_eq!(clear_directory(&dir).expect("Second clear should succeed"), 0);

        let missing = temp_dir.path().join("missing");
        assert_eq!(clear_directory(&missing).expect("Missing dir should be a no-op"), 0);
        assert!(!missing.exists());
    }

    #[test]
    fn test_copy_tree_mirrors_nested_structure() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write_file(&src.join("top.txt"), "top");
        write_file(&src.join("a/b/c/deep.txt"), "deep");
        fs::create_dir_all(src.join("empty_dir")).expect("Failed to create empty dir");

        let stats = copy_tree(&src, &dst).expect("Failed to copy tree");

        assert_eq!(stats.files_copied, 2);
        assert_eq!(stats.bytes_copied, 7);
        assert_eq!(snapshot(&src), snapshot(&dst));
    }

    #[test]
    fn test_copy_tree_overwrites_existing_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        write_file(&src.join("a/file.txt"), "new");
        write_file(&dst.join("a/file.txt"), "old contents");

        copy_tree(&src, &dst).expect("Failed to copy tree");

        let contents = fs::read_to_string(dst.join("a/file.txt")).expect("Failed to read dest");
        assert_eq!(contents, "new");
    }

    #[test]
    fn test_merge_overwrites_top_level_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("Pix");
        let dst = temp_dir.path().join("dst_pix");
        write_file(&src.join("photo.jpg"), "fresh");
        write_file(&dst.join("photo.jpg"), "stale");
        write_file(&dst.join("older.jpg"), "keep me");

        copy_tree_overwrite_merge(&src, &dst).expect("Failed to merge");

        assert_eq!(fs::read_to_string(dst.join("photo.jpg")).unwrap(), "fresh");
        assert_eq!(fs::read_to_string(dst.join("older.jpg")).unwrap(), "keep me");
    }

    #[test]
    fn test_merge_into_existing_directory_is_one_level_deep() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("Pix");
        let dst = temp_dir.path().join("dst_pix");
        write_file(&src.join("D/f.jpg"), "source f");
        write_file(&src.join("D/sub/h.jpg"), "source h");
        write_file(&dst.join("D/f.jpg"), "dest f");
        write_file(&dst.join("D/sub/g.jpg"), "dest g");

        let stats = copy_tree_overwrite_merge(&src, &dst).expect("Failed to merge");

        assert_eq!(stats.files_copied, 1);
        assert_eq!(fs::read_to_string(dst.join("D/f.jpg")).unwrap(), "source f");
        assert_eq!(fs::read_to_string(dst.join("D/sub/g.jpg")).unwrap(), "dest g");
        assert!(
            !dst.join("D/sub/h.jpg").exists(),
            "Nested directories of a pre-existing directory are not merged"
        );
    }

    #[test]
    fn test_merge_copies_new_directory_whole() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("Pix");
        let dst = temp_dir.path().join("dst_pix");
        write_file(&src.join("D/f.jpg"), "f");
        write_file(&src.join("D/sub/deeper/g.jpg"), "g");
        fs::create_dir_all(&dst).expect("Failed to create dst");

        copy_tree_overwrite_merge(&src, &dst).expect("Failed to merge");

        assert_eq!(snapshot(&src.join("D")), snapshot(&dst.join("D")));
    }

    #[test]
    fn test_merge_with_missing_source_is_noop() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dst = temp_dir.path().join("dst");

        let stats = copy_tree_overwrite_merge(&temp_dir.path().join("nope"), &dst)
            .expect("Missing source should not fail");

        assert_eq!(stats, SyncStats::default());
        assert!(!dst.exists());
    }

    #[test]
    fn test_mirror_skips_existing_target() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("usb/JobA");
        let dst = temp_dir.path().join("Jobs/JobA");
        write_file(&src.join("Label Data/new.lbl"), "new");
        write_file(&dst.join("Label Data/old.lbl"), "old");
        let before = snapshot(&dst);

        let outcome = mirror_to_default_root(&src, &dst).expect("Failed to mirror");

        assert_eq!(outcome, MirrorOutcome::AlreadyExists);
        assert_eq!(snapshot(&dst), before);
    }

    #[test]
    fn test_mirror_copies_whole_job_folder() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("usb/JobA");
        let dst = temp_dir.path().join("Jobs/JobA");
        write_file(&src.join("Label Data/a.lbl"), "a");
        write_file(&src.join("Pix/x/y.jpg"), "y");
        write_file(&src.join("notes.txt"), "n");

        let outcome = mirror_to_default_root(&src, &dst).expect("Failed to mirror");

        assert!(matches!(outcome, MirrorOutcome::Copied(stats) if stats.files_copied == 3));
        assert_eq!(snapshot(&src), snapshot(&dst));
    }

    #[test]
    fn test_copy_file_with_metadata_preserves_mtime() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("source.txt");
        let dst_file = temp_dir.path().join("nested/dest.txt");
        write_file(&src_file, "test content");
        let mtime = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src_file, mtime).expect("Failed to set mtime");

        let bytes = copy_file_with_metadata(&src_file, &dst_file).expect("Failed to copy");

        assert_eq!(bytes, 12);
        assert_eq!(fs::read_to_string(&dst_file).unwrap(), "test content");
        let dst_meta = fs::metadata(&dst_file).expect("Failed to stat dest");
        assert_eq!(filetime::FileTime::from_last_modification_time(&dst_meta), mtime);
    }

    #[test]
    fn test_copy_tree_reports_missing_source_path() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("nonexistent");

        let err = copy_tree(&src, &temp_dir.path().join("dst")).unwrap_err();

        assert_eq!(err.path(), Some(src.as_path()));
    }
}
