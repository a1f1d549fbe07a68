//! Staging file management module
//!
//! Downloads and generated documents are first written to hidden staging
//! paths next to their destination and only renamed into place once they
//! are complete. The guards here remove whatever is left behind on drop.

use std::fs::{self, File};
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Guard for staging resources that automatically cleans up on drop
#[derive(Debug)]
pub(crate) enum TempGuard {
    /// Staging file that will be deleted when dropped
    File(PathBuf),
    /// Staging directory that will be deleted recursively when dropped
    Directory(PathBuf),
}

impl TempGuard {
    /// Get the path to the staging resource
    pub(crate) fn path(&self) -> &Path {
        match self {
            TempGuard::File(path) | TempGuard::Directory(path) => path,
        }
    }

    /// Renames the staged resource to its final destination
    ///
    /// Staging paths are always created in the destination's directory, so
    /// the rename never crosses a filesystem boundary.
    pub(crate) fn persist(self, destination: &Path) -> io::Result<()> {
        fs::rename(self.path(), destination)
        // The guard drops here; its path no longer exists, so cleanup is a no-op
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        // Silently ignore errors during cleanup
        match self {
            TempGuard::File(path) => {
                let _ = fs::remove_file(path);
            }
            TempGuard::Directory(path) => {
                let _ = fs::remove_dir_all(path);
            }
        }
    }
}

impl Deref for TempGuard {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        self.path()
    }
}

/// Builds a hidden, unique staging name using ULID
///
/// Library scanners skip dot-prefixed entries, so a half-written file is
/// never picked up as an episode.
fn staging_name(prefix: &str, extension: Option<&str>) -> String {
    let ulid = ulid::Ulid::new();
    match extension {
        Some(ext) => format!(".{}-{}.{}", prefix, ulid, ext),
        None => format!(".{}-{}", prefix, ulid),
    }
}

/// Creates a hidden staging file inside `parent`
pub(crate) fn create_temp_file_in(
    parent: &Path,
    prefix: &str,
    extension: &str,
) -> io::Result<TempGuard> {
    let path = parent.join(staging_name(prefix, Some(extension)));
    File::create(&path)?;
    Ok(TempGuard::File(path))
}

/// Creates a hidden staging directory inside `parent`
pub(crate) fn create_temp_dir_in(parent: &Path, prefix: &str) -> io::Result<TempGuard> {
    let path = parent.join(staging_name(prefix, None));
    fs::create_dir(&path)?;
    Ok(TempGuard::Directory(path))
}

/// Removes staging entries with the given prefix left behind by an earlier,
/// interrupted run
///
/// Returns the number of entries removed.
pub(crate) fn remove_stale(parent: &Path, prefix: &str) -> io::Result<usize> {
    let marker = format!(".{}-", prefix);
    let mut removed = 0;

    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(&marker) {
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let temp = create_temp_file_in(dir.path(), "test", "txt").unwrap();
        let path = temp.path().to_path_buf();

        assert!(path.exists());
        assert!(path.is_file());

        // Hidden, with prefix and extension
        let filename = path.file_name().unwrap().to_str().unwrap();
        assert!(filename.starts_with(".test-"));
        assert!(filename.ends_with(".txt"));

        drop(temp);
        assert!(!path.exists());
    }

    #[test]
    fn test_directory_cleanup_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let staging = create_temp_dir_in(dir.path(), "staging").unwrap();
            fs::write(staging.join("partial.webm"), b"half a download").unwrap();
            staging.path().to_path_buf()
        };

        assert!(!path.exists());
    }

    #[test]
    fn test_multiple_temp_files_unique() {
        let dir = tempfile::tempdir().unwrap();
        let temp1 = create_temp_file_in(dir.path(), "test", "txt").unwrap();
        let temp2 = create_temp_file_in(dir.path(), "test", "txt").unwrap();

        assert_ne!(temp1.path(), temp2.path());
        assert!(temp1.path().exists());
        assert!(temp2.path().exists());
    }

    #[test]
    fn test_persist_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let temp = create_temp_file_in(dir.path(), "doc", "yml").unwrap();
        fs::write(temp.path(), "content").unwrap();

        let destination = dir.path().join("final.yml");
        temp.persist(&destination).unwrap();

        assert_eq!(fs::read_to_string(&destination).unwrap(), "content");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_remove_stale_only_touches_prefixed_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(".staging-01ABC")).unwrap();
        fs::write(dir.path().join(".staging-01ABC").join("x"), b"x").unwrap();
        fs::write(dir.path().join(".staging-01DEF.part"), b"x").unwrap();
        fs::write(dir.path().join("Show S00E00 Trailer.mp4"), b"x").unwrap();

        let removed = remove_stale(dir.path(), "staging").unwrap();

        assert_eq!(removed, 2);
        assert!(dir.path().join("Show S00E00 Trailer.mp4").exists());
    }
}
