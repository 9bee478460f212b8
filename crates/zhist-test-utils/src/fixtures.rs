//! Test fixtures for creating reproducible snapshot layouts.
//!
//! A [`TestPool`] is a temporary directory standing in for a mounted ZFS
//! dataset: live files at the root, and one directory per snapshot under
//! `.zfs/snapshot`.

use crate::mocks::FixedMountProbe;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use zhist_history::{MountBoundary, MountResolver, DEFAULT_HISTORY_DIR};

/// A temporary mount boundary with a snapshot history directory.
///
/// The directory is removed when the pool is dropped.
///
/// # Example
///
/// ```rust
/// use zhist_test_utils::fixtures::TestPool;
///
/// let pool = TestPool::new();
/// pool.write_live("notes.txt", "hello");
/// pool.write_in_snapshot("daily-1", "notes.txt", "hi", 1_000);
///
/// assert!(pool.root().join(".zfs/snapshot/daily-1/notes.txt").exists());
/// ```
pub struct TestPool {
    /// Keeps the directory alive.
    _temp_dir: TempDir,
    /// Canonical path of the pool root.
    root: PathBuf,
}

impl TestPool {
    /// Create an empty pool with an empty history directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir
            .path()
            .canonicalize()
            .expect("Failed to canonicalize temp directory");
        fs::create_dir_all(root.join(DEFAULT_HISTORY_DIR))
            .expect("Failed to create history directory");
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// Get the path to the pool root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The pool root as a mount boundary.
    pub fn boundary(&self) -> MountBoundary {
        MountBoundary::new(&self.root)
    }

    /// A resolver that treats only the pool root as a mount point.
    pub fn resolver(&self) -> MountResolver {
        MountResolver::with_probe(
            DEFAULT_HISTORY_DIR,
            Arc::new(FixedMountProbe::new([self.root.clone()])),
        )
    }

    /// Live location of `relative`.
    pub fn live_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    /// Write a live file, creating parent directories.
    pub fn write_live(&self, relative: impl AsRef<Path>, contents: &str) -> PathBuf {
        write_file(&self.live_path(relative), contents)
    }

    /// Delete a live file.
    pub fn remove_live(&self, relative: impl AsRef<Path>) {
        let path = self.live_path(relative);
        fs::remove_file(&path)
            .unwrap_or_else(|e| panic!("Failed to delete file {}: {}", path.display(), e));
    }

    /// Root of a snapshot's view.
    pub fn snapshot_root(&self, name: &str) -> PathBuf {
        self.root.join(DEFAULT_HISTORY_DIR).join(name)
    }

    /// Create an empty snapshot directory.
    pub fn add_snapshot(&self, name: &str) -> PathBuf {
        let dir = self.snapshot_root(name);
        fs::create_dir_all(&dir)
            .unwrap_or_else(|e| panic!("Failed to create snapshot {}: {}", dir.display(), e));
        dir
    }

    /// Write a file inside a snapshot with a fixed modification time.
    pub fn write_in_snapshot(
        &self,
        name: &str,
        relative: impl AsRef<Path>,
        contents: &str,
        mtime: i64,
    ) -> PathBuf {
        let path = write_file(&self.snapshot_root(name).join(relative), contents);
        set_mtime(&path, mtime);
        path
    }

    /// Hard-link a file from one snapshot into another, so both report the
    /// exact same metadata.
    pub fn link_in_snapshot(&self, name: &str, relative: impl AsRef<Path>, from: &str) -> PathBuf {
        let relative = relative.as_ref();
        let source = self.snapshot_root(from).join(relative);
        let target = self.snapshot_root(name).join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::hard_link(&source, &target)
            .unwrap_or_else(|e| panic!("Failed to link {}: {}", target.display(), e));
        target
    }

    /// Replace the history directory with a regular file so that listing it fails.
    pub fn break_history(&self) {
        let dir = self.root.join(DEFAULT_HISTORY_DIR);
        fs::remove_dir_all(&dir).expect("Failed to remove history directory");
        fs::write(&dir, "not a directory").expect("Failed to write history placeholder");
    }

    /// Remove the `.zfs` directory entirely.
    pub fn remove_history(&self) {
        fs::remove_dir_all(self.root.join(".zfs")).expect("Failed to remove .zfs");
    }
}

impl Default for TestPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap_or_else(|e| {
            panic!(
                "Failed to create parent directory for {}: {}",
                path.display(),
                e
            )
        });
    }
    fs::write(path, contents)
        .unwrap_or_else(|e| panic!("Failed to write file {}: {}", path.display(), e));
    path.to_path_buf()
}

/// Set a file's modification time, in seconds since the epoch.
pub fn set_mtime(path: &Path, mtime: i64) {
    let when = SystemTime::UNIX_EPOCH + Duration::from_secs(mtime.max(0) as u64);
    fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(when))
        .unwrap_or_else(|e| panic!("Failed to set mtime of {}: {}", path.display(), e));
}

/// Set a file's permission bits.
pub fn set_mode(path: &Path, mode: u32) {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .unwrap_or_else(|e| panic!("Failed to chmod {}: {}", path.display(), e));
}
