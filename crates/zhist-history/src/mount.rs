//! Splitting paths into a mount boundary and a path relative to it.

use crate::{HistoryError, HistoryResult};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use zhist_util::path::{join_relative, relative_to, with_trailing_separator};

/// Directory at which a dataset is attached to the filesystem hierarchy.
///
/// Always canonical. Displays with a single trailing separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MountBoundary(PathBuf);

impl MountBoundary {
    /// Wrap an already canonical directory path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// The snapshot history directory under this boundary.
    pub fn history_dir(&self, history_dir: &Path) -> PathBuf {
        self.0.join(history_dir)
    }

    /// The live location of `relative` under this boundary.
    pub fn live_path(&self, relative: &RelativePath) -> PathBuf {
        join_relative(&self.0, relative.as_path())
    }
}

impl fmt::Display for MountBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&with_trailing_separator(&self.0))
    }
}

/// Path of a target relative to its mount boundary.
///
/// No leading or trailing separator; empty means the boundary itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct RelativePath(PathBuf);

impl RelativePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Whether this denotes the boundary itself.
    pub fn is_boundary(&self) -> bool {
        self.0.as_os_str().is_empty()
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Decides whether a directory is a mount point.
#[async_trait]
pub trait MountProbe: Send + Sync {
    async fn is_mount_point(&self, dir: &Path) -> io::Result<bool>;
}

/// Mount detection by comparing a directory with its parent: a different
/// device, or the same inode (the root, bind mounts), marks a boundary.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeviceProbe;

#[async_trait]
impl MountProbe for DeviceProbe {
    async fn is_mount_point(&self, dir: &Path) -> io::Result<bool> {
        let parent = match dir.parent() {
            Some(parent) => parent,
            None => return Ok(true),
        };
        let here = tokio::fs::symlink_metadata(dir).await?;
        let above = tokio::fs::metadata(parent).await?;
        Ok(here.dev() != above.dev() || here.ino() == above.ino())
    }
}

/// Resolves arbitrary paths into `(MountBoundary, RelativePath)`.
pub struct MountResolver {
    history_dir: PathBuf,
    probe: Arc<dyn MountProbe>,
}

impl MountResolver {
    /// Create a resolver that detects mount points by device id.
    pub fn new(history_dir: impl Into<PathBuf>) -> Self {
        Self::with_probe(history_dir, Arc::new(DeviceProbe))
    }

    /// Create a resolver with a custom mount probe.
    pub fn with_probe(history_dir: impl Into<PathBuf>, probe: Arc<dyn MountProbe>) -> Self {
        Self {
            history_dir: history_dir.into(),
            probe,
        }
    }

    /// Split `path` and verify its boundary carries snapshot history.
    pub async fn resolve(&self, path: &Path) -> HistoryResult<(MountBoundary, RelativePath)> {
        let (boundary, relative) = self.split(path).await?;
        let history = boundary.history_dir(&self.history_dir);

        match tokio::fs::metadata(&history).await {
            Ok(_) => Ok((boundary, relative)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(HistoryError::NotSnapshotCapable {
                    boundary: boundary.to_string(),
                    history_dir: self.history_dir.clone(),
                })
            }
            Err(e) => Err(HistoryError::SnapshotHistoryUnavailable {
                path: history,
                source: e,
            }),
        }
    }

    /// Split `path` into its mount boundary and the remainder, without
    /// checking for snapshot support.
    ///
    /// Symlinks are resolved to their targets first, so the history shown is
    /// that of the file the link points at.
    pub async fn split(&self, path: &Path) -> HistoryResult<(MountBoundary, RelativePath)> {
        let canonical = match tokio::fs::canonicalize(path).await {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(HistoryError::PathNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        if tokio::fs::symlink_metadata(path)
            .await
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
        {
            debug!(link = %path.display(), target = %canonical.display(), "Following symlink");
        }

        let mut dir = if tokio::fs::metadata(&canonical).await?.is_dir() {
            canonical.clone()
        } else {
            match canonical.parent() {
                Some(parent) => parent.to_path_buf(),
                None => canonical.clone(),
            }
        };

        while !self.probe.is_mount_point(&dir).await? {
            if !dir.pop() {
                break;
            }
        }

        let relative = relative_to(&canonical, &dir).unwrap_or_default();
        debug!(boundary = %dir.display(), relative = %relative.display(), "Resolved mount boundary");
        Ok((MountBoundary(dir), RelativePath(relative)))
    }
}
