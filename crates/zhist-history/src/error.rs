//! History error types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Remediation hint attached to an unreadable snapshot directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemountHint {
    /// The directory most likely isn't on ZFS at all.
    NotZfs,
    /// OpenZFS on OS X hides snapshot directories until the pool is
    /// exported and imported again (openzfsonosx/zfs#232).
    ReimportPool,
}

impl RemountHint {
    /// Pick the hint for the platform we're running on.
    pub fn for_current_platform() -> Self {
        Self::for_os(std::env::consts::OS)
    }

    /// Pick the hint for a given `std::env::consts::OS` value.
    pub fn for_os(os: &str) -> Self {
        if os == "macos" {
            Self::ReimportPool
        } else {
            Self::NotZfs
        }
    }
}

impl fmt::Display for RemountHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotZfs => write!(f, "is this ZFS?"),
            Self::ReimportPool => write!(
                f,
                "reset the pool via zpool export/import \
                 (see https://github.com/openzfsonosx/zfs/issues/232)"
            ),
        }
    }
}

/// Errors that can occur while building a path's history.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The input path does not exist.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// The mount boundary has no snapshot history directory.
    #[error("{boundary} is not snapshot capable (no {history_dir})")]
    NotSnapshotCapable { boundary: String, history_dir: PathBuf },

    /// The history directory exists in principle but can't be inspected.
    #[error("snapshot history unavailable at {path}: {source}")]
    SnapshotHistoryUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The history directory can't be listed.
    #[error("cannot read {path}; {hint}")]
    SnapshotDirUnreadable {
        path: PathBuf,
        hint: RemountHint,
        #[source]
        source: std::io::Error,
    },

    /// Mounting a snapshot failed. Logged, never fatal.
    #[error("unable to mount {snapshot} ({message}), results will be incomplete")]
    MountFailure { snapshot: String, message: String },

    /// Unmounting a snapshot failed. Logged, never fatal.
    #[error("unable to unmount {snapshot} ({message})")]
    UnmountFailure { snapshot: String, message: String },

    /// Dataset name or creation time lookup failed.
    #[error("{operation} failed: {message}")]
    ExternalToolFailure { operation: String, message: String },

    /// An external tool call exceeded the configured bound.
    #[error("{operation} timed out after {timeout:?}")]
    ToolTimeout { operation: String, timeout: Duration },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HistoryError {
    /// Create an external tool failure.
    pub fn tool_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalToolFailure {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a mount failure.
    pub fn mount_failed(snapshot: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MountFailure {
            snapshot: snapshot.into(),
            message: message.into(),
        }
    }

    /// Create an unmount failure.
    pub fn unmount_failed(snapshot: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnmountFailure {
            snapshot: snapshot.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error aborts the target path it occurred on.
    ///
    /// Everything else degrades a single version and is only logged.
    pub fn is_path_fatal(&self) -> bool {
        matches!(
            self,
            Self::PathNotFound(_)
                | Self::NotSnapshotCapable { .. }
                | Self::SnapshotHistoryUnavailable { .. }
                | Self::SnapshotDirUnreadable { .. }
        )
    }

    /// Check if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ToolTimeout { .. })
    }
}
