//! Mock implementations for testing.
//!
//! Provides test doubles for the snapshot tool and mount detection so that
//! timelines can be built without ZFS or root.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zhist_history::{
    HistoryError, HistoryResult, MountBoundary, MountOutcome, MountProbe, SnapshotTool,
};

/// Dataset name reported when none is configured for a boundary.
pub const DEFAULT_DATASET: &str = "tank/test";

/// A recorded snapshot tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    DatasetName(PathBuf),
    CreationTime { dataset: String, snapshot: String },
    Mount(String),
    Unmount(String),
    /// Inserted by the test itself, to check ordering against tool calls.
    Marker(String),
}

/// Scripted reaction to a mount request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockMount {
    Mounted,
    AlreadyMounted,
    Fail(String),
    Timeout,
}

/// A mock snapshot tool.
///
/// Records every call and answers from configured responses.
///
/// # Example
///
/// ```rust
/// use zhist_test_utils::mocks::{MockMount, MockSnapshotTool};
///
/// let tool = MockSnapshotTool::new()
///     .with_creation("daily-1", 1_700_000_000)
///     .with_mount("tank/test@daily-1", MockMount::AlreadyMounted);
/// assert_eq!(tool.call_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockSnapshotTool {
    calls: Arc<Mutex<Vec<ToolCall>>>,
    datasets: HashMap<PathBuf, Result<String, String>>,
    created: HashMap<String, Result<i64, String>>,
    mounts: HashMap<String, MockMount>,
    unmount_failures: HashSet<String>,
}

impl MockSnapshotTool {
    /// Create a new mock tool. Every boundary maps to [`DEFAULT_DATASET`],
    /// every mount succeeds, and unknown snapshots have no creation time.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `dataset` for the boundary at `mount_point`.
    pub fn with_dataset(mut self, mount_point: impl Into<PathBuf>, dataset: &str) -> Self {
        self.datasets
            .insert(mount_point.into(), Ok(dataset.to_string()));
        self
    }

    /// Fail the dataset lookup for `mount_point`.
    pub fn with_dataset_failure(mut self, mount_point: impl Into<PathBuf>, message: &str) -> Self {
        self.datasets
            .insert(mount_point.into(), Err(message.to_string()));
        self
    }

    /// Report `created` as the creation time of `snapshot` (any dataset).
    pub fn with_creation(mut self, snapshot: &str, created: i64) -> Self {
        self.created.insert(snapshot.to_string(), Ok(created));
        self
    }

    /// Fail the creation time lookup for `snapshot`.
    pub fn with_creation_failure(mut self, snapshot: &str, message: &str) -> Self {
        self.created
            .insert(snapshot.to_string(), Err(message.to_string()));
        self
    }

    /// Script the reaction to mounting `full_name`.
    pub fn with_mount(mut self, full_name: &str, mount: MockMount) -> Self {
        self.mounts.insert(full_name.to_string(), mount);
        self
    }

    /// Fail unmounting `full_name`.
    pub fn with_unmount_failure(mut self, full_name: &str) -> Self {
        self.unmount_failures.insert(full_name.to_string());
        self
    }

    fn record(&self, call: ToolCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Record a test-defined marker between tool calls.
    pub fn mark(&self, label: &str) {
        self.record(ToolCall::Marker(label.to_string()));
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Count calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&ToolCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    /// Names passed to `mount`, in order.
    pub fn mounted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ToolCall::Mount(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Names passed to `unmount`, in order.
    pub fn unmounted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ToolCall::Unmount(name) => Some(name),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SnapshotTool for MockSnapshotTool {
    async fn dataset_name(&self, boundary: &MountBoundary) -> HistoryResult<String> {
        self.record(ToolCall::DatasetName(boundary.as_path().to_path_buf()));
        match self.datasets.get(boundary.as_path()) {
            Some(Ok(name)) => Ok(name.clone()),
            Some(Err(message)) => Err(HistoryError::tool_failed("zfs list", message.clone())),
            None => Ok(DEFAULT_DATASET.to_string()),
        }
    }

    async fn creation_time(&self, dataset: &str, snapshot: &str) -> HistoryResult<i64> {
        self.record(ToolCall::CreationTime {
            dataset: dataset.to_string(),
            snapshot: snapshot.to_string(),
        });
        match self.created.get(snapshot) {
            Some(Ok(created)) => Ok(*created),
            Some(Err(message)) => Err(HistoryError::tool_failed("zfs get", message.clone())),
            None => Err(HistoryError::tool_failed(
                "zfs get",
                format!("could not find snapshot {snapshot}"),
            )),
        }
    }

    async fn mount(&self, full_name: &str) -> HistoryResult<MountOutcome> {
        self.record(ToolCall::Mount(full_name.to_string()));
        match self.mounts.get(full_name).unwrap_or(&MockMount::Mounted) {
            MockMount::Mounted => Ok(MountOutcome::Mounted),
            MockMount::AlreadyMounted => Ok(MountOutcome::AlreadyMounted),
            MockMount::Fail(message) => Err(HistoryError::mount_failed(full_name, message.clone())),
            MockMount::Timeout => Err(HistoryError::ToolTimeout {
                operation: "zfs mount".to_string(),
                timeout: Duration::from_secs(30),
            }),
        }
    }

    async fn unmount(&self, full_name: &str) -> HistoryResult<()> {
        self.record(ToolCall::Unmount(full_name.to_string()));
        if self.unmount_failures.contains(full_name) {
            Err(HistoryError::unmount_failed(full_name, "exit 1: dataset is busy"))
        } else {
            Ok(())
        }
    }
}

/// A mount probe that treats only the given directories (and `/`) as mount
/// points.
#[derive(Debug, Clone, Default)]
pub struct FixedMountProbe {
    mounts: HashSet<PathBuf>,
}

impl FixedMountProbe {
    pub fn new(mounts: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            mounts: mounts.into_iter().collect(),
        }
    }
}

#[async_trait]
impl MountProbe for FixedMountProbe {
    async fn is_mount_point(&self, dir: &Path) -> io::Result<bool> {
        Ok(dir.parent().is_none() || self.mounts.contains(dir))
    }
}
