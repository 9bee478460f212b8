//! Per-run memoization of snapshot tool lookups.

use crate::tool::full_snapshot_name;
use crate::{HistoryResult, MountBoundary, SnapshotTool};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// A named snapshot of the dataset mounted at `boundary`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SnapshotRef {
    pub boundary: MountBoundary,
    pub name: String,
}

impl SnapshotRef {
    pub fn new(boundary: MountBoundary, name: impl Into<String>) -> Self {
        Self {
            boundary,
            name: name.into(),
        }
    }

    /// Where this snapshot's view of the dataset root appears.
    pub fn view_root(&self, history_dir: &Path) -> PathBuf {
        self.boundary.history_dir(history_dir).join(&self.name)
    }
}

/// Wraps a [`SnapshotTool`] and caches dataset names and creation times for
/// the lifetime of one run. Failed lookups aren't cached.
///
/// Also hands out one mount lease per snapshot, so targets processed
/// concurrently take turns on a snapshot's mount state.
pub struct SnapshotCatalog {
    tool: Arc<dyn SnapshotTool>,
    datasets: Mutex<HashMap<MountBoundary, String>>,
    created: Mutex<HashMap<SnapshotRef, i64>>,
    leases: Mutex<HashMap<SnapshotRef, Arc<Mutex<()>>>>,
}

impl SnapshotCatalog {
    pub fn new(tool: Arc<dyn SnapshotTool>) -> Self {
        Self {
            tool,
            datasets: Mutex::new(HashMap::new()),
            created: Mutex::new(HashMap::new()),
            leases: Mutex::new(HashMap::new()),
        }
    }

    pub fn tool(&self) -> &Arc<dyn SnapshotTool> {
        &self.tool
    }

    /// Dataset mounted at `boundary`.
    pub async fn dataset(&self, boundary: &MountBoundary) -> HistoryResult<String> {
        if let Some(name) = self.datasets.lock().await.get(boundary) {
            trace!(boundary = %boundary, "Dataset name cache hit");
            return Ok(name.clone());
        }

        let name = self.tool.dataset_name(boundary).await?;
        self.datasets
            .lock()
            .await
            .insert(boundary.clone(), name.clone());
        Ok(name)
    }

    /// `dataset@snapshot` for `snapshot`.
    pub async fn full_name(&self, snapshot: &SnapshotRef) -> HistoryResult<String> {
        let dataset = self.dataset(&snapshot.boundary).await?;
        Ok(full_snapshot_name(&dataset, &snapshot.name))
    }

    /// Exclusive in-process lease on `snapshot`'s mount state, held from
    /// mount to unmount.
    pub async fn lease(&self, snapshot: &SnapshotRef) -> OwnedMutexGuard<()> {
        let lock = {
            let mut leases = self.leases.lock().await;
            Arc::clone(leases.entry(snapshot.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Creation time of `snapshot` in seconds since the epoch.
    pub async fn creation_time(&self, snapshot: &SnapshotRef) -> HistoryResult<i64> {
        if let Some(created) = self.created.lock().await.get(snapshot) {
            trace!(snapshot = %snapshot.name, "Creation time cache hit");
            return Ok(*created);
        }

        let dataset = self.dataset(&snapshot.boundary).await?;
        let created = self.tool.creation_time(&dataset, &snapshot.name).await?;
        self.created.lock().await.insert(snapshot.clone(), created);
        Ok(created)
    }
}
