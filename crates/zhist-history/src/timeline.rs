//! Assembling the ordered version timeline of one path.

use crate::enumerate::list_snapshots;
use crate::transient::with_mounted_snapshot;
use crate::version::sort_timeline;
use crate::{
    AttributeSet, HistoryResult, MountBoundary, RelativePath, SnapshotCatalog, SnapshotRef,
    Version,
};
use chrono::Utc;
use std::ops::Deref;
use std::path::Path;
use tracing::{debug, warn};
use zhist_util::path::join_relative;
use zhist_util::TimingGuard;

/// Sorted versions of one path.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub versions: Vec<Version>,
    /// Snapshots left out because their creation time is unknown.
    pub skipped: Vec<String>,
}

impl Deref for Timeline {
    type Target = [Version];

    fn deref(&self) -> &[Version] {
        &self.versions
    }
}

/// Builds the version timeline of a path: origin sentinel, live version,
/// and one version per snapshot whose creation time can be determined.
pub struct TimelineBuilder<'a> {
    catalog: &'a SnapshotCatalog,
    history_dir: &'a Path,
    mount_snapshots: bool,
    now: Option<i64>,
}

impl<'a> TimelineBuilder<'a> {
    pub fn new(catalog: &'a SnapshotCatalog, history_dir: &'a Path) -> Self {
        Self {
            catalog,
            history_dir,
            mount_snapshots: true,
            now: None,
        }
    }

    /// Whether to mount each snapshot around its stat.
    pub fn mount_snapshots(mut self, enabled: bool) -> Self {
        self.mount_snapshots = enabled;
        self
    }

    /// Pin the live version's timestamp instead of reading the clock.
    pub fn at(mut self, now: i64) -> Self {
        self.now = Some(now);
        self
    }

    /// Build the sorted timeline.
    ///
    /// Fails only when the snapshot directory can't be listed. A snapshot
    /// whose creation time is unknown is left out; one that can't be
    /// mounted or stat'ed is recorded as absent.
    pub async fn build(
        &self,
        boundary: &MountBoundary,
        relative: &RelativePath,
    ) -> HistoryResult<Timeline> {
        let live_path = boundary.live_path(relative);
        let _timing = TimingGuard::new("timeline", "build", live_path.display().to_string());

        let snapshots = list_snapshots(boundary, self.history_dir).await?;

        let mut versions = Vec::with_capacity(snapshots.len() + 2);
        versions.push(Version::origin(&live_path));
        let now = self.now.unwrap_or_else(|| Utc::now().timestamp());
        let live = read_attributes(&live_path).await;
        versions.push(Version::live(&live_path, now, live));
        let mut skipped = Vec::new();

        for name in snapshots {
            let snapshot = SnapshotRef::new(boundary.clone(), name);
            let created = match self.catalog.creation_time(&snapshot).await {
                Ok(created) => created,
                Err(e) => {
                    debug!(
                        snapshot = %snapshot.name,
                        error = %e,
                        "Skipping snapshot with unknown creation time"
                    );
                    skipped.push(snapshot.name);
                    continue;
                }
            };

            let path = join_relative(&snapshot.view_root(self.history_dir), relative.as_path());
            let attributes = if self.mount_snapshots {
                with_mounted_snapshot(self.catalog, &snapshot, || read_attributes(&path)).await
            } else {
                read_attributes(&path).await
            };
            versions.push(Version::snapshot(path, created, snapshot.name, attributes));
        }

        if !skipped.is_empty() {
            warn!(
                path = %live_path.display(),
                skipped = skipped.len(),
                first = %skipped[0],
                "Left out snapshots with unknown creation time"
            );
        }

        sort_timeline(&mut versions);
        debug!(path = %live_path.display(), versions = versions.len(), "Built timeline");
        Ok(Timeline { versions, skipped })
    }
}

/// `lstat` a version, degrading any error to "absent".
async fn read_attributes(path: &Path) -> Option<AttributeSet> {
    match AttributeSet::read(path).await {
        Ok(attributes) => attributes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unable to stat version, treating as absent");
            None
        }
    }
}
