//! Batch entry point: one roll-up per requested path.

use crate::{
    rollup, HistoryConfig, HistoryResult, MountBoundary, MountResolver, RelativePath,
    RollupEvent, SnapshotCatalog, SnapshotTool, TimelineBuilder, ZfsCommand,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};

/// Roll-up of a single path.
#[derive(Debug, Clone, Serialize)]
pub struct PathHistory {
    pub boundary: MountBoundary,
    pub relative: RelativePath,
    /// The live location of the path.
    pub path: PathBuf,
    /// Number of versions on the timeline, origin sentinel included.
    pub versions: usize,
    pub events: Vec<RollupEvent>,
    /// Snapshots left off the timeline because their creation time is unknown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_snapshots: Vec<String>,
}

/// Outcome for one requested path.
#[derive(Debug)]
pub struct PathReport {
    /// The path as given by the caller.
    pub input: PathBuf,
    pub outcome: HistoryResult<PathHistory>,
}

/// Resolves, enumerates, and rolls up path histories.
///
/// Holds the per-run caches, so reuse one instance for a whole batch.
pub struct History {
    config: HistoryConfig,
    resolver: MountResolver,
    catalog: SnapshotCatalog,
}

impl History {
    /// Create a history backed by the `zfs` command line.
    pub fn new(config: HistoryConfig) -> Self {
        let tool = Arc::new(ZfsCommand::from_config(&config));
        let resolver = MountResolver::new(config.history_dir.clone());
        Self::with_parts(config, resolver, tool)
    }

    /// Create a history with a custom resolver and snapshot tool.
    pub fn with_parts(
        config: HistoryConfig,
        resolver: MountResolver,
        tool: Arc<dyn SnapshotTool>,
    ) -> Self {
        Self {
            config,
            resolver,
            catalog: SnapshotCatalog::new(tool),
        }
    }

    /// Build the roll-up of one path.
    pub async fn path_history(&self, path: &Path) -> HistoryResult<PathHistory> {
        let (boundary, relative) = self.resolver.resolve(path).await?;
        let timeline = TimelineBuilder::new(&self.catalog, &self.config.history_dir)
            .mount_snapshots(self.config.mount_snapshots)
            .build(&boundary, &relative)
            .await?;

        let events = rollup(&timeline);
        debug!(events = events.len(), "Rolled up timeline");
        Ok(PathHistory {
            path: boundary.live_path(&relative),
            boundary,
            relative,
            versions: timeline.len(),
            events,
            skipped_snapshots: timeline.skipped,
        })
    }

    /// Process every path independently, returning reports in input order.
    ///
    /// A failure on one path never affects the others.
    pub async fn process(&self, paths: &[PathBuf]) -> Vec<PathReport> {
        stream::iter(paths)
            .map(|input| {
                let span = info_span!("path", input = %input.display());
                async move {
                    let outcome = self.path_history(input).await;
                    match &outcome {
                        Err(e) if e.is_path_fatal() => debug!(error = %e, "No history for path"),
                        Err(e) => warn!(error = %e, "Unexpected failure"),
                        Ok(_) => {}
                    }
                    PathReport {
                        input: input.clone(),
                        outcome,
                    }
                }
                .instrument(span)
            })
            .buffered(self.config.jobs.max(1))
            .collect()
            .await
    }
}
