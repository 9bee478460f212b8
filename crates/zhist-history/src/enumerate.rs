//! Listing the snapshots retained under a mount boundary.

use crate::{HistoryError, HistoryResult, MountBoundary, RemountHint};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// List snapshot names in `boundary`'s history directory.
///
/// Order carries no meaning; callers sort versions by creation time.
pub async fn list_snapshots(
    boundary: &MountBoundary,
    history_dir: &Path,
) -> HistoryResult<BTreeSet<String>> {
    let dir = boundary.history_dir(history_dir);
    let unreadable = |source: std::io::Error| HistoryError::SnapshotDirUnreadable {
        path: dir.clone(),
        hint: RemountHint::for_current_platform(),
        source,
    };

    let mut entries = tokio::fs::read_dir(&dir).await.map_err(unreadable)?;
    let mut names = BTreeSet::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        names.insert(entry.file_name().to_string_lossy().into_owned());
    }

    debug!(dir = %dir.display(), count = names.len(), "Listed snapshots");
    Ok(names)
}
