//! Snapshot history for zhist.
//!
//! Reconstructs which versions of a path exist across every retained ZFS
//! snapshot of its filesystem, and rolls that timeline up into a short list
//! of changes:
//! - Resolve a path into its mount boundary and relative path
//! - List the snapshots under the boundary's `.zfs/snapshot`
//! - Mount each snapshot just long enough to stat the path
//! - Diff consecutive versions into Added / Changed / Deleted events
//!
//! # Example
//!
//! ```no_run
//! use zhist_history::{History, HistoryConfig};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let history = History::new(HistoryConfig::default());
//!
//! for report in history.process(&[PathBuf::from("/tank/home/notes.txt")]).await {
//!     let rolled = report.outcome?;
//!     for event in rolled.events {
//!         println!("{} {}", event.kind.code(), event.path.display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod catalog;
mod config;
mod enumerate;
mod error;
mod history;
mod mount;
mod rollup;
mod timeline;
mod tool;
mod transient;
mod version;

pub use catalog::{SnapshotCatalog, SnapshotRef};
pub use config::{HistoryConfig, DEFAULT_HISTORY_DIR};
pub use enumerate::list_snapshots;
pub use error::{HistoryError, HistoryResult, RemountHint};
pub use history::{History, PathHistory, PathReport};
pub use mount::{DeviceProbe, MountBoundary, MountProbe, MountResolver, RelativePath};
pub use rollup::{rollup, EventKind, RollupEvent};
pub use timeline::{Timeline, TimelineBuilder};
pub use tool::{full_snapshot_name, MountOutcome, SnapshotTool, ZfsCommand};
pub use transient::{with_mounted_snapshot, MountState, TransientMount};
pub use version::{
    sort_timeline, AttributeSet, Field, FieldValue, Payload, Version, VersionSource,
    ORIGIN_TIMESTAMP,
};
