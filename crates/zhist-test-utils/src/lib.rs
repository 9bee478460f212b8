//! Testing utilities, fixtures, and mocks for zhist.
//!
//! - **Fixtures**: a temporary "pool" laid out like a ZFS mount, with a
//!   `.zfs/snapshot` directory and per-snapshot file trees
//! - **Mocks**: a scripted snapshot tool that records every call, and a
//!   mount probe with a fixed set of mount points
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use zhist_test_utils::{MockSnapshotTool, TestPool};
//!
//! #[tokio::test]
//! async fn test_history() {
//!     let pool = TestPool::new();
//!     pool.write_live("notes.txt", "hello");
//!     pool.write_in_snapshot("daily-1", "notes.txt", "hi", 1_000);
//!
//!     let tool = MockSnapshotTool::new().with_creation("daily-1", 1_000);
//!     // ...
//! }
//! ```

pub mod fixtures;
pub mod mocks;

pub use fixtures::TestPool;
pub use mocks::{FixedMountProbe, MockMount, MockSnapshotTool, ToolCall};
