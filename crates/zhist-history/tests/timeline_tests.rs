//! Timeline assembly against a fake pool.

use std::path::Path;
use std::sync::Arc;
use zhist_history::{
    rollup, EventKind, Field, HistoryError, RelativePath, SnapshotCatalog, TimelineBuilder,
    VersionSource, DEFAULT_HISTORY_DIR,
};
use zhist_test_utils::fixtures::set_mode;
use zhist_test_utils::{MockMount, MockSnapshotTool, TestPool, ToolCall};

const NOW: i64 = 10_000;

fn sources(timeline: &[zhist_history::Version]) -> Vec<VersionSource> {
    timeline.iter().map(|v| v.source.clone()).collect()
}

fn snap(name: &str) -> VersionSource {
    VersionSource::Snapshot(name.to_string())
}

#[tokio::test]
async fn test_timeline_order_and_presence() {
    let pool = TestPool::new();
    pool.write_live("notes.txt", "live");
    pool.write_in_snapshot("z", "notes.txt", "old", 50);
    pool.write_in_snapshot("a", "notes.txt", "mid", 150);
    pool.add_snapshot("b");

    let tool = MockSnapshotTool::new()
        .with_creation("z", 100)
        .with_creation("a", 200)
        .with_creation("b", 200);
    let catalog = SnapshotCatalog::new(Arc::new(tool.clone()));

    let timeline = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR))
        .at(NOW)
        .build(&pool.boundary(), &RelativePath::new("notes.txt"))
        .await
        .unwrap();

    assert_eq!(
        sources(&timeline),
        vec![
            VersionSource::Origin,
            snap("z"),
            snap("a"),
            snap("b"),
            VersionSource::Live,
        ]
    );
    let present: Vec<bool> = timeline.iter().map(|v| v.is_present()).collect();
    assert_eq!(present, vec![false, true, true, false, true]);

    assert_eq!(timeline[1].path, pool.snapshot_root("z").join("notes.txt"));
    assert_eq!(timeline[4].path, pool.live_path("notes.txt"));
    assert_eq!(timeline[4].timestamp, NOW);

    // every snapshot was mounted and released
    assert_eq!(tool.mounted().len(), 3);
    assert_eq!(tool.unmounted().len(), 3);
}

#[tokio::test]
async fn test_live_shares_second_with_snapshot() {
    let pool = TestPool::new();
    pool.write_live("f", "x");
    pool.add_snapshot("s");

    let tool = MockSnapshotTool::new().with_creation("s", NOW);
    let catalog = SnapshotCatalog::new(Arc::new(tool));

    let timeline = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR))
        .at(NOW)
        .build(&pool.boundary(), &RelativePath::new("f"))
        .await
        .unwrap();

    assert_eq!(
        sources(&timeline),
        vec![VersionSource::Origin, snap("s"), VersionSource::Live]
    );
}

#[tokio::test]
async fn test_unknown_creation_time_drops_snapshot() {
    let pool = TestPool::new();
    pool.write_in_snapshot("good", "f", "x", 10);
    pool.write_in_snapshot("broken", "f", "x", 10);

    let tool = MockSnapshotTool::new()
        .with_creation("good", 100)
        .with_creation_failure("broken", "dataset does not exist");
    let catalog = SnapshotCatalog::new(Arc::new(tool.clone()));

    let timeline = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR))
        .at(NOW)
        .build(&pool.boundary(), &RelativePath::new("f"))
        .await
        .unwrap();

    assert_eq!(
        sources(&timeline),
        vec![VersionSource::Origin, snap("good"), VersionSource::Live]
    );
    assert_eq!(timeline.skipped, vec!["broken"]);
    assert_eq!(tool.mounted(), vec!["tank/test@good"]);
}

#[tokio::test]
async fn test_deleted_live_file_ends_history() {
    let pool = TestPool::new();
    pool.write_in_snapshot("s1", "f", "x", 10);
    pool.write_live("f", "x");
    pool.remove_live("f");

    let tool = MockSnapshotTool::new().with_creation("s1", 100);
    let catalog = SnapshotCatalog::new(Arc::new(tool));

    let timeline = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR))
        .at(NOW)
        .build(&pool.boundary(), &RelativePath::new("f"))
        .await
        .unwrap();

    assert!(timeline.skipped.is_empty());
    let events = rollup(&timeline);
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::Added, EventKind::Deleted]);
    assert_eq!(events[1].path, pool.live_path("f"));
    assert_eq!(events[1].timestamp, NOW);
}

#[tokio::test]
async fn test_failed_mount_still_reads_view() {
    let pool = TestPool::new();
    pool.write_in_snapshot("s1", "f", "x", 10);

    let tool = MockSnapshotTool::new()
        .with_creation("s1", 100)
        .with_mount("tank/test@s1", MockMount::Fail("permission denied".into()));
    let catalog = SnapshotCatalog::new(Arc::new(tool.clone()));

    let timeline = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR))
        .at(NOW)
        .build(&pool.boundary(), &RelativePath::new("f"))
        .await
        .unwrap();

    assert!(timeline[1].is_present());
    assert!(tool.unmounted().is_empty());
}

#[tokio::test]
async fn test_mounting_disabled() {
    let pool = TestPool::new();
    pool.write_in_snapshot("s1", "f", "x", 10);

    let tool = MockSnapshotTool::new().with_creation("s1", 100);
    let catalog = SnapshotCatalog::new(Arc::new(tool.clone()));

    let timeline = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR))
        .mount_snapshots(false)
        .at(NOW)
        .build(&pool.boundary(), &RelativePath::new("f"))
        .await
        .unwrap();

    assert!(timeline[1].is_present());
    assert!(tool.mounted().is_empty());
}

#[tokio::test]
async fn test_unreadable_history_is_fatal() {
    let pool = TestPool::new();
    pool.break_history();

    let tool = MockSnapshotTool::new();
    let catalog = SnapshotCatalog::new(Arc::new(tool.clone()));

    let err = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR))
        .build(&pool.boundary(), &RelativePath::new("f"))
        .await
        .unwrap_err();

    assert!(matches!(err, HistoryError::SnapshotDirUnreadable { .. }));
    assert_eq!(tool.call_count(), 0);
}

#[tokio::test]
async fn test_boundary_itself_has_history() {
    let pool = TestPool::new();
    pool.add_snapshot("s1");

    let tool = MockSnapshotTool::new().with_creation("s1", 100);
    let catalog = SnapshotCatalog::new(Arc::new(tool));

    let timeline = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR))
        .at(NOW)
        .build(&pool.boundary(), &RelativePath::new(""))
        .await
        .unwrap();

    assert_eq!(timeline[1].path, pool.snapshot_root("s1"));
    assert!(timeline.iter().skip(1).all(|v| v.is_present()));
    assert_eq!(rollup(&timeline)[0].kind, EventKind::Added);
}

#[tokio::test]
async fn test_lookups_are_cached_across_paths() {
    let pool = TestPool::new();
    for name in ["s1", "s2", "s3"] {
        pool.write_in_snapshot(name, "a", "x", 10);
        pool.write_in_snapshot(name, "b", "y", 10);
    }

    let tool = MockSnapshotTool::new()
        .with_creation("s1", 100)
        .with_creation("s2", 200)
        .with_creation("s3", 300);
    let catalog = SnapshotCatalog::new(Arc::new(tool.clone()));
    let builder = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR)).at(NOW);

    builder
        .build(&pool.boundary(), &RelativePath::new("a"))
        .await
        .unwrap();
    builder
        .build(&pool.boundary(), &RelativePath::new("b"))
        .await
        .unwrap();

    assert_eq!(
        tool.count(|c| matches!(c, ToolCall::CreationTime { .. })),
        3
    );
    assert_eq!(tool.count(|c| matches!(c, ToolCall::DatasetName(_))), 1);
    // mounts are per stat, never cached
    assert_eq!(tool.mounted().len(), 6);
}

#[tokio::test]
async fn test_rollup_of_real_files() {
    let pool = TestPool::new();
    pool.write_in_snapshot("s1", "f", "first", 1_000);
    pool.link_in_snapshot("s2", "f", "s1");
    pool.write_in_snapshot("s3", "f", "second", 2_000);
    pool.add_snapshot("s4");
    pool.write_live("f", "back again");

    let tool = MockSnapshotTool::new()
        .with_creation("s1", 100)
        .with_creation("s2", 200)
        .with_creation("s3", 300)
        .with_creation("s4", 400);
    let catalog = SnapshotCatalog::new(Arc::new(tool));

    let timeline = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR))
        .at(NOW)
        .build(&pool.boundary(), &RelativePath::new("f"))
        .await
        .unwrap();
    let events = rollup(&timeline);

    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Added,
            EventKind::ContentChanged,
            EventKind::Deleted,
            EventKind::Added,
        ]
    );
    assert_eq!(events[0].path, pool.snapshot_root("s1").join("f"));
    assert_eq!(events[0].timestamp, 100);
    assert_eq!(events[1].timestamp, 300);
    assert!(events[1].payload.contains_key(&Field::ModifyTime));
    assert!(!events[1].payload.contains_key(&Field::ChangeTime));
    assert!(events[2].payload.is_empty());
    assert_eq!(events[3].path, pool.live_path("f"));
}

#[tokio::test]
async fn test_permission_change_of_real_files() {
    let pool = TestPool::new();
    let first = pool.write_in_snapshot("s1", "f", "same", 1_000);
    set_mode(&first, 0o644);
    let second = pool.write_in_snapshot("s2", "f", "same", 1_000);
    set_mode(&second, 0o600);

    let tool = MockSnapshotTool::new()
        .with_creation("s1", 100)
        .with_creation("s2", 200);
    let catalog = SnapshotCatalog::new(Arc::new(tool));

    let timeline = TimelineBuilder::new(&catalog, Path::new(DEFAULT_HISTORY_DIR))
        .at(NOW)
        .build(&pool.boundary(), &RelativePath::new("f"))
        .await
        .unwrap();
    let events = rollup(&timeline);

    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Added, EventKind::PermissionChanged, EventKind::Deleted]
    );
    let payload = &events[1].payload;
    assert!(payload.contains_key(&Field::Mode));
    assert!(!payload.contains_key(&Field::ModifyTime));
}
