//! The snapshot management tool, driven as a subprocess.
//!
//! Contract of the four operations we rely on:
//!
//! | Operation | Invocation | Output | Exit codes |
//! |---|---|---|---|
//! | dataset name | `zfs list -H -o name <mount>` | dataset | 0 |
//! | creation time | `zfs get -H -p -o value creation <ds@snap>` | epoch seconds | 0 |
//! | mount | `zfs mount <ds@snap>` | | 0 mounted, 1 already mounted |
//! | unmount | `zfs unmount <ds@snap>` | | 0 |

use crate::{HistoryConfig, HistoryError, HistoryResult, MountBoundary};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;
use zhist_util::TimingGuard;

/// Result of a successful mount request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    /// We mounted it and are responsible for unmounting it.
    Mounted,
    /// Somebody else mounted it; leave it alone.
    AlreadyMounted,
}

/// Full `dataset@snapshot` name.
pub fn full_snapshot_name(dataset: &str, snapshot: &str) -> String {
    format!("{dataset}@{snapshot}")
}

/// Operations on the external snapshot management tool.
#[async_trait]
pub trait SnapshotTool: Send + Sync {
    /// Name of the dataset mounted at `boundary`.
    async fn dataset_name(&self, boundary: &MountBoundary) -> HistoryResult<String>;

    /// Creation time of `dataset@snapshot`, in seconds since the epoch.
    async fn creation_time(&self, dataset: &str, snapshot: &str) -> HistoryResult<i64>;

    /// Mount `dataset@snapshot`.
    async fn mount(&self, full_name: &str) -> HistoryResult<MountOutcome>;

    /// Unmount `dataset@snapshot`.
    async fn unmount(&self, full_name: &str) -> HistoryResult<()>;
}

/// `SnapshotTool` backed by the `zfs` command line.
#[derive(Debug, Clone)]
pub struct ZfsCommand {
    binary: String,
    timeout: Duration,
}

impl ZfsCommand {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.zfs_binary.clone(), config.command_timeout())
    }

    /// Run the tool with `args`, bounded by the configured timeout.
    async fn run(&self, args: &[&str]) -> HistoryResult<Output> {
        let operation = format!("{} {}", self.binary, args.first().copied().unwrap_or_default());
        // half the timeout is already slow enough to report
        let _timing = TimingGuard::external(operation.clone(), args.last().copied().unwrap_or_default())
            .with_warn_threshold(u64::try_from(self.timeout.as_millis() / 2).unwrap_or(u64::MAX));
        debug!(binary = %self.binary, args = ?args, "Running snapshot tool");

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(HistoryError::tool_failed(operation, e.to_string())),
            Err(_) => Err(HistoryError::ToolTimeout {
                operation,
                timeout: self.timeout,
            }),
        }
    }

    /// Run and return the first non-empty stdout line, failing on nonzero exit.
    async fn query(&self, args: &[&str]) -> HistoryResult<String> {
        let output = self.run(args).await?;
        let operation = || format!("{} {}", self.binary, args.join(" "));

        if !output.status.success() {
            return Err(HistoryError::tool_failed(operation(), describe_failure(&output)));
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| HistoryError::tool_failed(operation(), "no output"))
    }
}

#[async_trait]
impl SnapshotTool for ZfsCommand {
    async fn dataset_name(&self, boundary: &MountBoundary) -> HistoryResult<String> {
        let mount_point = boundary.as_path().to_string_lossy();
        self.query(&["list", "-H", "-o", "name", &mount_point]).await
    }

    async fn creation_time(&self, dataset: &str, snapshot: &str) -> HistoryResult<i64> {
        let full_name = full_snapshot_name(dataset, snapshot);
        let value = self
            .query(&["get", "-H", "-p", "-o", "value", "creation", &full_name])
            .await?;
        value.parse().map_err(|_| {
            HistoryError::tool_failed(
                format!("{} get creation {full_name}", self.binary),
                format!("not a timestamp: {value:?}"),
            )
        })
    }

    async fn mount(&self, full_name: &str) -> HistoryResult<MountOutcome> {
        let output = self.run(&["mount", full_name]).await?;
        match output.status.code() {
            Some(0) => Ok(MountOutcome::Mounted),
            Some(1) => Ok(MountOutcome::AlreadyMounted),
            _ => Err(HistoryError::mount_failed(full_name, describe_failure(&output))),
        }
    }

    async fn unmount(&self, full_name: &str) -> HistoryResult<()> {
        let output = self.run(&["unmount", full_name]).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(HistoryError::unmount_failed(full_name, describe_failure(&output)))
        }
    }
}

fn describe_failure(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let code = output
        .status
        .code()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    if stderr.is_empty() {
        format!("exit {code}")
    } else {
        format!("exit {code}: {stderr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    /// Write an executable stand-in for `zfs`.
    fn fake_zfs(dir: &Path, body: &str) -> String {
        let path = dir.join("zfs");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    const SCRIPT: &str = r#"case "$1" in
  list) echo "tank/home" ;;
  get) case "$7" in
         tank/home@bad) echo "yesterday" ;;
         *) echo "1700000000" ;;
       esac ;;
  mount) case "$2" in
           *@fresh) exit 0 ;;
           *@busy) exit 1 ;;
           *) echo "cannot mount" >&2; exit 2 ;;
         esac ;;
  unmount) case "$2" in
             *@fresh) exit 0 ;;
             *) echo "dataset is busy" >&2; exit 1 ;;
           esac ;;
esac"#;

    #[test]
    fn test_full_snapshot_name() {
        assert_eq!(full_snapshot_name("tank/home", "daily"), "tank/home@daily");
    }

    #[tokio::test]
    async fn test_queries() {
        let dir = TempDir::new().unwrap();
        let zfs = ZfsCommand::new(fake_zfs(dir.path(), SCRIPT), Duration::from_secs(10));

        let dataset = zfs.dataset_name(&MountBoundary::new("/tank/home")).await.unwrap();
        assert_eq!(dataset, "tank/home");
        assert_eq!(zfs.creation_time("tank/home", "daily").await.unwrap(), 1_700_000_000);

        let err = zfs.creation_time("tank/home", "bad").await.unwrap_err();
        assert!(matches!(err, HistoryError::ExternalToolFailure { .. }));
    }

    #[tokio::test]
    async fn test_mount_exit_codes() {
        let dir = TempDir::new().unwrap();
        let zfs = ZfsCommand::new(fake_zfs(dir.path(), SCRIPT), Duration::from_secs(10));

        assert_eq!(zfs.mount("tank/home@fresh").await.unwrap(), MountOutcome::Mounted);
        assert_eq!(zfs.mount("tank/home@busy").await.unwrap(), MountOutcome::AlreadyMounted);
        match zfs.mount("tank/home@broken").await.unwrap_err() {
            HistoryError::MountFailure { snapshot, message } => {
                assert_eq!(snapshot, "tank/home@broken");
                assert_eq!(message, "exit 2: cannot mount");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(zfs.unmount("tank/home@fresh").await.is_ok());
        assert!(matches!(
            zfs.unmount("tank/home@busy").await,
            Err(HistoryError::UnmountFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_failing_query() {
        let dir = TempDir::new().unwrap();
        let zfs = ZfsCommand::new(
            fake_zfs(dir.path(), "echo 'not a ZFS filesystem' >&2; exit 1"),
            Duration::from_secs(10),
        );
        let err = zfs.dataset_name(&MountBoundary::new("/tmp")).await.unwrap_err();
        assert!(err.to_string().contains("not a ZFS filesystem"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let zfs = ZfsCommand::new("/nonexistent/zfs-binary", Duration::from_secs(1));
        let err = zfs.mount("tank@a").await.unwrap_err();
        assert!(matches!(err, HistoryError::ExternalToolFailure { .. }));
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let zfs = ZfsCommand::new(fake_zfs(dir.path(), "sleep 10"), Duration::from_millis(100));
        let err = zfs.mount("tank@slow").await.unwrap_err();
        assert!(err.is_timeout());
    }
}
