//! Snapshot views mounted for the duration of a single stat.
//!
//! A snapshot's mount state is shared with everything else on the host, so
//! a [`TransientMount`] only unmounts what it mounted itself. Neither side of
//! the pair is allowed to fail the surrounding computation: a failed mount
//! still runs the body (the view may be reachable anyway, or the path simply
//! reads as absent), and a failed unmount is only logged.
//!
//! Within one process, a guard also holds the snapshot's lease from the
//! [`SnapshotCatalog`] until its unmount has run, so a concurrent target
//! never reads through a mount another target is about to remove.

use crate::{MountOutcome, SnapshotCatalog, SnapshotRef, SnapshotTool};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

/// What acquiring the mount achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    /// Mounted by us; unmount on release.
    Owned,
    /// Was already mounted; never unmount.
    Borrowed,
    /// Mounting failed; nothing to release.
    Unavailable,
    /// The mount request timed out. The tool may still have mounted the
    /// snapshot, but we can't tell it apart from someone else's mount.
    TimedOut,
}

/// Guard over a snapshot mount.
///
/// Call [`TransientMount::release`] when done. If the guard is dropped
/// without it (cancelled future, panicking body) and owns the mount, the
/// unmount is spawned on the current tokio runtime instead.
pub struct TransientMount {
    tool: Arc<dyn SnapshotTool>,
    full_name: Option<String>,
    state: MountState,
    released: bool,
    lease: Option<OwnedMutexGuard<()>>,
}

impl TransientMount {
    /// Try to mount `snapshot`. Never fails; see [`MountState`].
    pub async fn acquire(catalog: &SnapshotCatalog, snapshot: &SnapshotRef) -> Self {
        let tool = Arc::clone(catalog.tool());
        let lease = catalog.lease(snapshot).await;

        let full_name = match catalog.full_name(snapshot).await {
            Ok(name) => name,
            Err(e) => {
                warn!(
                    boundary = %snapshot.boundary,
                    snapshot = %snapshot.name,
                    error = %e,
                    "Unable to mount snapshot, results will be incomplete"
                );
                return Self {
                    tool,
                    full_name: None,
                    state: MountState::Unavailable,
                    released: false,
                    lease: Some(lease),
                };
            }
        };

        let state = match tool.mount(&full_name).await {
            Ok(MountOutcome::Mounted) => MountState::Owned,
            Ok(MountOutcome::AlreadyMounted) => MountState::Borrowed,
            Err(e) if e.is_timeout() => {
                warn!(
                    snapshot = %full_name,
                    error = %e,
                    "Snapshot mount timed out, it may have been left mounted"
                );
                MountState::TimedOut
            }
            Err(e) => {
                warn!(snapshot = %full_name, error = %e, "Unable to mount snapshot, results will be incomplete");
                MountState::Unavailable
            }
        };
        debug!(snapshot = %full_name, state = ?state, "Acquired snapshot mount");

        Self {
            tool,
            full_name: Some(full_name),
            state,
            released: false,
            lease: Some(lease),
        }
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    /// Whether this guard created the mount and will undo it.
    pub fn owns_mount(&self) -> bool {
        self.state == MountState::Owned
    }

    /// Unmount if we own the mount. Failures are logged.
    pub async fn release(mut self) {
        self.released = true;
        if !self.owns_mount() {
            return;
        }
        if let Some(name) = self.full_name.as_deref() {
            unmount_logged(self.tool.as_ref(), name).await;
        }
    }
}

impl Drop for TransientMount {
    fn drop(&mut self) {
        if self.released || !self.owns_mount() {
            return;
        }
        let Some(name) = self.full_name.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!(snapshot = %name, "Mount guard dropped early, unmounting in background");
                let tool = Arc::clone(&self.tool);
                let lease = self.lease.take();
                handle.spawn(async move {
                    unmount_logged(tool.as_ref(), &name).await;
                    drop(lease);
                });
            }
            Err(_) => warn!(snapshot = %name, "Snapshot left mounted"),
        }
    }
}

async fn unmount_logged(tool: &dyn SnapshotTool, name: &str) {
    match tool.unmount(name).await {
        Ok(()) => debug!(snapshot = %name, "Unmounted snapshot"),
        Err(e) => warn!(snapshot = %name, error = %e, "Unable to unmount snapshot"),
    }
}

/// Run `body` with `snapshot` mounted, releasing the mount afterwards.
///
/// `body` runs whatever the mount outcome.
pub async fn with_mounted_snapshot<F, Fut, T>(
    catalog: &SnapshotCatalog,
    snapshot: &SnapshotRef,
    body: F,
) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let mount = TransientMount::acquire(catalog, snapshot).await;
    let result = body().await;
    mount.release().await;
    result
}
