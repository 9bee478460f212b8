//! Configuration for history lookups.
//!
//! Loading order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Global config file `~/.config/zhist/config.json`
//! 3. An explicit config file (`--config`)
//! 4. Environment overrides: `ZHIST_ZFS_BINARY`, `ZHIST_TIMEOUT_SECS`, `ZHIST_HISTORY_DIR`
//!
//! Command-line flags are applied on top by the binary.

use crate::{HistoryError, HistoryResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Reserved snapshot directory relative to a mount boundary.
pub const DEFAULT_HISTORY_DIR: &str = ".zfs/snapshot";

/// Settings for resolving, mounting and reading snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Snapshot history directory, relative to each mount boundary.
    pub history_dir: PathBuf,

    /// Snapshot management binary.
    pub zfs_binary: String,

    /// Upper bound for a single external tool call, in seconds.
    pub command_timeout_secs: u64,

    /// Mount each snapshot around its stat. Disable on platforms that
    /// automount `.zfs/snapshot/*` on access.
    pub mount_snapshots: bool,

    /// Number of target paths processed concurrently.
    pub jobs: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            history_dir: PathBuf::from(DEFAULT_HISTORY_DIR),
            zfs_binary: "zfs".to_string(),
            command_timeout_secs: 30,
            mount_snapshots: true,
            jobs: 1,
        }
    }
}

impl HistoryConfig {
    /// Bound applied to each external tool call.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Load configuration from the global file and an optional explicit file,
    /// then apply environment overrides.
    ///
    /// Returns the config and the files that contributed to it.
    pub async fn load(explicit: Option<&Path>) -> HistoryResult<(Self, Vec<PathBuf>)> {
        let global = zhist_util::path::global_config_file();
        let (mut config, sources) = Self::load_layers(global.as_deref(), explicit).await?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok((config, sources))
    }

    /// Layer the given files over the defaults. A missing global file is
    /// skipped; a missing explicit file is an error.
    pub async fn load_layers(
        global: Option<&Path>,
        explicit: Option<&Path>,
    ) -> HistoryResult<(Self, Vec<PathBuf>)> {
        let mut merged = serde_json::to_value(Self::default())?;
        let mut sources = Vec::new();

        if let Some(path) = global {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                merge_json(&mut merged, Self::read_value(path).await?);
                sources.push(path.to_path_buf());
            }
        }

        if let Some(path) = explicit {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(HistoryError::config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            merge_json(&mut merged, Self::read_value(path).await?);
            sources.push(path.to_path_buf());
        }

        let config: Self = serde_json::from_value(merged)
            .map_err(|e| HistoryError::config(format!("invalid config: {e}")))?;
        debug!(sources = ?sources, "Loaded configuration");
        Ok((config, sources))
    }

    async fn read_value(path: &Path) -> HistoryResult<Value> {
        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content)
            .map_err(|e| HistoryError::config(format!("invalid config at {}: {e}", path.display())))
    }

    /// Apply `ZHIST_*` environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> HistoryResult<()> {
        if let Some(binary) = lookup("ZHIST_ZFS_BINARY") {
            self.zfs_binary = binary;
        }
        if let Some(secs) = lookup("ZHIST_TIMEOUT_SECS") {
            self.command_timeout_secs = secs.trim().parse().map_err(|_| {
                HistoryError::config(format!("ZHIST_TIMEOUT_SECS is not a number: {secs}"))
            })?;
        }
        if let Some(dir) = lookup("ZHIST_HISTORY_DIR") {
            self.history_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// Reject values the rest of the system can't work with.
    pub fn validate(&self) -> HistoryResult<()> {
        if self.history_dir.as_os_str().is_empty() || self.history_dir.is_absolute() {
            return Err(HistoryError::config(format!(
                "history_dir must be a non-empty relative path, got {:?}",
                self.history_dir
            )));
        }
        if self.zfs_binary.trim().is_empty() {
            return Err(HistoryError::config("zfs_binary must not be empty"));
        }
        if self.command_timeout_secs == 0 {
            return Err(HistoryError::config("command_timeout_secs must be at least 1"));
        }
        if self.jobs == 0 {
            return Err(HistoryError::config("jobs must be at least 1"));
        }
        Ok(())
    }
}

/// Recursively overlay `overlay` onto `base`. Objects merge key by key,
/// anything else replaces.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                merge_json(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, overlay) => *base = overlay,
    }
}
