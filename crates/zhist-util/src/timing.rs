//! RAII-based timing utilities for measuring and logging operation durations.
//!
//! # Example
//!
//! ```rust,ignore
//! use zhist_util::timing::TimingGuard;
//!
//! async fn query_creation(snapshot: &str) {
//!     let _timing = TimingGuard::external("zfs get creation", snapshot);
//!     // ... subprocess call ...
//!     // Duration is logged when _timing is dropped
//! }
//! ```

use std::time::Instant;
use tracing::{debug, warn};

/// RAII guard that measures and logs the duration of an operation.
///
/// When dropped, logs the elapsed time since creation. External tool calls
/// run once per snapshot, so anything slower than the warn threshold is
/// worth surfacing.
pub struct TimingGuard {
    /// Type of operation (e.g., "external", "timeline")
    operation_type: &'static str,
    /// Name of the specific operation (e.g., "zfs mount")
    operation_name: String,
    /// Subject of the operation (a snapshot, a path)
    subject: String,
    /// When the operation started
    start: Instant,
    /// Minimum duration to log at warn level (for slow operations)
    warn_threshold_ms: u64,
}

impl TimingGuard {
    /// Create a new timing guard.
    pub fn new(
        operation_type: &'static str,
        operation_name: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            operation_type,
            operation_name: operation_name.into(),
            subject: subject.into(),
            start: Instant::now(),
            warn_threshold_ms: 5000,
        }
    }

    /// Create a timing guard for an external tool call.
    pub fn external(operation_name: impl Into<String>, subject: impl Into<String>) -> Self {
        Self::new("external", operation_name, subject)
    }

    /// Set the threshold for warn-level logging (in milliseconds).
    pub fn with_warn_threshold(mut self, ms: u64) -> Self {
        self.warn_threshold_ms = ms;
        self
    }

    /// Get the elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let duration_ms = self.elapsed_ms();

        if duration_ms >= self.warn_threshold_ms as u128 {
            warn!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                subject = %self.subject,
                duration_ms = duration_ms as u64,
                "Slow operation completed"
            );
        } else {
            debug!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                subject = %self.subject,
                duration_ms = duration_ms as u64,
                "Operation completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_timing_guard_basic() {
        let guard = TimingGuard::new("test", "basic", "subject");
        sleep(Duration::from_millis(10));
        assert!(guard.elapsed_ms() >= 10);
        drop(guard);
    }

    #[test]
    fn test_timing_guard_external() {
        let guard = TimingGuard::external("zfs list", "/tank").with_warn_threshold(1);
        sleep(Duration::from_millis(5));
        assert!(guard.elapsed_ms() >= 5);
    }
}
