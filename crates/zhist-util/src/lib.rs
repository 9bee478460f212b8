//! Shared utilities for zhist.
//!
//! This crate provides common utilities used across the zhist workspace:
//! - Logging setup with tracing
//! - Path utilities
//! - RAII-based timing of external tool calls

pub mod log;
pub mod path;
pub mod timing;

pub use log::{LogConfig, LogLevel};
pub use timing::TimingGuard;
