//! Path utilities.
//!
//! This module provides utilities for working with file paths.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

/// Get the zhist configuration directory.
///
/// This follows XDG conventions on Linux/macOS:
/// - `$XDG_CONFIG_HOME/zhist` if set
/// - `~/.config/zhist` otherwise
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("zhist"))
}

/// Get the path of the global configuration file.
pub fn global_config_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.json"))
}

/// Make a path relative to a base directory.
///
/// Returns `None` if the path is not within the base directory. The result
/// never carries a leading separator; `base` itself maps to an empty path.
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Join `relative` onto `base`, leaving `base` untouched when `relative` is empty.
///
/// `Path::join("")` appends a trailing separator, which is noise in
/// diagnostics and reports.
pub fn join_relative(base: &Path, relative: &Path) -> PathBuf {
    if relative.as_os_str().is_empty() {
        base.to_path_buf()
    } else {
        base.join(relative)
    }
}

/// Render a directory path with exactly one trailing separator.
pub fn with_trailing_separator(path: &Path) -> String {
    let mut s = path.display().to_string();
    if !s.ends_with(MAIN_SEPARATOR) {
        s.push(MAIN_SEPARATOR);
    }
    s
}
