//! Workspace-relative path resolution.
//!
//! Pure string manipulation: nothing here touches the filesystem, so a
//! controller can resolve paths for a worker running a different OS.

use crate::platform::OsFamily;
use regex::Regex;
use std::sync::LazyLock;

static DRIVE_ABSOLUTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\\/]:\\").unwrap());

/// Resolve `path` against `workspace_root` using the conventions of `os`.
///
/// - POSIX: a path starting with `/` is returned unchanged, anything else is
///   joined to the workspace root.
/// - Windows: a drive-absolute path (`C:\...`) is kept, a path starting with
///   `\` is appended to the workspace root, anything else is joined with `\`.
///   One trailing `\` is then stripped.
pub fn normalize(workspace_root: &str, path: &str, os: OsFamily) -> String {
    let sep = os.separator();
    match os {
        OsFamily::Posix => {
            if path.starts_with(sep) {
                path.to_string()
            } else {
                format!("{workspace_root}{sep}{path}")
            }
        }
        OsFamily::Windows => {
            let mut result = if DRIVE_ABSOLUTE_REGEX.is_match(path) {
                path.to_string()
            } else if path.starts_with(sep) {
                format!("{workspace_root}{path}")
            } else {
                format!("{workspace_root}{sep}{path}")
            };
            if result.ends_with(sep) {
                result.pop();
            }
            result
        }
    }
}
