//! Host platform detection.
//!
//! The OS family must always be read on the host that spawns the runner, so
//! `ExecutionEnvironment::detect` is only called from inside an executing task.

use serde::{Deserialize, Serialize};

/// Operating-system family, as far as path and launcher conventions care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Windows,
    Posix,
}

impl OsFamily {
    /// OS family of the current process.
    pub fn current() -> Self {
        if cfg!(windows) {
            OsFamily::Windows
        } else {
            OsFamily::Posix
        }
    }

    pub fn separator(self) -> char {
        match self {
            OsFamily::Windows => '\\',
            OsFamily::Posix => '/',
        }
    }
}

impl std::fmt::Display for OsFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsFamily::Windows => write!(f, "Windows"),
            OsFamily::Posix => write!(f, "POSIX"),
        }
    }
}

/// Workspace root plus the OS conventions of the host that will run the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEnvironment {
    pub workspace_root: String,
    pub os_family: OsFamily,
}

impl ExecutionEnvironment {
    pub fn new(workspace_root: impl Into<String>, os_family: OsFamily) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            os_family,
        }
    }

    /// Snapshot the environment of the current process.
    pub fn detect(workspace_root: impl Into<String>) -> Self {
        Self::new(workspace_root, OsFamily::current())
    }
}
