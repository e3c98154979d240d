//! Results directory management.
//!
//! Every run starts from an empty `MobileStudioResults` directory so a stale
//! XML file from an earlier run can never be mistaken for this run's output.

use crate::errors::InvocationError;
use crate::invocation::RESULTS_DIR;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The results directory of one workspace.
#[derive(Debug, Clone)]
pub struct ResultsDirectory {
    path: PathBuf,
}

impl ResultsDirectory {
    pub fn for_workspace(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            path: workspace_root.as_ref().join(RESULTS_DIR),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the directory, or empty it if it already exists.
    ///
    /// Only direct children are enumerated; a child directory is removed as a
    /// whole entry.
    pub fn prepare(&self) -> Result<(), InvocationError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Creating results directory");
            return self.create();
        }

        let entries = std::fs::read_dir(&self.path).map_err(|e| self.io_error(e))?;
        for entry in entries {
            let entry = entry.map_err(|e| self.io_error(e))?;
            let entry_path = entry.path();
            let file_type = entry.file_type().map_err(|e| self.io_error(e))?;
            let removed = if file_type.is_dir() {
                std::fs::remove_dir_all(&entry_path)
            } else {
                std::fs::remove_file(&entry_path)
            };
            removed.map_err(|source| InvocationError::ResultsDir {
                path: entry_path.clone(),
                source,
            })?;
            debug!(path = %entry_path.display(), "Removed stale result entry");
        }

        if !self.path.exists() {
            self.create()?;
        }
        Ok(())
    }

    /// Path of a results file inside this directory.
    pub fn result_file(&self, output_file_name: &str) -> PathBuf {
        self.path.join(output_file_name)
    }

    /// Whether the named results file exists as a regular file.
    pub fn contains_result(&self, output_file_name: &str) -> bool {
        self.result_file(output_file_name).is_file()
    }

    fn create(&self) -> Result<(), InvocationError> {
        std::fs::create_dir_all(&self.path).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> InvocationError {
        InvocationError::ResultsDir {
            path: self.path.clone(),
            source,
        }
    }
}
