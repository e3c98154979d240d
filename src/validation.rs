//! Pre-dispatch configuration checks.
//!
//! These run on the controller before anything is dispatched. The invocation
//! engine itself never re-validates its inputs.

use crate::invocation::{InvocationSpec, LIST_EXTENSION, TEST_EXTENSION};
use crate::paths::normalize;
use crate::platform::OsFamily;
use std::path::Path;

/// Errors block the run; warnings are only reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check an invocation before dispatch.
///
/// With `check_filesystem` the runner and test paths must exist on this host;
/// turn it off when the runner lives on a remote worker.
pub fn validate(spec: &InvocationSpec, workspace_root: &str, check_filesystem: bool) -> ValidationReport {
    let mut report = ValidationReport::default();

    if spec.runner_path().is_empty() {
        report.errors.push("Runner path is required".to_string());
    } else if check_filesystem && !Path::new(spec.runner_path()).exists() {
        report
            .errors
            .push(format!("Runner path not found: {}", spec.runner_path()));
    }

    let test_path = spec.test_path();
    if test_path.is_empty() {
        report.errors.push("Test path is required".to_string());
    } else {
        if !test_path.ends_with(TEST_EXTENSION) && !test_path.ends_with(LIST_EXTENSION) {
            report.errors.push(format!(
                "Test path must end with {TEST_EXTENSION} or {LIST_EXTENSION}: {test_path}"
            ));
        }
        if check_filesystem {
            let os = OsFamily::current();
            let project = normalize(workspace_root, spec.project_root(), os);
            let resolved = normalize(&project, test_path, os);
            if !Path::new(&resolved).exists() {
                report.errors.push(format!("Test path not found: {resolved}"));
            }
        }
    }

    if spec.message_server().is_empty() {
        report.errors.push("Message server is required".to_string());
    }

    if spec.device_id().is_none() {
        report
            .warnings
            .push("No device id set; the runner will pick a device".to_string());
    }

    report
}
