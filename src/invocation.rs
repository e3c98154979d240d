//! The immutable description of one runner invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File name of the runner assembly inside its installation directory.
pub const RUNNER_BINARY: &str = "TelerikMobileTestingRunner.exe";

/// Extension of a single test file.
pub const TEST_EXTENSION: &str = ".test";

/// Extension of a test-list file.
pub const LIST_EXTENSION: &str = ".list";

/// Results subdirectory under the workspace root.
pub const RESULTS_DIR: &str = "MobileStudioResults";

/// Environment variable the CI host uses to publish the workspace root.
pub const WORKSPACE_ENV: &str = "WORKSPACE";

/// Managed-runtime launcher used on hosts where the runner is not native.
pub const DEFAULT_LAUNCHER: &str = "mono";

/// Whether the runner gets a single test or a list of tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    SingleTest,
    TestList,
}

impl TestMode {
    /// Derive the mode from a test path's suffix.
    pub fn from_test_path(test_path: &str) -> Self {
        if test_path.ends_with(LIST_EXTENSION) {
            TestMode::TestList
        } else {
            TestMode::SingleTest
        }
    }

    /// Name of the runner flag for this mode.
    pub fn flag(self) -> &'static str {
        match self {
            TestMode::SingleTest => "test",
            TestMode::TestList => "list",
        }
    }
}

impl std::fmt::Display for TestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.flag())
    }
}

/// One test-run request.
///
/// Built once per build step. `test_mode` is computed from `test_path` in
/// [`InvocationSpec::new`] and travels with the spec from then on; it is
/// never recomputed on the worker. Deserializing rejects a `test_mode` that
/// disagrees with the `test_path` suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInvocationSpec")]
pub struct InvocationSpec {
    runner_path: String,
    message_server: String,
    device_id: Option<String>,
    project_root: String,
    test_path: String,
    test_mode: TestMode,
    test_as_unit: bool,
    launcher: String,
}

/// Wire form of [`InvocationSpec`], checked before it becomes one.
#[derive(Deserialize)]
struct RawInvocationSpec {
    runner_path: String,
    message_server: String,
    device_id: Option<String>,
    project_root: String,
    test_path: String,
    test_mode: TestMode,
    test_as_unit: bool,
    launcher: String,
}

impl TryFrom<RawInvocationSpec> for InvocationSpec {
    type Error = String;

    fn try_from(raw: RawInvocationSpec) -> Result<Self, Self::Error> {
        let expected = TestMode::from_test_path(&raw.test_path);
        if raw.test_mode != expected {
            return Err(format!(
                "test_mode '{}' does not match test path '{}' (expected '{}')",
                raw.test_mode, raw.test_path, expected
            ));
        }
        Ok(InvocationSpec::new(
            raw.runner_path,
            raw.message_server,
            raw.device_id,
            raw.project_root,
            raw.test_path,
            raw.test_as_unit,
        )
        .with_launcher(raw.launcher))
    }
}

impl InvocationSpec {
    pub fn new(
        runner_path: impl Into<String>,
        message_server: impl Into<String>,
        device_id: Option<String>,
        project_root: impl Into<String>,
        test_path: impl Into<String>,
        test_as_unit: bool,
    ) -> Self {
        let test_path = test_path.into();
        let test_mode = TestMode::from_test_path(&test_path);
        Self {
            runner_path: runner_path.into(),
            message_server: message_server.into(),
            device_id: device_id.filter(|id| !id.is_empty()),
            project_root: project_root.into(),
            test_path,
            test_mode,
            test_as_unit,
            launcher: DEFAULT_LAUNCHER.to_string(),
        }
    }

    /// Replace the managed-runtime launcher (only used on POSIX hosts).
    pub fn with_launcher(mut self, launcher: impl Into<String>) -> Self {
        self.launcher = launcher.into();
        self
    }

    pub fn runner_path(&self) -> &str {
        &self.runner_path
    }

    pub fn message_server(&self) -> &str {
        &self.message_server
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn project_root(&self) -> &str {
        &self.project_root
    }

    pub fn test_path(&self) -> &str {
        &self.test_path
    }

    pub fn test_mode(&self) -> TestMode {
        self.test_mode
    }

    pub fn test_as_unit(&self) -> bool {
        self.test_as_unit
    }

    pub fn launcher(&self) -> &str {
        &self.launcher
    }

    /// Runner result-type code: 1 for unit-test style results, 2 otherwise.
    pub fn result_type(&self) -> u8 {
        if self.test_as_unit { 1 } else { 2 }
    }
}

/// Name of the runner's XML results file for a run started at `now`.
pub fn output_file_name(now: DateTime<Utc>) -> String {
    format!("MobileStudioResults-{}.xml", now.timestamp_millis())
}

/// Fresh results file name for a run starting now.
pub fn new_output_file_name() -> String {
    output_file_name(Utc::now())
}
