//! Build-step configuration.
//!
//! Settings are layered the same way for every command:
//! `mobilestudio.toml` in the workspace, then environment variables, then
//! command-line flags.
//!
//! ```toml
//! [runner]
//! path = "/opt/telerik/runner/"
//! msg_server = "tcp://10.0.0.5:8080"
//! device_id = "emulator-5554"
//! launcher = "mono"
//!
//! [test]
//! project_root = "MobileTests"
//! test_path = "tests/smoke.list"
//! test_as_unit = true
//!
//! [worker]
//! command = ["ssh", "mac-agent-1", "mobilestudio-runner", "worker"]
//!
//! [output]
//! report_json = "runner-report.json"
//! ```

use crate::invocation::{DEFAULT_LAUNCHER, InvocationSpec};
use crate::worker::{LocalWorker, ProcessWorker, Worker};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = "mobilestudio.toml";

pub const ENV_RUNNER_PATH: &str = "MOBILESTUDIO_RUNNER_PATH";
pub const ENV_MSG_SERVER: &str = "MOBILESTUDIO_MSG_SERVER";
pub const ENV_DEVICE_ID: &str = "MOBILESTUDIO_DEVICE_ID";
pub const ENV_WORKER: &str = "MOBILESTUDIO_WORKER";

/// Runner installation and connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerSection {
    /// Runner installation directory or executable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Message server connection string, passed through verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_server: Option<String>,
    /// Target device; omitted from the command line when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Managed-runtime launcher used on POSIX hosts
    #[serde(default = "default_launcher")]
    pub launcher: String,
}

fn default_launcher() -> String {
    DEFAULT_LAUNCHER.to_string()
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            path: None,
            msg_server: None,
            device_id: None,
            launcher: default_launcher(),
        }
    }
}

/// What to test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSection {
    /// Test project directory, relative to the workspace unless absolute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<String>,
    /// Single `.test` file or `.list` file, relative to the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_path: Option<String>,
    /// Report results as unit tests (`/resultType=1`)
    #[serde(default)]
    pub test_as_unit: bool,
}

/// Where the runner executes. Empty command means in-process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerSection {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
}

/// Extra artifacts written by the controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSection {
    /// Write the execution report as JSON to this path (relative to the workspace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_json: Option<PathBuf>,
}

/// Contents of `mobilestudio.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerToml {
    #[serde(default)]
    pub runner: RunnerSection,
    #[serde(default)]
    pub test: TestSection,
    #[serde(default)]
    pub worker: WorkerSection,
    #[serde(default)]
    pub output: OutputSection,
}

/// Values given on the command line. `None` leaves the lower layer alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub runner_path: Option<String>,
    pub msg_server: Option<String>,
    pub device_id: Option<String>,
    pub project_root: Option<String>,
    pub test_path: Option<String>,
    pub test_as_unit: Option<bool>,
    pub worker: Option<String>,
    pub report_json: Option<PathBuf>,
}

impl RunnerToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse mobilestudio.toml")
    }

    /// Load `path` if given (it must exist), otherwise `mobilestudio.toml` in
    /// the workspace if present, otherwise defaults.
    pub fn load_for_workspace(workspace: &Path, path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = workspace.join(CONFIG_FILE_NAME);
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize mobilestudio.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply environment overrides using `lookup` (normally `std::env::var`).
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_RUNNER_PATH) {
            self.runner.path = Some(path);
        }
        if let Some(server) = lookup(ENV_MSG_SERVER) {
            self.runner.msg_server = Some(server);
        }
        if let Some(device) = lookup(ENV_DEVICE_ID) {
            self.runner.device_id = Some(device);
        }
        if let Some(worker) = lookup(ENV_WORKER) {
            self.worker.command = split_worker_command(&worker);
        }
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(ref path) = overrides.runner_path {
            self.runner.path = Some(path.clone());
        }
        if let Some(ref server) = overrides.msg_server {
            self.runner.msg_server = Some(server.clone());
        }
        if let Some(ref device) = overrides.device_id {
            self.runner.device_id = Some(device.clone());
        }
        if let Some(ref root) = overrides.project_root {
            self.test.project_root = Some(root.clone());
        }
        if let Some(ref test_path) = overrides.test_path {
            self.test.test_path = Some(test_path.clone());
        }
        if let Some(as_unit) = overrides.test_as_unit {
            self.test.test_as_unit = as_unit;
        }
        if let Some(ref worker) = overrides.worker {
            self.worker.command = split_worker_command(worker);
        }
        if let Some(ref report) = overrides.report_json {
            self.output.report_json = Some(report.clone());
        }
    }

    /// Build the invocation spec. Missing required values are errors.
    pub fn to_invocation_spec(&self) -> Result<InvocationSpec> {
        let runner_path = required(&self.runner.path, "runner.path", ENV_RUNNER_PATH)?;
        let msg_server = required(&self.runner.msg_server, "runner.msg_server", ENV_MSG_SERVER)?;
        let project_root = self
            .test
            .project_root
            .clone()
            .filter(|root| !root.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let Some(test_path) = self.test.test_path.clone().filter(|p| !p.is_empty()) else {
            bail!("Missing required setting test.test_path (set it in mobilestudio.toml or pass --test-path)");
        };

        Ok(InvocationSpec::new(
            runner_path,
            msg_server,
            self.runner.device_id.clone(),
            project_root,
            test_path,
            self.test.test_as_unit,
        )
        .with_launcher(self.runner.launcher.clone()))
    }

    /// Whether tasks run in this process.
    pub fn is_local(&self) -> bool {
        self.worker.command.is_empty()
    }

    /// The configured worker.
    pub fn worker(&self) -> Result<Box<dyn Worker>> {
        if self.is_local() {
            Ok(Box::new(LocalWorker))
        } else {
            let worker = ProcessWorker::new(self.worker.command.clone())
                .context("Invalid worker command")?;
            Ok(Box::new(worker))
        }
    }

    /// Where to write the JSON report, resolved against the workspace.
    pub fn report_json_path(&self, workspace: &Path) -> Option<PathBuf> {
        self.output
            .report_json
            .as_ref()
            .map(|path| workspace.join(path))
    }
}

fn required(value: &Option<String>, key: &str, env: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v.clone()),
        _ => bail!(
            "Missing required setting {} (set it in mobilestudio.toml, {} or on the command line)",
            key,
            env
        ),
    }
}

/// Split a worker command given as one string.
pub fn split_worker_command(command: &str) -> Vec<String> {
    crate::command::split_command_line(command)
}
