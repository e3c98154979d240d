//! Workers: where an `ExecutionTask` actually runs.
//!
//! A worker owns the filesystem and process table the runner lives on. The
//! controller only ever talks to it through the [`Worker`] trait:
//!
//! - `LocalWorker` runs everything in this process.
//! - `ProcessWorker` spawns a worker command (typically
//!   `ssh <agent> mobilestudio-runner worker`) per request and exchanges one
//!   JSON [`WorkerRequest`] / [`WorkerResponse`] pair over stdin/stdout.

use crate::errors::InvocationError;
use crate::results::ResultsDirectory;
use crate::task::{ExecutionReport, ExecutionTask};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Operations the dispatcher needs performed on the executing host.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Short description for logs.
    fn name(&self) -> String;

    /// Create or empty the results directory under `workspace_root`.
    async fn prepare_results_dir(&self, workspace_root: &str) -> Result<(), InvocationError>;

    /// Run the task to completion.
    async fn execute(&self, task: &ExecutionTask) -> Result<ExecutionReport, InvocationError>;

    /// Whether the runner left its results file behind.
    async fn results_file_exists(
        &self,
        workspace_root: &str,
        output_file_name: &str,
    ) -> Result<bool, InvocationError>;
}

/// One request to a worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WorkerRequest {
    PrepareResultsDir {
        workspace_root: String,
    },
    Execute {
        task: ExecutionTask,
    },
    ResultsFileExists {
        workspace_root: String,
        output_file_name: String,
    },
}

/// A worker process's answer to one [`WorkerRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerResponse {
    Prepared,
    Report { report: ExecutionReport },
    ResultsFile { exists: bool },
    Error { message: String },
}

/// Runs tasks in the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalWorker;

#[async_trait]
impl Worker for LocalWorker {
    fn name(&self) -> String {
        "local".to_string()
    }

    async fn prepare_results_dir(&self, workspace_root: &str) -> Result<(), InvocationError> {
        ResultsDirectory::for_workspace(workspace_root).prepare()
    }

    async fn execute(&self, task: &ExecutionTask) -> Result<ExecutionReport, InvocationError> {
        task.execute().await
    }

    async fn results_file_exists(
        &self,
        workspace_root: &str,
        output_file_name: &str,
    ) -> Result<bool, InvocationError> {
        Ok(ResultsDirectory::for_workspace(workspace_root).contains_result(output_file_name))
    }
}

/// Serve a single request with a local worker. Errors become
/// [`WorkerResponse::Error`] so they cross the process boundary intact.
pub async fn serve(request: WorkerRequest) -> WorkerResponse {
    let worker = LocalWorker;
    let result = match request {
        WorkerRequest::PrepareResultsDir { workspace_root } => worker
            .prepare_results_dir(&workspace_root)
            .await
            .map(|()| WorkerResponse::Prepared),
        WorkerRequest::Execute { task } => worker
            .execute(&task)
            .await
            .map(|report| WorkerResponse::Report { report }),
        WorkerRequest::ResultsFileExists {
            workspace_root,
            output_file_name,
        } => worker
            .results_file_exists(&workspace_root, &output_file_name)
            .await
            .map(|exists| WorkerResponse::ResultsFile { exists }),
    };
    result.unwrap_or_else(|e| WorkerResponse::Error {
        message: e.to_string(),
    })
}

/// Runs each request through an external worker command.
#[derive(Debug, Clone)]
pub struct ProcessWorker {
    command: Vec<String>,
}

impl ProcessWorker {
    pub fn new(command: Vec<String>) -> Result<Self, InvocationError> {
        if command.is_empty() {
            return Err(InvocationError::EmptyCommand);
        }
        Ok(Self { command })
    }

    async fn round_trip(&self, request: &WorkerRequest) -> Result<WorkerResponse, InvocationError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| InvocationError::WorkerProtocol(format!("encode request: {e}")))?;

        let (program, args) = self
            .command
            .split_first()
            .ok_or(InvocationError::EmptyCommand)?;

        debug!(worker = %self.name(), bytes = payload.len(), "Sending worker request");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| self.io_error(source))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|source| self.io_error(source))?;
            stdin
                .shutdown()
                .await
                .map_err(|source| self.io_error(source))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| self.io_error(source))?;

        if !output.status.success() {
            return Err(InvocationError::WorkerFailed {
                worker: self.name(),
                exit_code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let response: WorkerResponse = serde_json::from_slice(&output.stdout)
            .map_err(|e| InvocationError::WorkerProtocol(format!("decode response: {e}")))?;

        match response {
            WorkerResponse::Error { message } => Err(InvocationError::Remote(message)),
            other => Ok(other),
        }
    }

    fn io_error(&self, source: std::io::Error) -> InvocationError {
        InvocationError::WorkerIo {
            worker: self.name(),
            source,
        }
    }
}

fn unexpected(response: WorkerResponse) -> InvocationError {
    InvocationError::WorkerProtocol(format!("unexpected response: {response:?}"))
}

#[async_trait]
impl Worker for ProcessWorker {
    fn name(&self) -> String {
        self.command.join(" ")
    }

    async fn prepare_results_dir(&self, workspace_root: &str) -> Result<(), InvocationError> {
        let request = WorkerRequest::PrepareResultsDir {
            workspace_root: workspace_root.to_string(),
        };
        match self.round_trip(&request).await? {
            WorkerResponse::Prepared => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn execute(&self, task: &ExecutionTask) -> Result<ExecutionReport, InvocationError> {
        let request = WorkerRequest::Execute { task: task.clone() };
        match self.round_trip(&request).await? {
            WorkerResponse::Report { report } => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    async fn results_file_exists(
        &self,
        workspace_root: &str,
        output_file_name: &str,
    ) -> Result<bool, InvocationError> {
        let request = WorkerRequest::ResultsFileExists {
            workspace_root: workspace_root.to_string(),
            output_file_name: output_file_name.to_string(),
        };
        match self.round_trip(&request).await? {
            WorkerResponse::ResultsFile { exists } => Ok(exists),
            other => Err(unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::InvocationSpec;
    use tempfile::tempdir;

    #[test]
    fn request_wire_format_is_tagged() {
        let request = WorkerRequest::ResultsFileExists {
            workspace_root: "/ws".to_string(),
            output_file_name: "MobileStudioResults-1.xml".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["op"], "results_file_exists");
        assert_eq!(json["workspace_root"], "/ws");
    }

    #[test]
    fn execute_request_carries_task_without_os() {
        let task = ExecutionTask::new(
            InvocationSpec::new("/opt/runner/", "m", None, "p", "a.list", false),
            "/ws",
            "MobileStudioResults-1.xml",
        );
        let json = serde_json::to_value(WorkerRequest::Execute { task }).unwrap();
        assert_eq!(json["task"]["spec"]["test_mode"], "test_list");
        assert!(json["task"].get("os_family").is_none());
    }

    #[test]
    fn execute_request_with_contradicting_mode_does_not_decode() {
        let task = ExecutionTask::new(
            InvocationSpec::new("/opt/runner/", "m", None, "p", "suite.list", false),
            "/ws",
            "MobileStudioResults-1.xml",
        );
        let mut json = serde_json::to_value(WorkerRequest::Execute { task }).unwrap();
        json["task"]["spec"]["test_mode"] = "single_test".into();
        assert!(serde_json::from_value::<WorkerRequest>(json).is_err());
    }

    #[tokio::test]
    async fn serve_prepares_and_checks_results() {
        let ws = tempdir().unwrap();
        let root = ws.path().to_string_lossy().to_string();

        let response = serve(WorkerRequest::PrepareResultsDir {
            workspace_root: root.clone(),
        })
        .await;
        assert_eq!(response, WorkerResponse::Prepared);
        assert!(ws.path().join("MobileStudioResults").is_dir());

        let check = WorkerRequest::ResultsFileExists {
            workspace_root: root.clone(),
            output_file_name: "MobileStudioResults-3.xml".to_string(),
        };
        assert_eq!(
            serve(check.clone()).await,
            WorkerResponse::ResultsFile { exists: false }
        );

        std::fs::write(ws.path().join("MobileStudioResults/MobileStudioResults-3.xml"), "<r/>")
            .unwrap();
        assert_eq!(serve(check).await, WorkerResponse::ResultsFile { exists: true });
    }

    #[tokio::test]
    async fn serve_turns_errors_into_responses() {
        let ws = tempdir().unwrap();
        let spec = InvocationSpec::new("/opt/runner/", "m", None, "p", "a.test", false)
            .with_launcher("definitely-not-a-real-launcher-binary");
        let task = ExecutionTask::new(spec, ws.path().to_string_lossy(), "x.xml");

        match serve(WorkerRequest::Execute { task }).await {
            WorkerResponse::Error { message } => {
                assert!(message.contains("definitely-not-a-real-launcher-binary"));
            }
            other => panic!("Expected Error response, got {other:?}"),
        }
    }

    #[test]
    fn process_worker_rejects_empty_command() {
        assert!(matches!(
            ProcessWorker::new(Vec::new()),
            Err(InvocationError::EmptyCommand)
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        fn sh(script: &str) -> ProcessWorker {
            ProcessWorker::new(vec!["sh".to_string(), "-c".to_string(), script.to_string()])
                .unwrap()
        }

        #[tokio::test]
        async fn decodes_worker_response() {
            let worker = sh(r#"cat > /dev/null; echo '{"status":"results_file","exists":true}'"#);
            assert!(worker.results_file_exists("/ws", "r.xml").await.unwrap());
        }

        #[tokio::test]
        async fn worker_receives_request_on_stdin() {
            // Only answers when the payload names the expected op.
            let worker = sh(
                r#"req=$(cat); case "$req" in *prepare_results_dir*) echo '{"status":"prepared"}';; *) exit 9;; esac"#,
            );
            worker.prepare_results_dir("/ws").await.unwrap();
        }

        #[tokio::test]
        async fn non_zero_exit_surfaces_stderr() {
            let worker = sh("cat > /dev/null; echo 'agent offline' >&2; exit 4");
            let err = worker.prepare_results_dir("/ws").await.unwrap_err();
            match err {
                InvocationError::WorkerFailed {
                    exit_code, stderr, ..
                } => {
                    assert_eq!(exit_code, 4);
                    assert_eq!(stderr, "agent offline");
                }
                other => panic!("Expected WorkerFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn garbage_output_is_protocol_error() {
            let worker = sh("cat > /dev/null; echo 'hello'");
            let err = worker.results_file_exists("/ws", "r.xml").await.unwrap_err();
            assert!(matches!(err, InvocationError::WorkerProtocol(_)));
        }

        #[tokio::test]
        async fn remote_error_is_surfaced() {
            let worker =
                sh(r#"cat > /dev/null; echo '{"status":"error","message":"disk full"}'"#);
            let err = worker.prepare_results_dir("/ws").await.unwrap_err();
            match err {
                InvocationError::Remote(message) => assert_eq!(message, "disk full"),
                other => panic!("Expected Remote, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn mismatched_response_is_protocol_error() {
            let worker = sh(r#"cat > /dev/null; echo '{"status":"prepared"}'"#);
            let err = worker.results_file_exists("/ws", "r.xml").await.unwrap_err();
            assert!(matches!(err, InvocationError::WorkerProtocol(_)));
        }
    }
}
