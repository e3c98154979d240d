//! The unit of work shipped to a worker: build the command, run the runner,
//! capture everything it prints.

use crate::classify::{self, Outcome};
use crate::command;
use crate::errors::InvocationError;
use crate::invocation::InvocationSpec;
use crate::platform::{ExecutionEnvironment, OsFamily};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// A runner invocation ready to be executed on a worker.
///
/// Carries no OS information: the executing host detects its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTask {
    pub spec: InvocationSpec,
    pub workspace_root: String,
    pub output_file_name: String,
}

/// Everything observed while running the runner once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub os_family: OsFamily,
    pub command_line: String,
    pub stdout_lines: Vec<String>,
    pub stderr_lines: Vec<String>,
    pub exit_code: i32,
}

impl ExecutionReport {
    /// Captured stdout joined with newlines.
    pub fn stdout_text(&self) -> String {
        self.stdout_lines.join("\n")
    }

    /// Outcome according to the runner's output alone.
    pub fn outcome(&self) -> Outcome {
        classify::classify(self)
    }
}

impl ExecutionTask {
    pub fn new(
        spec: InvocationSpec,
        workspace_root: impl Into<String>,
        output_file_name: impl Into<String>,
    ) -> Self {
        Self {
            spec,
            workspace_root: workspace_root.into(),
            output_file_name: output_file_name.into(),
        }
    }

    /// Run on the current host, using its OS conventions.
    pub async fn execute(&self) -> Result<ExecutionReport, InvocationError> {
        let env = ExecutionEnvironment::detect(self.workspace_root.clone());
        self.execute_in(&env).await
    }

    /// Run with an explicit environment.
    ///
    /// Blocks until the runner exits and both output streams are drained. The
    /// streams are read concurrently so a runner that fills its stderr pipe
    /// cannot stall on a stdout reader.
    pub async fn execute_in(
        &self,
        env: &ExecutionEnvironment,
    ) -> Result<ExecutionReport, InvocationError> {
        let command_line = command::build(&self.spec, env, &self.output_file_name);
        let argv = command::split_command_line(&command_line);
        let (program, args) = argv.split_first().ok_or(InvocationError::EmptyCommand)?;

        info!(os = %env.os_family, command = %command_line, "Starting runner");

        let mut child = Command::new(program)
            .args(args)
            .current_dir(&env.workspace_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvocationError::SpawnFailed {
                program: program.clone(),
                source,
            })?;

        debug!(pid = child.id().unwrap_or(0), "Runner spawned");

        let stdout = child
            .stdout
            .take()
            .ok_or(InvocationError::StreamUnavailable("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(InvocationError::StreamUnavailable("stderr"))?;

        let (stdout_lines, stderr_lines) =
            tokio::try_join!(collect_lines(stdout, "stdout"), collect_lines(stderr, "stderr"))?;

        let status = child.wait().await.map_err(InvocationError::WaitFailed)?;
        let exit_code = status.code().unwrap_or(-1);

        info!(
            exit_code,
            stdout_lines = stdout_lines.len(),
            stderr_lines = stderr_lines.len(),
            "Runner finished"
        );

        Ok(ExecutionReport {
            os_family: env.os_family,
            command_line,
            stdout_lines,
            stderr_lines,
            exit_code,
        })
    }
}

/// Read a stream to EOF, one entry per line, tolerating invalid UTF-8.
async fn collect_lines<R>(reader: R, stream: &'static str) -> Result<Vec<String>, InvocationError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|source| InvocationError::StreamRead { stream, source })?;
        if read == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        lines.push(line.trim_end_matches(['\n', '\r']).to_string());
    }
    Ok(lines)
}

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};

    /// Write an executable fake runner named like the real one into `dir`.
    pub fn fake_runner(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(crate::invocation::RUNNER_BINARY);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    /// Shell snippet that creates the file named by the `/output=` flag.
    pub const TOUCH_OUTPUT: &str = r#"for arg in "$@"; do
  case "$arg" in
    /output=*) touch "${arg#/output=}" ;;
  esac
done
"#;
}
