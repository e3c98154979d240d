//! Orchestrates one build step: prepare, dispatch, await, classify.
//!
//! ```text
//! Idle -> Preparing -> Dispatched -> AwaitingResult -> Classifying -> Done(outcome)
//! ```
//!
//! No transition is retried. An error at any step is returned to the caller
//! and leaves the dispatcher in the state where it happened.

use crate::classify::{self, Outcome};
use crate::errors::InvocationError;
use crate::invocation::{self, InvocationSpec, RESULTS_DIR};
use crate::listener::BuildListener;
use crate::paths::normalize;
use crate::task::{ExecutionReport, ExecutionTask};
use crate::worker::Worker;
use serde::Serialize;
use tracing::{debug, info};

/// Where a dispatch currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Preparing,
    Dispatched,
    AwaitingResult,
    Classifying,
    Done(Outcome),
}

/// Everything a finished dispatch produced.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub outcome: Outcome,
    pub output_file_name: String,
    pub result_file_present: bool,
    pub report: ExecutionReport,
}

pub struct Dispatcher {
    worker: Box<dyn Worker>,
    state: DispatchState,
}

impl Dispatcher {
    pub fn new(worker: Box<dyn Worker>) -> Self {
        Self {
            worker,
            state: DispatchState::Idle,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    fn transition(&mut self, next: DispatchState) {
        debug!(from = ?self.state, to = ?next, "Dispatch state change");
        self.state = next;
    }

    /// Run one invocation with a freshly generated results file name.
    pub async fn dispatch(
        &mut self,
        spec: &InvocationSpec,
        workspace_root: &str,
        listener: &dyn BuildListener,
    ) -> Result<DispatchResult, InvocationError> {
        let output_file_name = invocation::new_output_file_name();
        self.dispatch_with_output(spec, workspace_root, &output_file_name, listener)
            .await
    }

    /// Run one invocation writing to `output_file_name`.
    ///
    /// Any error marks the step failed through `listener` before it is
    /// returned.
    pub async fn dispatch_with_output(
        &mut self,
        spec: &InvocationSpec,
        workspace_root: &str,
        output_file_name: &str,
        listener: &dyn BuildListener,
    ) -> Result<DispatchResult, InvocationError> {
        match self
            .run(spec, workspace_root, output_file_name, listener)
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => {
                listener.error(&e.to_string());
                listener.set_outcome(Outcome::Failure);
                Err(e)
            }
        }
    }

    async fn run(
        &mut self,
        spec: &InvocationSpec,
        workspace_root: &str,
        output_file_name: &str,
        listener: &dyn BuildListener,
    ) -> Result<DispatchResult, InvocationError> {
        self.transition(DispatchState::Preparing);
        self.worker.prepare_results_dir(workspace_root).await?;

        let task = ExecutionTask::new(spec.clone(), workspace_root, output_file_name);
        self.transition(DispatchState::Dispatched);
        info!(
            worker = %self.worker.name(),
            output = %output_file_name,
            mode = %spec.test_mode(),
            "Dispatching runner task"
        );

        self.transition(DispatchState::AwaitingResult);
        let report = self.worker.execute(&task).await?;
        log_report(&report, listener);

        self.transition(DispatchState::Classifying);
        let marker_outcome = report.outcome();
        let result_file_present = self
            .worker
            .results_file_exists(workspace_root, output_file_name)
            .await?;
        if !result_file_present {
            let os = report.os_family;
            let expected = format!("{RESULTS_DIR}{}{output_file_name}", os.separator());
            listener.error(&format!(
                "Result file doesn't exist: {}",
                normalize(workspace_root, &expected, os)
            ));
        }
        let outcome = classify::with_result_file(marker_outcome, result_file_present);

        listener.set_outcome(outcome);
        self.transition(DispatchState::Done(outcome));
        info!(%outcome, result_file_present, exit_code = report.exit_code, "Dispatch finished");

        Ok(DispatchResult {
            outcome,
            output_file_name: output_file_name.to_string(),
            result_file_present,
            report,
        })
    }
}

/// Replay a report into the build log: stdout as info, stderr as errors.
fn log_report(report: &ExecutionReport, listener: &dyn BuildListener) {
    listener.info(&format!("Running OS: {}", report.os_family));
    listener.info("Command:");
    listener.info(&report.command_line);
    listener.info("Command output:");
    for line in &report.stdout_lines {
        listener.info(line);
    }
    listener.info("STD Error output (if any):");
    for line in &report.stderr_lines {
        listener.error(line);
    }
    listener.info(&format!("Command exit code: {}", report.exit_code));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::MemoryListener;
    use crate::platform::OsFamily;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Worker that replays a canned report and records the calls it saw.
    struct ScriptedWorker {
        stdout: Vec<String>,
        writes_result: bool,
        fail_execute: bool,
        calls: std::sync::Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedWorker {
        fn new(stdout: &[&str], writes_result: bool) -> Self {
            Self {
                stdout: stdout.iter().map(|s| s.to_string()).collect(),
                writes_result,
                fail_execute: false,
                calls: Default::default(),
            }
        }
    }

    #[async_trait]
    impl Worker for ScriptedWorker {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        async fn prepare_results_dir(&self, _workspace_root: &str) -> Result<(), InvocationError> {
            self.calls.lock().unwrap().push("prepare".into());
            Ok(())
        }

        async fn execute(&self, task: &ExecutionTask) -> Result<ExecutionReport, InvocationError> {
            self.calls.lock().unwrap().push(format!("execute {}", task.output_file_name));
            if self.fail_execute {
                return Err(InvocationError::Remote("agent lost".into()));
            }
            Ok(ExecutionReport {
                os_family: OsFamily::Posix,
                command_line: "mono \"/opt/runner/TelerikMobileTestingRunner.exe\"".into(),
                stdout_lines: self.stdout.clone(),
                stderr_lines: vec!["device warning".into()],
                exit_code: 0,
            })
        }

        async fn results_file_exists(
            &self,
            _workspace_root: &str,
            output_file_name: &str,
        ) -> Result<bool, InvocationError> {
            self.calls.lock().unwrap().push(format!("check {output_file_name}"));
            Ok(self.writes_result)
        }
    }

    fn spec() -> InvocationSpec {
        InvocationSpec::new("/opt/runner/", "tcp://host:80", None, "proj", "tests/a.test", false)
    }

    #[tokio::test]
    async fn success_when_marker_and_file_present() {
        let worker = ScriptedWorker::new(&["Build finished > Step 4 passed"], true);
        let calls = worker.calls.clone();
        let mut dispatcher = Dispatcher::new(Box::new(worker));
        let listener = MemoryListener::new();
        assert_eq!(dispatcher.state(), DispatchState::Idle);

        let result = dispatcher
            .dispatch_with_output(&spec(), "/ws", "MobileStudioResults-1000.xml", &listener)
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Success);
        assert!(result.result_file_present);
        assert_eq!(listener.outcome(), Some(Outcome::Success));
        assert_eq!(dispatcher.state(), DispatchState::Done(Outcome::Success));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                "prepare",
                "execute MobileStudioResults-1000.xml",
                "check MobileStudioResults-1000.xml"
            ]
        );
    }

    #[tokio::test]
    async fn missing_result_file_overrides_marker() {
        let worker = ScriptedWorker::new(&["Build finished > Step 4 passed"], false);
        let mut dispatcher = Dispatcher::new(Box::new(worker));
        let listener = MemoryListener::new();

        let result = dispatcher
            .dispatch_with_output(&spec(), "/ws", "MobileStudioResults-1000.xml", &listener)
            .await
            .unwrap();

        assert_eq!(result.outcome, Outcome::Failure);
        assert_eq!(listener.outcome(), Some(Outcome::Failure));
        assert!(listener.error_lines().contains(
            &"Result file doesn't exist: /ws/MobileStudioResults/MobileStudioResults-1000.xml"
                .to_string()
        ));
    }

    #[tokio::test]
    async fn no_marker_is_failure() {
        let worker = ScriptedWorker::new(&["Could not reach device"], true);
        let mut dispatcher = Dispatcher::new(Box::new(worker));
        let listener = MemoryListener::new();

        let result = dispatcher.dispatch(&spec(), "/ws", &listener).await.unwrap();
        assert_eq!(result.outcome, Outcome::Failure);
        assert_eq!(dispatcher.state(), DispatchState::Done(Outcome::Failure));
        assert!(result.output_file_name.starts_with("MobileStudioResults-"));
    }

    #[tokio::test]
    async fn output_and_errors_reach_build_log() {
        let worker = ScriptedWorker::new(&["step one", "> Step 2"], true);
        let mut dispatcher = Dispatcher::new(Box::new(worker));
        let listener = MemoryListener::new();

        dispatcher
            .dispatch_with_output(&spec(), "/ws", "r.xml", &listener)
            .await
            .unwrap();

        assert_eq!(
            listener.info_lines(),
            vec![
                "Running OS: POSIX",
                "Command:",
                "mono \"/opt/runner/TelerikMobileTestingRunner.exe\"",
                "Command output:",
                "step one",
                "> Step 2",
                "STD Error output (if any):",
                "Command exit code: 0",
            ]
        );
        assert_eq!(listener.error_lines(), vec!["device warning"]);
    }

    #[tokio::test]
    async fn worker_error_is_fatal_and_surfaced() {
        let mut worker = ScriptedWorker::new(&[], true);
        worker.fail_execute = true;
        let calls = worker.calls.clone();
        let mut dispatcher = Dispatcher::new(Box::new(worker));
        let listener = MemoryListener::new();

        let err = dispatcher
            .dispatch_with_output(&spec(), "/ws", "r.xml", &listener)
            .await
            .unwrap_err();

        assert!(matches!(err, InvocationError::Remote(_)));
        assert_eq!(dispatcher.state(), DispatchState::AwaitingResult);
        assert_eq!(listener.outcome(), Some(Outcome::Failure));
        assert!(listener.error_lines()[0].contains("agent lost"));
        // Never classified.
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[cfg(unix)]
    mod end_to_end {
        use super::*;
        use crate::task::test_support::{TOUCH_OUTPUT, fake_runner};
        use crate::worker::LocalWorker;
        use tempfile::tempdir;

        fn local_spec(runner_dir: &std::path::Path) -> InvocationSpec {
            InvocationSpec::new(
                format!("{}/", runner_dir.display()),
                "tcp://host:80",
                None,
                "proj",
                "tests/a.test",
                true,
            )
            .with_launcher("sh")
        }

        #[tokio::test]
        async fn local_run_succeeds_and_clears_stale_results() {
            let runner_dir = tempdir().unwrap();
            let ws = tempdir().unwrap();
            let stale = ws.path().join("MobileStudioResults/MobileStudioResults-1.xml");
            std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
            std::fs::write(&stale, "<old/>").unwrap();
            fake_runner(
                runner_dir.path(),
                &format!("{TOUCH_OUTPUT}echo 'Build finished > Step 4 passed'\n"),
            );

            let mut dispatcher = Dispatcher::new(Box::new(LocalWorker));
            let listener = MemoryListener::new();
            let result = dispatcher
                .dispatch(&local_spec(runner_dir.path()), &ws.path().to_string_lossy(), &listener)
                .await
                .unwrap();

            assert_eq!(result.outcome, Outcome::Success);
            assert!(!stale.exists());
            assert!(
                ws.path()
                    .join("MobileStudioResults")
                    .join(&result.output_file_name)
                    .is_file()
            );
        }

        #[tokio::test]
        async fn local_run_without_results_file_fails() {
            let runner_dir = tempdir().unwrap();
            let ws = tempdir().unwrap();
            fake_runner(runner_dir.path(), "echo '> Step 1'\n");

            let mut dispatcher = Dispatcher::new(Box::new(LocalWorker));
            let listener = MemoryListener::new();
            let result = dispatcher
                .dispatch(&local_spec(runner_dir.path()), &ws.path().to_string_lossy(), &listener)
                .await
                .unwrap();

            assert_eq!(result.outcome, Outcome::Failure);
            assert!(!result.result_file_present);
        }
    }
}
