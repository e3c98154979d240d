//! Running the build step (`mobilestudio-runner run`, `command`, `prepare`).

use anyhow::{Context, Result, bail};
use mobilestudio_runner::classify::Outcome;
use mobilestudio_runner::command;
use mobilestudio_runner::dispatcher::Dispatcher;
use mobilestudio_runner::invocation::new_output_file_name;
use mobilestudio_runner::listener::ConsoleListener;
use mobilestudio_runner::platform::ExecutionEnvironment;
use mobilestudio_runner::results::ResultsDirectory;
use mobilestudio_runner::validation::validate;
use std::path::Path;
use tracing::warn;

use super::super::InvocationArgs;
use super::load_config;

pub async fn cmd_run(
    workspace: &Path,
    config_path: Option<&Path>,
    args: &InvocationArgs,
) -> Result<()> {
    let config = load_config(workspace, config_path, Some(args))?;
    let spec = config.to_invocation_spec()?;
    let workspace_root = workspace.to_string_lossy().into_owned();

    let validation = validate(&spec, &workspace_root, config.is_local());
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if !validation.is_ok() {
        for error in &validation.errors {
            eprintln!("ERROR: {}", error);
        }
        bail!("Configuration is invalid ({} error(s))", validation.errors.len());
    }

    let listener = ConsoleListener::new();
    let mut dispatcher = Dispatcher::new(config.worker()?);
    let result = dispatcher
        .dispatch(&spec, &workspace_root, &listener)
        .await
        .context("Test run could not be completed")?;

    if let Some(path) = config.report_json_path(workspace) {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize execution report")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write report file: {}", path.display()))?;
    }

    println!("Outcome: {}", result.outcome);
    if result.outcome == Outcome::Failure {
        bail!("Test run failed");
    }
    Ok(())
}

pub fn cmd_command(workspace: &Path, config_path: Option<&Path>, args: &InvocationArgs) -> Result<()> {
    let config = load_config(workspace, config_path, Some(args))?;
    let spec = config.to_invocation_spec()?;
    let env = ExecutionEnvironment::detect(workspace.to_string_lossy());
    println!("{}", command::build(&spec, &env, &new_output_file_name()));
    Ok(())
}

pub fn cmd_prepare(workspace: &Path) -> Result<()> {
    let results = ResultsDirectory::for_workspace(workspace);
    results.prepare()?;
    println!("Prepared {}", results.path().display());
    Ok(())
}
