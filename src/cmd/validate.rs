//! Configuration checks (`mobilestudio-runner validate`).

use anyhow::{Result, bail};
use mobilestudio_runner::validation::validate;
use std::path::Path;

use super::super::InvocationArgs;
use super::load_config;

pub fn cmd_validate(workspace: &Path, config_path: Option<&Path>, args: &InvocationArgs) -> Result<()> {
    let config = load_config(workspace, config_path, Some(args))?;
    let spec = config.to_invocation_spec()?;
    let report = validate(&spec, &workspace.to_string_lossy(), config.is_local());

    for warning in &report.warnings {
        println!("warning: {}", warning);
    }
    if !report.is_ok() {
        for error in &report.errors {
            println!("error: {}", error);
        }
        bail!("Configuration is invalid ({} error(s))", report.errors.len());
    }

    println!("Configuration is valid.");
    Ok(())
}
