//! CLI command implementations.
//!
//! | Module     | Commands handled              |
//! |------------|-------------------------------|
//! | `run`      | `Run`, `Command`, `Prepare`   |
//! | `validate` | `Validate`                    |
//! | `worker`   | `Worker`                      |
//! | `config`   | `Config`                      |

pub mod config;
pub mod run;
pub mod validate;
pub mod worker;

pub use config::cmd_config;
pub use run::{cmd_command, cmd_prepare, cmd_run};
pub use validate::cmd_validate;
pub use worker::cmd_worker;

use anyhow::Result;
use mobilestudio_runner::config::{CliOverrides, RunnerToml};
use std::path::Path;

use super::InvocationArgs;

/// Effective configuration: file, then environment, then flags.
pub(crate) fn load_config(
    workspace: &Path,
    config_path: Option<&Path>,
    args: Option<&InvocationArgs>,
) -> Result<RunnerToml> {
    let mut config = RunnerToml::load_for_workspace(workspace, config_path)?;
    config.apply_env(|key| std::env::var(key).ok());
    if let Some(args) = args {
        config.apply_overrides(&CliOverrides::from(args));
    }
    Ok(config)
}
