//! Configuration view and initialization (`mobilestudio-runner config`).

use anyhow::Result;
use mobilestudio_runner::config::{CONFIG_FILE_NAME, RunnerToml};
use std::path::Path;

use super::super::ConfigCommands;
use super::load_config;

pub fn cmd_config(
    workspace: &Path,
    config_path: Option<&Path>,
    command: Option<ConfigCommands>,
) -> Result<()> {
    let default_path = workspace.join(CONFIG_FILE_NAME);
    let path = config_path.unwrap_or(&default_path);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("MobileStudio Runner Configuration");
            println!("=================================");
            println!();

            if path.exists() {
                println!("Config file: {}", path.display());
            } else {
                println!("No config file at {} (using defaults)", path.display());
            }
            println!();

            let config = load_config(workspace, config_path, None)?;
            println!("Effective values (with env overrides):");
            println!("[runner]");
            println!("  path = {}", show(&config.runner.path));
            println!("  msg_server = {}", show(&config.runner.msg_server));
            println!("  device_id = {}", show(&config.runner.device_id));
            println!("  launcher = \"{}\"", config.runner.launcher);
            println!("[test]");
            println!("  project_root = {}", show(&config.test.project_root));
            println!("  test_path = {}", show(&config.test.test_path));
            println!("  test_as_unit = {}", config.test.test_as_unit);
            println!("[worker]");
            if config.is_local() {
                println!("  (local)");
            } else {
                println!("  command = {:?}", config.worker.command);
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if path.exists() {
                println!("{} already exists at {}", CONFIG_FILE_NAME, path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            RunnerToml::default().save(path)?;

            println!("Created {} at {}", CONFIG_FILE_NAME, path.display());
            println!();
            println!("You can now set:");
            println!("  - [runner] path, msg_server, device_id");
            println!("  - [test] project_root, test_path, test_as_unit");
            println!("  - [worker] command, to run on another machine");
            println!();
        }
    }

    Ok(())
}

fn show(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("\"{}\"", v),
        None => "(unset)".to_string(),
    }
}
