use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use mobilestudio_runner::config::CliOverrides;

mod cmd;

#[derive(Parser)]
#[command(name = "mobilestudio-runner")]
#[command(version, about = "Run Telerik Mobile Testing suites as a CI build step")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit diagnostic logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Workspace root. Defaults to $WORKSPACE, then the current directory.
    #[arg(long, global = true, env = "WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Config file. Defaults to mobilestudio.toml in the workspace.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Invocation settings that override mobilestudio.toml and the environment.
#[derive(Args, Clone, Default)]
pub struct InvocationArgs {
    /// Runner installation directory or executable
    #[arg(long)]
    pub runner_path: Option<String>,

    /// Message server connection string
    #[arg(long)]
    pub msg_server: Option<String>,

    /// Target device id
    #[arg(long)]
    pub device_id: Option<String>,

    /// Test project directory
    #[arg(long)]
    pub project_root: Option<String>,

    /// A .test file or a .list file
    #[arg(long)]
    pub test_path: Option<String>,

    /// Report results as unit tests (`--test-as-unit=false` turns it off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub test_as_unit: Option<bool>,

    /// Worker command, e.g. "ssh agent-1 mobilestudio-runner worker"
    #[arg(long)]
    pub worker: Option<String>,

    /// Write the execution report as JSON to this path
    #[arg(long)]
    pub report_json: Option<PathBuf>,
}

impl From<&InvocationArgs> for CliOverrides {
    fn from(args: &InvocationArgs) -> Self {
        Self {
            runner_path: args.runner_path.clone(),
            msg_server: args.msg_server.clone(),
            device_id: args.device_id.clone(),
            project_root: args.project_root.clone(),
            test_path: args.test_path.clone(),
            test_as_unit: args.test_as_unit,
            worker: args.worker.clone(),
            report_json: args.report_json.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Prepare the results directory, run the tests and classify the outcome
    Run {
        #[command(flatten)]
        args: InvocationArgs,
    },
    /// Print the runner command line without running anything
    Command {
        #[command(flatten)]
        args: InvocationArgs,
    },
    /// Create or empty the results directory
    Prepare,
    /// Check the configuration without running anything
    Validate {
        #[command(flatten)]
        args: InvocationArgs,
    },
    /// Serve one worker request from stdin (used by remote dispatch)
    Worker,
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default mobilestudio.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    mobilestudio_runner::logging::init(cli.verbose, cli.log_json)?;

    let workspace = match cli.workspace.clone() {
        Some(dir) => std::path::absolute(&dir)
            .with_context(|| format!("Failed to resolve workspace {}", dir.display()))?,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config_path = cli.config.as_deref();

    match &cli.command {
        Commands::Run { args } => cmd::cmd_run(&workspace, config_path, args).await?,
        Commands::Command { args } => cmd::cmd_command(&workspace, config_path, args)?,
        Commands::Prepare => cmd::cmd_prepare(&workspace)?,
        Commands::Validate { args } => cmd::cmd_validate(&workspace, config_path, args)?,
        Commands::Worker => cmd::cmd_worker().await?,
        Commands::Config { command } => {
            cmd::cmd_config(&workspace, config_path, command.clone())?
        }
    }

    Ok(())
}
