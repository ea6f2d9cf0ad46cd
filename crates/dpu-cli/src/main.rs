//! isodeploy: deploy a single-master cluster onto a DPU from an ISO.
//!
//! # Usage
//!
//! ```text
//! isodeploy deploy --config cluster.toml --steps pre,masters,post
//! isodeploy validate --config cluster.toml
//! ```
//!
//! Exit status: 0 on success, 2 for configuration errors, 3 for unknown
//! hardware, 4 for transport or install failures, 5 for hook failures.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use dpu_core::StepSet;
use dpu_deploy::DeployError;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_FILTER: &str = "info,isodeploy=debug,dpu_deploy=debug";

#[derive(Parser)]
#[command(
    name = "isodeploy",
    about = "Deploy a single-master cluster onto a DPU from an ISO",
    version,
    propagate_version = true
)]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the selected deployment phases.
    Deploy {
        /// Cluster configuration file (TOML).
        #[arg(short, long)]
        config: PathBuf,
        /// Comma separated phases to run: pre, masters, post.
        #[arg(long, default_value = "pre,masters,post", value_parser = parse_steps)]
        steps: StepSet,
    },
    /// Check the configuration without touching any node.
    Validate {
        /// Cluster configuration file (TOML).
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn parse_steps(s: &str) -> Result<StepSet, String> {
    s.parse::<StepSet>().map_err(|e| e.to_string())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Exit status for a failed command.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<DeployError>().map_or(1, DeployError::exit_code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let result = match cli.command {
        Commands::Deploy { config, steps } => commands::deploy::run(&config, steps).await,
        Commands::Validate { config } => commands::validate::run(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = exit_code(&err);
            error!(exit_code = code, "{err:#}");
            ExitCode::from(code)
        }
    }
}
