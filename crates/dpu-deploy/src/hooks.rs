//! Pre- and post-configuration hooks.
//!
//! A hook phase runs the configured shell commands on the deploy host,
//! one after another. Output is forwarded to the log line by line while
//! the command runs. The first failing command ends the phase.

use std::process::Stdio;

use async_trait::async_trait;
use dpu_core::{ClusterConfig, Step};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::error::{DeployError, DeployResult};

#[async_trait]
pub trait PhaseHook: Send + Sync {
    async fn run(&self, cluster: &ClusterConfig) -> DeployResult<()>;
}

/// Runs shell commands through `sh -c`.
///
/// Each command sees `CLUSTER_NAME` and `INSTALL_ISO` in its environment.
#[derive(Debug, Clone)]
pub struct CommandHook {
    step: Step,
    commands: Vec<String>,
}

impl CommandHook {
    pub fn new(step: Step, commands: Vec<String>) -> Self {
        Self { step, commands }
    }

    pub fn pre(cluster: &ClusterConfig) -> Self {
        Self::new(Step::Pre, cluster.preconfig.clone())
    }

    pub fn post(cluster: &ClusterConfig) -> Self {
        Self::new(Step::Post, cluster.postconfig.clone())
    }

    async fn run_one(&self, cluster: &ClusterConfig, command: &str) -> DeployResult<()> {
        info!(step = %self.step, %command, "running hook");
        let spawn_failed = |source| DeployError::HookSpawn {
            command: command.to_string(),
            source,
        };

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .env("CLUSTER_NAME", &cluster.name)
            .env("INSTALL_ISO", &cluster.install_iso)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_failed)?;

        let stdout = forward_lines(self.step, "stdout", child.stdout.take());
        let stderr = forward_lines(self.step, "stderr", child.stderr.take());
        let (status, (), ()) = tokio::join!(child.wait(), stdout, stderr);
        let status = status.map_err(spawn_failed)?;

        if status.success() {
            return Ok(());
        }

        let code = status.code().unwrap_or(-1);
        error!(step = %self.step, %command, status = code, "hook failed");
        Err(DeployError::Hook {
            step: self.step,
            command: command.to_string(),
            status: code,
        })
    }
}

#[async_trait]
impl PhaseHook for CommandHook {
    async fn run(&self, cluster: &ClusterConfig) -> DeployResult<()> {
        if self.commands.is_empty() {
            info!(step = %self.step, "no hook commands configured");
            return Ok(());
        }
        for command in &self.commands {
            self.run_one(cluster, command).await?;
        }
        Ok(())
    }
}

async fn forward_lines<R>(step: Step, stream: &'static str, reader: Option<R>)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else { return };
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(%step, stream, "{line}"),
            Ok(None) => break,
            Err(e) => {
                warn!(%step, stream, error = %e, "stopped reading hook output");
                break;
            }
        }
    }
}
