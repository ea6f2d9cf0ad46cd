//! OpenSSH-backed sessions.
//!
//! Commands are executed through the system `ssh` and `scp` binaries.
//! Password authentication goes through `sshpass -e`, which reads the
//! password from the `SSHPASS` environment variable so it never shows
//! up in the process table. Host keys are not checked: the targets are
//! management controllers and nodes that were just re-imaged.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::session::{CommandOutput, RemoteSession, SessionConnector, SessionTarget};

/// `sshpass` exit status for a rejected password. Remote commands can exit
/// with the same status, so it is only trusted for the handshake.
const SSHPASS_BAD_PASSWORD: i32 = 5;
/// Remote command for the handshake round trip.
const HANDSHAKE: &str = "true";
/// `ssh` exit status when the connection itself failed.
const SSH_CONNECTION_FAILED: i32 = 255;

#[derive(Debug, Clone)]
pub struct SshOptions {
    pub port: u16,
    pub connect_timeout: Duration,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            port: 22,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Connector that opens sessions with the OpenSSH client.
#[derive(Debug, Clone, Default)]
pub struct OpenSshConnector {
    options: SshOptions,
}

impl OpenSshConnector {
    pub fn new(options: SshOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionConnector for OpenSshConnector {
    async fn connect(&self, target: &SessionTarget) -> SessionResult<Box<dyn RemoteSession>> {
        let session = OpenSshSession {
            target: target.clone(),
            options: self.options.clone(),
        };

        session.handshake().await?;
        debug!(host = %target.host, user = %target.user, "ssh session established");

        Ok(Box::new(session))
    }
}

struct OpenSshSession {
    target: SessionTarget,
    options: SshOptions,
}

impl OpenSshSession {
    fn uses_password(&self) -> bool {
        self.target.password.is_some()
    }

    /// Build the process for `program`, wrapped in `sshpass` when a password is set.
    fn invocation(&self, program: &'static str, args: Vec<String>) -> Command {
        let mut cmd = match &self.target.password {
            Some(password) => {
                let mut cmd = Command::new("sshpass");
                cmd.arg("-e").arg(program).env("SSHPASS", password);
                cmd
            }
            None => {
                let mut cmd = Command::new(program);
                cmd.args(["-o", "BatchMode=yes"]);
                cmd
            }
        };
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn launcher(&self, program: &'static str) -> &'static str {
        if self.uses_password() { "sshpass" } else { program }
    }

    /// Run a no-op so authentication and reachability errors surface at connect time.
    async fn handshake(&self) -> SessionResult<()> {
        let args = ssh_args(&self.options, &self.target, HANDSHAKE);
        let output = self.execute("ssh", args, true).await?;
        if output.success() {
            Ok(())
        } else {
            Err(SessionError::Command {
                host: self.target.host.clone(),
                command: HANDSHAKE.to_string(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    async fn execute(&self, program: &'static str, args: Vec<String>, handshake: bool) -> SessionResult<CommandOutput> {
        let output = self
            .invocation(program, args)
            .output()
            .await
            .map_err(|source| SessionError::Spawn {
                program: self.launcher(program),
                source,
            })?;

        let output = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        match classify_failure(&self.target, handshake && self.uses_password(), &output) {
            Some(err) => Err(err),
            None => Ok(output),
        }
    }
}

#[async_trait]
impl RemoteSession for OpenSshSession {
    fn host(&self) -> &str {
        &self.target.host
    }

    async fn run(&self, command: &str) -> SessionResult<CommandOutput> {
        debug!(host = %self.target.host, %command, "running remote command");
        let args = ssh_args(&self.options, &self.target, command);
        self.execute("ssh", args, false).await
    }

    async fn upload(&self, local: &Path, remote: &str) -> SessionResult<()> {
        debug!(host = %self.target.host, local = %local.display(), %remote, "uploading file");
        let args = scp_args(&self.options, &self.target, local, remote);
        let output = self.execute("scp", args, false).await?;
        if output.success() {
            Ok(())
        } else {
            Err(SessionError::Command {
                host: self.target.host.clone(),
                command: format!("scp {} {remote}", local.display()),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

fn common_options(options: &SshOptions) -> Vec<String> {
    vec![
        "-o".to_string(),
        "StrictHostKeyChecking=no".to_string(),
        "-o".to_string(),
        "UserKnownHostsFile=/dev/null".to_string(),
        "-o".to_string(),
        "LogLevel=ERROR".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", options.connect_timeout.as_secs().max(1)),
    ]
}

fn ssh_args(options: &SshOptions, target: &SessionTarget, command: &str) -> Vec<String> {
    let mut args = common_options(options);
    args.push("-p".to_string());
    args.push(options.port.to_string());
    args.push(format!("{}@{}", target.user, target.host));
    args.push(command.to_string());
    args
}

fn scp_args(options: &SshOptions, target: &SessionTarget, local: &Path, remote: &str) -> Vec<String> {
    let host = if target.host.contains(':') {
        format!("[{}]", target.host)
    } else {
        target.host.clone()
    };
    let mut args = common_options(options);
    args.push("-P".to_string());
    args.push(options.port.to_string());
    args.push(local.display().to_string());
    args.push(format!("{}@{}:{}", target.user, host, remote));
    args
}

/// Separate transport failures from the remote command's own exit status.
///
/// `password_handshake` is set only for the no-op round trip made through
/// `sshpass`, where exit status 5 cannot come from the remote side.
fn classify_failure(
    target: &SessionTarget,
    password_handshake: bool,
    output: &CommandOutput,
) -> Option<SessionError> {
    let auth_failed = || SessionError::Authentication {
        host: target.host.clone(),
        user: target.user.clone(),
    };

    if password_handshake && output.status == SSHPASS_BAD_PASSWORD {
        return Some(auth_failed());
    }

    if output.status == SSH_CONNECTION_FAILED {
        if output.stderr.contains("Permission denied") {
            return Some(auth_failed());
        }
        return Some(SessionError::Connection {
            host: target.host.clone(),
            reason: output.stderr.trim().to_string(),
        });
    }

    None
}
