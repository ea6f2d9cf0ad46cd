//! Session contracts consumed by the deployer.

use std::path::Path;

use async_trait::async_trait;
use dpu_core::BmcConfig;

use crate::error::{SessionError, SessionResult};

/// Where and as whom to open a session.
#[derive(Clone)]
pub struct SessionTarget {
    pub host: String,
    pub user: String,
    /// `None` means key-based authentication.
    pub password: Option<String>,
}

impl SessionTarget {
    pub fn with_key(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            password: None,
        }
    }
}

impl From<&BmcConfig> for SessionTarget {
    fn from(bmc: &BmcConfig) -> Self {
        Self {
            host: bmc.host().to_string(),
            user: bmc.user.clone(),
            password: (!bmc.password.is_empty()).then(|| bmc.password.clone()),
        }
    }
}

impl std::fmt::Debug for SessionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTarget")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Output of a command run over a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// An authenticated session to a remote host.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    fn host(&self) -> &str;

    async fn run(&self, command: &str) -> SessionResult<CommandOutput>;

    async fn upload(&self, local: &Path, remote: &str) -> SessionResult<()>;

    /// Run a command and treat a non-zero exit status as an error.
    async fn run_checked(&self, command: &str) -> SessionResult<CommandOutput> {
        let output = self.run(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(SessionError::Command {
                host: self.host().to_string(),
                command: command.to_string(),
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Opens authenticated sessions. Authentication happens in `connect`,
/// so a returned session is known to be usable.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(&self, target: &SessionTarget) -> SessionResult<Box<dyn RemoteSession>>;
}
