//! Deployment error types.
//!
//! Every fatal condition of a run is a [`DeployError`]. Nothing in this
//! crate terminates the process; the binary maps the error to an exit
//! status with [`DeployError::exit_code`].

use dpu_core::{ConfigError, NodeKind, Step};
use dpu_remote::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("cluster {cluster}: exactly one master is supported, found {count}")]
    MasterCount { cluster: String, count: usize },

    #[error("cluster {cluster}: missing {field}")]
    MissingField {
        cluster: String,
        field: &'static str,
    },

    #[error("node {node}: kind {kind} cannot be deployed from an ISO")]
    UnsupportedKind { node: String, kind: NodeKind },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("node {node}: unknown DPU behind BMC {bmc}")]
    UnknownHardware { node: String, bmc: String },

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("node {node}: install failed: {reason}")]
    Install { node: String, reason: String },

    #[error("node {node}: install task ended without reporting a result")]
    TaskAborted { node: String },

    #[error("{step} hook `{command}` exited with status {status}")]
    Hook {
        step: Step,
        command: String,
        status: i32,
    },

    #[error("failed to launch hook `{command}`: {source}")]
    HookSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    /// Process exit status for this error. Never zero.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeployError::MasterCount { .. }
            | DeployError::MissingField { .. }
            | DeployError::UnsupportedKind { .. }
            | DeployError::Config(_) => 2,
            DeployError::UnknownHardware { .. } => 3,
            DeployError::Session(_) | DeployError::Install { .. } | DeployError::TaskAborted { .. } => 4,
            DeployError::Hook { .. } | DeployError::HookSpawn { .. } => 5,
        }
    }
}

pub type DeployResult<T> = Result<T, DeployError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_non_zero_and_grouped() {
        let config = DeployError::MissingField {
            cluster: "c".to_string(),
            field: "mac",
        };
        let unknown = DeployError::UnknownHardware {
            node: "acc".to_string(),
            bmc: "192.168.0.1".to_string(),
        };
        let session = DeployError::Session(SessionError::Authentication {
            host: "192.168.0.1".to_string(),
            user: "root".to_string(),
        });
        let hook = DeployError::Hook {
            step: Step::Post,
            command: "false".to_string(),
            status: 1,
        };

        assert_eq!(config.exit_code(), 2);
        assert_eq!(unknown.exit_code(), 3);
        assert_eq!(session.exit_code(), 4);
        assert_eq!(hook.exit_code(), 5);
    }

    #[test]
    fn messages_name_cluster_and_field() {
        let err = DeployError::MissingField {
            cluster: "dpu-cluster".to_string(),
            field: "network_api_port",
        };
        assert_eq!(err.to_string(), "cluster dpu-cluster: missing network_api_port");
    }
}
