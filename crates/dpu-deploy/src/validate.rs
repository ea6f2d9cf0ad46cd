//! Construction-time checks on the cluster configuration.
//!
//! A master is only addressable once its MAC, IP and name are known and
//! the host interface facing the cluster API has been pinned down. The
//! checks run before any phase and every failure is fatal.

use dpu_core::{AUTO, BmcConfig, ClusterConfig, MasterConfig, NodeKind};
use tracing::error;

use crate::error::{DeployError, DeployResult};

/// A master whose identity fields have all been checked.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub name: String,
    pub mac: String,
    pub ip: String,
    pub bmc: BmcConfig,
}

/// Result of validating a cluster for single-master deployment.
#[derive(Debug, Clone)]
pub struct ValidatedCluster {
    pub master: NodeIdentity,
    /// Host interface facing the cluster API, never `"auto"`.
    pub api_port: String,
}

/// Run every construction-time check: master count first, then the
/// master's identity fields.
pub fn validate_cluster(cluster: &ClusterConfig) -> DeployResult<ValidatedCluster> {
    let master = single_master(cluster)?;
    validate_master(cluster, master)
}

/// The only master of the cluster. Any other count is rejected.
pub fn single_master(cluster: &ClusterConfig) -> DeployResult<&MasterConfig> {
    match cluster.masters.as_slice() {
        [master] => Ok(master),
        masters => {
            error!(
                cluster = %cluster.name,
                count = masters.len(),
                "ISO deployment requires exactly one master"
            );
            Err(DeployError::MasterCount {
                cluster: cluster.name.clone(),
                count: masters.len(),
            })
        }
    }
}

/// Check MAC, IP, name and API port, in that order.
pub fn validate_master(cluster: &ClusterConfig, master: &MasterConfig) -> DeployResult<ValidatedCluster> {
    let mac = require(cluster, "mac", master.mac.as_deref())?;
    let ip = require(cluster, "ip", master.ip.as_deref())?;
    let name = require(cluster, "name", master.name.as_deref())?;

    let api_port = match cluster.network_api_port.as_deref().map(str::trim) {
        Some(port) if !port.is_empty() && !port.eq_ignore_ascii_case(AUTO) => port.to_string(),
        _ => return Err(missing(cluster, "network_api_port")),
    };

    if master.kind != NodeKind::Dpu {
        error!(node = %name, kind = %master.kind, "only DPU masters can be deployed from an ISO");
        return Err(DeployError::UnsupportedKind {
            node: name,
            kind: master.kind,
        });
    }

    let bmc = master.bmc.clone().ok_or_else(|| missing(cluster, "bmc"))?;

    Ok(ValidatedCluster {
        master: NodeIdentity { name, mac, ip, bmc },
        api_port,
    })
}

fn require(cluster: &ClusterConfig, field: &'static str, value: Option<&str>) -> DeployResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(missing(cluster, field)),
    }
}

fn missing(cluster: &ClusterConfig, field: &'static str) -> DeployError {
    error!(cluster = %cluster.name, field, "missing required field");
    DeployError::MissingField {
        cluster: cluster.name.clone(),
        field,
    }
}
