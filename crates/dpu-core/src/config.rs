//! Cluster configuration parser.
//!
//! Only the structure and presence of fields is handled here. Which
//! fields a deployment mode requires is decided by the deployer.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::{ImageSource, SourceError};
use crate::types::NodeKind;

/// Placeholder for a value that should be detected rather than configured.
pub const AUTO: &str = "auto";

const PROC_NET_ROUTE: &str = "/proc/net/route";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cluster config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid install image: {0}")]
    Source(#[from] SourceError),

    #[error("external port is \"auto\" but no default route was found")]
    NoDefaultRoute,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    #[serde(default)]
    pub masters: Vec<MasterConfig>,
    pub install_iso: String,
    /// Host interface used for external traffic, or `"auto"`.
    #[serde(default = "default_auto")]
    pub external_port: String,
    /// Host interface with a connection to the cluster API. Never detected.
    pub network_api_port: Option<String>,
    #[serde(default)]
    pub preconfig: Vec<String>,
    #[serde(default)]
    pub postconfig: Vec<String>,
    #[serde(default)]
    pub deploy: DeployTuning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterConfig {
    pub name: Option<String>,
    pub kind: NodeKind,
    pub mac: Option<String>,
    pub ip: Option<String>,
    pub bmc: Option<BmcConfig>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BmcConfig {
    pub url: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl BmcConfig {
    /// Host part of the BMC address, without scheme, credentials, port or path.
    ///
    /// Bare IPv6 literals are returned as they are; a port can only be
    /// given with the bracketed form.
    pub fn host(&self) -> &str {
        let rest = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        let rest = rest.rsplit_once('@').map(|(_, h)| h).unwrap_or(rest);
        let authority = rest.split('/').next().unwrap_or(rest);
        if let Some(bracketed) = authority.strip_prefix('[') {
            return bracketed.split(']').next().unwrap_or(bracketed);
        }
        match authority.split_once(':') {
            Some((host, port)) if !port.contains(':') => host,
            _ => authority,
        }
    }
}

impl fmt::Debug for BmcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BmcConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Knobs for the concrete boot strategies.
///
/// Command templates understand `{image}`, `{name}`, `{mac}`, `{ip}`,
/// `{external_port}` and `{api_port}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployTuning {
    pub boot_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub staging_dir: String,
    pub node_user: String,
    pub image_boot_command: String,
    pub alternate_boot_command: String,
    /// Routing table consulted when `external_port` is `"auto"`.
    pub route_table: String,
}

impl Default for DeployTuning {
    fn default() -> Self {
        Self {
            boot_timeout_secs: 1800,
            poll_interval_secs: 10,
            staging_dir: "/work".to_string(),
            node_user: "core".to_string(),
            image_boot_command: "/work/scripts/boot_acc_iso.sh {image}".to_string(),
            alternate_boot_command: "/work/scripts/boot_dpu_iso.sh {image} {mac}".to_string(),
            route_table: PROC_NET_ROUTE.to_string(),
        }
    }
}

fn default_auto() -> String {
    AUTO.to_string()
}

impl ClusterConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    pub fn image_source(&self) -> ConfigResult<ImageSource> {
        Ok(ImageSource::parse(&self.install_iso)?)
    }

    /// External interface, resolving `"auto"` to the default-route interface.
    pub fn external_port(&self) -> ConfigResult<String> {
        if !self.external_port.eq_ignore_ascii_case(AUTO) {
            return Ok(self.external_port.clone());
        }
        let route_table = &self.deploy.route_table;
        let table = std::fs::read_to_string(route_table).map_err(|source| ConfigError::Read {
            path: PathBuf::from(route_table),
            source,
        })?;
        default_route_interface(&table).ok_or(ConfigError::NoDefaultRoute)
    }
}

impl FromStr for ClusterConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

/// Pick the default-route interface with the lowest metric from a
/// `/proc/net/route` table.
fn default_route_interface(table: &str) -> Option<String> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            // Iface Destination Gateway Flags RefCnt Use Metric Mask ...
            if fields.len() < 8 || fields[1] != "00000000" || fields[7] != "00000000" {
                return None;
            }
            let metric = fields[6].parse::<u32>().unwrap_or(u32::MAX);
            Some((metric, fields[0]))
        })
        .min_by_key(|(metric, _)| *metric)
        .map(|(_, iface)| iface.to_string())
}
