//! Image-boot install of a DPU compute complex.
//!
//! The management controller stages the install image, boots the
//! compute complex from it, and the node is considered installed once
//! it answers on SSH. Post-boot checks the node really is the one that
//! was configured and names it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dpu_core::{DeployTuning, ImageSource};
use dpu_remote::{SessionConnector, SessionTarget};
use tracing::{info, warn};

use crate::dispatch::{InstallTask, InstallTaskFactory, NetworkContext};
use crate::error::{DeployError, DeployResult};
use crate::stage::{SSH_PORT, render, shell_quote, stage_image, wait_for_port};
use crate::validate::NodeIdentity;

/// Lists every interface MAC on a Linux host.
const LIST_MACS: &str = "cat /sys/class/net/*/address";

pub struct ImageBootNode {
    node: NodeIdentity,
    network: NetworkContext,
    tuning: DeployTuning,
    connector: Arc<dyn SessionConnector>,
}

impl ImageBootNode {
    pub fn new(
        node: NodeIdentity,
        network: NetworkContext,
        tuning: DeployTuning,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        Self {
            node,
            network,
            tuning,
            connector,
        }
    }

    fn boot_command(&self, staged: &str) -> String {
        render(
            &self.tuning.image_boot_command,
            &[
                ("image", staged),
                ("name", self.node.name.as_str()),
                ("mac", self.node.mac.as_str()),
                ("ip", self.node.ip.as_str()),
                ("external_port", self.network.external_port.as_str()),
                ("api_port", self.network.api_port.as_str()),
            ],
        )
    }

    fn install_failed(&self, reason: impl Into<String>) -> DeployError {
        DeployError::Install {
            node: self.node.name.clone(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl InstallTask for ImageBootNode {
    async fn start(&self, image: &ImageSource) -> DeployResult<()> {
        let bmc = self.connector.connect(&SessionTarget::from(&self.node.bmc)).await?;
        let staged = stage_image(bmc.as_ref(), image, &self.tuning.staging_dir).await?;

        let command = self.boot_command(&staged);
        info!(node = %self.node.name, %command, "booting compute complex from image");
        bmc.run_checked(&command).await?;

        wait_for_port(
            &self.node.name,
            &self.node.ip,
            SSH_PORT,
            Duration::from_secs(self.tuning.boot_timeout_secs),
            Duration::from_secs(self.tuning.poll_interval_secs),
        )
        .await
    }

    async fn post_boot(&self) -> DeployResult<()> {
        let target = SessionTarget::with_key(self.node.ip.as_str(), self.tuning.node_user.as_str());
        let session = self.connector.connect(&target).await?;

        let macs = session.run_checked(LIST_MACS).await?;
        let found = macs
            .stdout
            .lines()
            .any(|mac| mac.trim().eq_ignore_ascii_case(&self.node.mac));
        if !found {
            warn!(node = %self.node.name, expected = %self.node.mac, "configured MAC not found on booted node");
            return Err(self.install_failed(format!(
                "booted host at {} has no interface with MAC {}",
                self.node.ip, self.node.mac
            )));
        }

        session
            .run_checked(&format!("sudo hostnamectl set-hostname {}", shell_quote(&self.node.name)))
            .await?;
        info!(node = %self.node.name, ip = %self.node.ip, "post-boot complete");
        Ok(())
    }
}

/// Builds [`ImageBootNode`] tasks sharing one connector and tuning.
pub struct ImageBootFactory {
    tuning: DeployTuning,
    connector: Arc<dyn SessionConnector>,
}

impl ImageBootFactory {
    pub fn new(tuning: DeployTuning, connector: Arc<dyn SessionConnector>) -> Self {
        Self { tuning, connector }
    }
}

impl InstallTaskFactory for ImageBootFactory {
    fn create(&self, node: &NodeIdentity, network: &NetworkContext) -> Arc<dyn InstallTask> {
        Arc::new(ImageBootNode::new(
            node.clone(),
            network.clone(),
            self.tuning.clone(),
            Arc::clone(&self.connector),
        ))
    }
}
