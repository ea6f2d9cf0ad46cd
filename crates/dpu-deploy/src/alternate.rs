//! Vendor boot path for DPUs without image-boot support.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dpu_core::{ClusterConfig, ImageSource};
use dpu_remote::{SessionConnector, SessionTarget};
use tracing::info;

use crate::dispatch::AlternateBoot;
use crate::error::DeployResult;
use crate::stage::{SSH_PORT, render, stage_image, wait_for_port};
use crate::validate::NodeIdentity;

/// Stages the image on the controller, runs the configured vendor boot
/// command, and returns once the node answers on SSH.
pub struct AlternateIsoBoot {
    connector: Arc<dyn SessionConnector>,
}

impl AlternateIsoBoot {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl AlternateBoot for AlternateIsoBoot {
    async fn boot(&self, cluster: &ClusterConfig, node: &NodeIdentity, image: &ImageSource) -> DeployResult<()> {
        let tuning = &cluster.deploy;
        let bmc = self.connector.connect(&SessionTarget::from(&node.bmc)).await?;
        let staged = stage_image(bmc.as_ref(), image, &tuning.staging_dir).await?;

        let command = render(
            &tuning.alternate_boot_command,
            &[
                ("image", staged.as_str()),
                ("name", node.name.as_str()),
                ("mac", node.mac.as_str()),
                ("ip", node.ip.as_str()),
            ],
        );
        info!(cluster = %cluster.name, node = %node.name, %command, "running vendor boot");
        bmc.run_checked(&command).await?;

        wait_for_port(
            &node.name,
            &node.ip,
            SSH_PORT,
            Duration::from_secs(tuning.boot_timeout_secs),
            Duration::from_secs(tuning.poll_interval_secs),
        )
        .await
    }
}
