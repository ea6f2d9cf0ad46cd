//! Install dispatch: one strategy per hardware class.

use std::sync::Arc;

use async_trait::async_trait;
use dpu_core::{ClusterConfig, ImageSource};
use tracing::{error, info};

use crate::classify::HardwareClass;
use crate::error::{DeployError, DeployResult};
use crate::pool::{DeploymentFuture, WorkerPool};
use crate::validate::NodeIdentity;

/// Host interfaces the install task is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    pub external_port: String,
    pub api_port: String,
}

/// Install of one node through the image-boot path.
#[async_trait]
pub trait InstallTask: Send + Sync {
    /// Boot the node from `image` and wait until it is up.
    async fn start(&self, image: &ImageSource) -> DeployResult<()>;

    /// Finalize the node once it has booted.
    async fn post_boot(&self) -> DeployResult<()>;
}

pub trait InstallTaskFactory: Send + Sync {
    fn create(&self, node: &NodeIdentity, network: &NetworkContext) -> Arc<dyn InstallTask>;
}

/// Vendor-specific boot procedure. Returns once the node is installed.
#[async_trait]
pub trait AlternateBoot: Send + Sync {
    async fn boot(&self, cluster: &ClusterConfig, node: &NodeIdentity, image: &ImageSource) -> DeployResult<()>;
}

pub struct InstallDispatcher {
    installs: Arc<dyn InstallTaskFactory>,
    alternate: Arc<dyn AlternateBoot>,
    pool: WorkerPool,
}

impl InstallDispatcher {
    pub fn new(installs: Arc<dyn InstallTaskFactory>, alternate: Arc<dyn AlternateBoot>, pool: WorkerPool) -> Self {
        Self {
            installs,
            alternate,
            pool,
        }
    }

    /// Run exactly one install strategy for `class`, resolving `future`
    /// with the install outcome.
    pub async fn dispatch(
        &self,
        class: HardwareClass,
        cluster: &ClusterConfig,
        node: &NodeIdentity,
        future: DeploymentFuture<DeployResult<()>>,
        image: &ImageSource,
        network: &NetworkContext,
    ) -> DeployResult<()> {
        match class {
            HardwareClass::ImageBoot => {
                let task = self.installs.create(node, network);
                let (resolver, completion) = future.split();

                info!(node = %node.name, %image, workers = self.pool.size(), "submitting install task");
                let install = Arc::clone(&task);
                let image = image.clone();
                self.pool
                    .submit(resolver, async move { install.start(&image).await });

                completion.wait().await??;
                info!(node = %node.name, "install finished, running post-boot");
                task.post_boot().await
            }
            HardwareClass::AlternateVendor => {
                let (resolver, completion) = future.split();
                info!(node = %node.name, %image, "booting through the alternate vendor path");
                resolver.resolve(self.alternate.boot(cluster, node, image).await);
                completion.wait().await?
            }
            HardwareClass::Unknown => {
                error!(node = %node.name, bmc = %node.bmc.host(), "Unknown DPU");
                Err(DeployError::UnknownHardware {
                    node: node.name.clone(),
                    bmc: node.bmc.host().to_string(),
                })
            }
        }
    }
}
