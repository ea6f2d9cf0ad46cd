//! ISO deployer: drives the PRE → MASTERS → POST phase sequence.
//!
//! Construction runs every configuration check, so a deployer that
//! exists is known to have exactly one addressable master. `deploy`
//! consumes the deployer; a run cannot be repeated.

use std::collections::BTreeMap;
use std::sync::Arc;

use dpu_core::{ClusterConfig, ImageSource, Step, StepSet};
use dpu_remote::SessionConnector;
use tracing::{error, info};

use crate::alternate::AlternateIsoBoot;
use crate::classify::{BmcProbe, HardwareProbe};
use crate::dispatch::{AlternateBoot, InstallDispatcher, InstallTaskFactory, NetworkContext};
use crate::error::{DeployError, DeployResult};
use crate::hooks::{CommandHook, PhaseHook};
use crate::install::ImageBootFactory;
use crate::pool::{DeploymentFuture, WorkerPool};
use crate::timer::{PhaseLedger, PhaseReport};
use crate::validate::{NodeIdentity, validate_cluster};

/// External collaborators the deployer calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn HardwareProbe>,
    pub installs: Arc<dyn InstallTaskFactory>,
    pub alternate: Arc<dyn AlternateBoot>,
    pub preconfig: Arc<dyn PhaseHook>,
    pub postconfig: Arc<dyn PhaseHook>,
}

impl Collaborators {
    /// Production wiring: every remote call goes through `connector`.
    pub fn remote(cluster: &ClusterConfig, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            probe: Arc::new(BmcProbe::new(Arc::clone(&connector))),
            installs: Arc::new(ImageBootFactory::new(cluster.deploy.clone(), Arc::clone(&connector))),
            alternate: Arc::new(AlternateIsoBoot::new(connector)),
            preconfig: Arc::new(CommandHook::pre(cluster)),
            postconfig: Arc::new(CommandHook::post(cluster)),
        }
    }
}

pub struct IsoDeployer {
    cluster: ClusterConfig,
    steps: StepSet,
    master: NodeIdentity,
    api_port: String,
    image: ImageSource,
    /// One unresolved completion per master, keyed by node name.
    futures: BTreeMap<String, DeploymentFuture<DeployResult<()>>>,
    collab: Collaborators,
    dispatcher: InstallDispatcher,
}

impl std::fmt::Debug for IsoDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsoDeployer")
            .field("cluster", &self.cluster.name)
            .field("steps", &self.steps)
            .field("master", &self.master.name)
            .finish_non_exhaustive()
    }
}

impl IsoDeployer {
    pub fn new(cluster: ClusterConfig, steps: StepSet, collab: Collaborators) -> DeployResult<Self> {
        let validated = validate_cluster(&cluster)?;
        let image = cluster.image_source().inspect_err(|e| {
            error!(cluster = %cluster.name, error = %e, "invalid install image");
        })?;

        let futures = cluster
            .masters
            .iter()
            .filter_map(|m| m.name.clone())
            .map(|name| (name.clone(), DeploymentFuture::new(name)))
            .collect();

        let dispatcher = InstallDispatcher::new(
            Arc::clone(&collab.installs),
            Arc::clone(&collab.alternate),
            WorkerPool::new(cluster.masters.len()),
        );

        info!(
            cluster = %cluster.name,
            master = %validated.master.name,
            %steps,
            %image,
            "ISO deployer ready"
        );

        Ok(Self {
            cluster,
            steps,
            master: validated.master,
            api_port: validated.api_port,
            image,
            futures,
            collab,
            dispatcher,
        })
    }

    /// Run the selected phases in order and report their durations.
    pub async fn deploy(mut self) -> DeployResult<PhaseReport> {
        let mut ledger = PhaseLedger::new();
        let has_masters = !self.cluster.masters.is_empty();

        if self.steps.contains(Step::Pre) && has_masters {
            let phase = ledger.start(Step::Pre);
            self.collab.preconfig.run(&self.cluster).await?;
            ledger.stop(phase);
        } else {
            info!("Skipping pre configuration.");
        }

        if self.steps.contains(Step::Masters) && has_masters {
            let phase = ledger.start(Step::Masters);
            self.deploy_master().await?;
            ledger.stop(phase);
        } else {
            info!("Skipping master creation.");
        }

        if self.steps.contains(Step::Post) {
            let phase = ledger.start(Step::Post);
            self.collab.postconfig.run(&self.cluster).await?;
            ledger.stop(phase);
        } else {
            info!("Skipping post configuration.");
        }

        Ok(ledger.finish())
    }

    async fn deploy_master(&mut self) -> DeployResult<()> {
        let node = &self.master;
        let future = self
            .futures
            .remove(&node.name)
            .ok_or_else(|| DeployError::TaskAborted {
                node: node.name.clone(),
            })?;

        info!(node = %node.name, bmc = %node.bmc.host(), "Detecting DPU");
        let class = self.collab.probe.classify(&node.bmc).await.inspect_err(|e| {
            error!(node = %node.name, error = %e, "hardware detection failed");
        })?;

        let external_port = self.cluster.external_port().inspect_err(|e| {
            error!(cluster = %self.cluster.name, error = %e, "cannot resolve external port");
        })?;
        let network = NetworkContext {
            external_port,
            api_port: self.api_port.clone(),
        };

        self.dispatcher
            .dispatch(class, &self.cluster, node, future, &self.image, &network)
            .await
            .inspect_err(|e| error!(node = %node.name, error = %e, "master deployment failed"))
    }
}
