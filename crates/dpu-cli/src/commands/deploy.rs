use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dpu_core::{ClusterConfig, StepSet};
use dpu_deploy::{Collaborators, DeployError, IsoDeployer, format_elapsed};
use dpu_remote::{OpenSshConnector, SshOptions};
use tracing::info;

pub async fn run(config: &Path, steps: StepSet) -> anyhow::Result<()> {
    let cluster = ClusterConfig::from_file(config).map_err(DeployError::from)?;
    info!(cluster = %cluster.name, config = %config.display(), %steps, "starting deployment");

    let connector = Arc::new(OpenSshConnector::new(SshOptions::default()));
    let collaborators = Collaborators::remote(&cluster, connector);
    let report = IsoDeployer::new(cluster, steps, collaborators)?.deploy().await?;

    let total: Duration = report.iter().map(|(_, elapsed)| elapsed).sum();
    info!(phases = report.len(), total = %format_elapsed(total), "deployment finished");
    Ok(())
}
