use std::path::Path;

use dpu_core::ClusterConfig;
use dpu_deploy::{DeployError, validate_cluster};

pub fn run(config: &Path) -> anyhow::Result<()> {
    let cluster = ClusterConfig::from_file(config).map_err(DeployError::from)?;
    let validated = validate_cluster(&cluster)?;
    let image = cluster.image_source().map_err(DeployError::from)?;

    let master = &validated.master;
    println!("✓ {} is ready for ISO deployment", cluster.name);
    println!("  Master:   {} (mac {}, ip {})", master.name, master.mac, master.ip);
    println!("  BMC:      {}@{}", master.bmc.user, master.bmc.host());
    println!("  API port: {}", validated.api_port);
    println!("  Image:    {image} ({})", image.scheme());
    Ok(())
}
