//! Hardware family detection over the BMC.
//!
//! Detection is ordered: an IPU management complex wins, then a
//! Marvell/Cavium PCI function, and anything else is unknown. A
//! transport failure aborts detection rather than falling through.

use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use dpu_core::BmcConfig;
use dpu_remote::{RemoteSession, SessionConnector, SessionResult, SessionTarget};
use regex::Regex;
use tracing::{debug, info};

use crate::error::DeployResult;

/// Marker the IPU management complex prints in `/etc/issue`.
const IMAGE_BOOT_MARKER: &str = "IPU IMC";

/// PCI vendor ids of the alternate family (Cavium, Marvell).
const ALTERNATE_VENDOR_IDS: [&str; 2] = ["177d", "11ab"];

/// `lspci -nmm`: slot, class, then the quoted vendor id.
static LSPCI_VENDOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\S+\s+"[^"]*"\s+"([0-9A-Fa-f]{4})""#).expect("lspci vendor pattern is valid")
});

/// Closed set of hardware families a DPU can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareClass {
    /// Management complex can boot the compute complex from an image.
    ImageBoot,
    /// Vendor-specific boot procedure.
    AlternateVendor,
    Unknown,
}

impl fmt::Display for HardwareClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HardwareClass::ImageBoot => "image-boot",
            HardwareClass::AlternateVendor => "alternate-vendor",
            HardwareClass::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[async_trait]
pub trait HardwareProbe: Send + Sync {
    async fn classify(&self, bmc: &BmcConfig) -> DeployResult<HardwareClass>;
}

/// Probes the controller over a remote session.
pub struct BmcProbe {
    connector: Arc<dyn SessionConnector>,
}

impl BmcProbe {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self { connector }
    }
}

#[async_trait]
impl HardwareProbe for BmcProbe {
    async fn classify(&self, bmc: &BmcConfig) -> DeployResult<HardwareClass> {
        let session = self.connector.connect(&SessionTarget::from(bmc)).await?;

        let class = if supports_image_boot(session.as_ref()).await? {
            HardwareClass::ImageBoot
        } else if has_alternate_vendor_device(session.as_ref()).await? {
            HardwareClass::AlternateVendor
        } else {
            HardwareClass::Unknown
        };

        info!(bmc = %bmc.host(), %class, "classified hardware");
        Ok(class)
    }
}

async fn supports_image_boot(session: &dyn RemoteSession) -> SessionResult<bool> {
    let output = session.run("cat /etc/issue").await?;
    if !output.success() {
        debug!(host = %session.host(), status = output.status, "no /etc/issue on controller");
        return Ok(false);
    }
    Ok(output.stdout.contains(IMAGE_BOOT_MARKER))
}

async fn has_alternate_vendor_device(session: &dyn RemoteSession) -> SessionResult<bool> {
    let output = session.run("lspci -nmm").await?;
    if !output.success() {
        debug!(host = %session.host(), status = output.status, "lspci unavailable on controller");
        return Ok(false);
    }
    Ok(pci_vendors(&output.stdout).any(|vendor| ALTERNATE_VENDOR_IDS.contains(&vendor.as_str())))
}

fn pci_vendors(lspci: &str) -> impl Iterator<Item = String> + '_ {
    lspci.lines().filter_map(|line| {
        LSPCI_VENDOR
            .captures(line.trim())
            .map(|caps| caps[1].to_ascii_lowercase())
    })
}
