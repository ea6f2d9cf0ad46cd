//! dpu-deploy: single-master ISO deployment onto a DPU.
//!
//! Validates that the master is addressable, detects which hardware
//! family sits behind its BMC, runs the matching install strategy, and
//! wraps it all in optional pre/post configuration phases with
//! per-phase timing.
//!
//! # Architecture
//!
//! ```text
//! IsoDeployer::new(cluster, steps, collaborators)
//!   └── validate_cluster: master count, mac, ip, name, api port
//! IsoDeployer::deploy()
//!   ├── PRE      PhaseHook (preconfig commands)
//!   ├── MASTERS  HardwareProbe::classify(bmc) → HardwareClass
//!   │            └── InstallDispatcher::dispatch
//!   │                ├── ImageBoot       → WorkerPool: InstallTask::start, then post_boot
//!   │                ├── AlternateVendor → AlternateBoot::boot
//!   │                └── Unknown         → DeployError::UnknownHardware
//!   ├── POST     PhaseHook (postconfig commands)
//!   └── PhaseLedger::finish → PhaseReport
//! ```
//!
//! Fatal conditions are returned as [`DeployError`]; mapping them to a
//! process exit status is left to the caller.

pub mod alternate;
pub mod classify;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod install;
pub mod orchestrator;
pub mod pool;
pub mod stage;
pub mod timer;
pub mod validate;

pub use alternate::AlternateIsoBoot;
pub use classify::{BmcProbe, HardwareClass, HardwareProbe};
pub use dispatch::{AlternateBoot, InstallDispatcher, InstallTask, InstallTaskFactory, NetworkContext};
pub use error::{DeployError, DeployResult};
pub use hooks::{CommandHook, PhaseHook};
pub use install::{ImageBootFactory, ImageBootNode};
pub use orchestrator::{Collaborators, IsoDeployer};
pub use pool::{Completion, DeploymentFuture, Resolver, WorkerPool};
pub use timer::{PhaseLedger, PhaseReport, RunningPhase, format_elapsed};
pub use validate::{NodeIdentity, ValidatedCluster, validate_cluster};
