//! Shared types used across the deployment crates.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named stage of the deployment sequence.
///
/// The derived ordering is the execution order: `Pre < Masters < Post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    /// Host-side preparation before any node is touched.
    Pre,
    /// Installation of the master node.
    Masters,
    /// Cluster configuration once the master is up.
    Post,
}

impl Step {
    pub const ALL: [Step; 3] = [Step::Pre, Step::Masters, Step::Post];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Pre => "pre",
            Step::Masters => "masters",
            Step::Post => "post",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown step '{0}', expected one of: pre, masters, post")]
pub struct UnknownStep(pub String);

impl FromStr for Step {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pre" => Ok(Step::Pre),
            "masters" => Ok(Step::Masters),
            "post" => Ok(Step::Post),
            other => Err(UnknownStep(other.to_string())),
        }
    }
}

/// The set of phases selected for a run. Read-only once handed to the deployer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepSet(BTreeSet<Step>);

impl StepSet {
    pub fn all() -> Self {
        Step::ALL.into_iter().collect()
    }

    pub fn contains(&self, step: Step) -> bool {
        self.0.contains(&step)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Step> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Step> for StepSet {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        StepSet(iter.into_iter().collect())
    }
}

/// Parses a comma separated list such as `pre,masters,post`.
impl FromStr for StepSet {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Step::from_str)
            .collect()
    }
}

impl fmt::Display for StepSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|s| s.as_str()).collect();
        f.write_str(&names.join(","))
    }
}

/// Hardware kind a node descriptor is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Physical,
    Vm,
    Dpu,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Physical => "physical",
            NodeKind::Vm => "vm",
            NodeKind::Dpu => "dpu",
        };
        f.write_str(name)
    }
}
