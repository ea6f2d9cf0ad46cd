pub mod config;
pub mod source;
pub mod types;

pub use config::{AUTO, BmcConfig, ClusterConfig, ConfigError, ConfigResult, DeployTuning, MasterConfig};
pub use source::{ImageSource, SourceError};
pub use types::*;
