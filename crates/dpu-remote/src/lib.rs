//! dpu-remote: remote command sessions for BMCs and freshly booted nodes.
//!
//! The deployer only depends on the [`SessionConnector`] and
//! [`RemoteSession`] contracts. [`OpenSshConnector`] is the production
//! implementation and drives the system `ssh`/`scp` clients.
//!
//! # Architecture
//!
//! ```text
//! SessionConnector::connect(target)
//!   └── authenticates once, returns Box<dyn RemoteSession>
//!       ├── run(cmd)         → CommandOutput
//!       ├── run_checked(cmd) → CommandOutput, non-zero exit is an error
//!       └── upload(local, remote)
//! ```

pub mod error;
pub mod session;
pub mod ssh;

pub use error::{SessionError, SessionResult};
pub use session::{CommandOutput, RemoteSession, SessionConnector, SessionTarget};
pub use ssh::{OpenSshConnector, SshOptions};
