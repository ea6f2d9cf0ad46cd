//! Remote session error types.

use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot reach {host}: {reason}")]
    Connection { host: String, reason: String },

    #[error("authentication as {user}@{host} failed")]
    Authentication { host: String, user: String },

    #[error("`{command}` on {host} exited with status {status}: {stderr}")]
    Command {
        host: String,
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },
}
