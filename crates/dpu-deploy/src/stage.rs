//! Helpers shared by the concrete boot strategies: image staging on
//! the controller, boot command templates, and waiting for the node.

use std::path::Path;
use std::time::Duration;

use dpu_core::ImageSource;
use dpu_remote::RemoteSession;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};
use crate::timer::format_elapsed;

pub const SSH_PORT: u16 = 22;

/// Replace each `{key}` in `template` with its value.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), &shell_quote(value))
    })
}

/// Single-quote `value` for a POSIX shell unless it is plainly safe.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Put `image` under `staging_dir` on the controller and return its remote path.
///
/// URLs are fetched by the controller itself; local files are copied over
/// the session.
pub async fn stage_image(session: &dyn RemoteSession, image: &ImageSource, staging_dir: &str) -> DeployResult<String> {
    let dir = staging_dir.trim_end_matches('/');
    let dir = if dir.is_empty() { "/" } else { dir };
    let remote = format!("{}/{}", dir.trim_end_matches('/'), image.file_name());

    session.run_checked(&format!("mkdir -p {}", shell_quote(dir))).await?;
    match image {
        ImageSource::Http { url } => {
            info!(host = %session.host(), %url, %remote, "controller fetching install image");
            session
                .run_checked(&format!("curl -fsSL -o {} {}", shell_quote(&remote), shell_quote(url)))
                .await?;
        }
        ImageSource::File { path } => {
            info!(host = %session.host(), %path, %remote, "uploading install image");
            session.upload(Path::new(path), &remote).await?;
        }
    }
    Ok(remote)
}

/// Poll `ip:port` until it accepts a connection or `limit` runs out.
///
/// A `limit` too large to add to the clock means no deadline.
pub async fn wait_for_port(node: &str, ip: &str, port: u16, limit: Duration, poll: Duration) -> DeployResult<()> {
    let poll = poll.max(Duration::from_millis(100));
    let deadline = Instant::now().checked_add(limit);
    info!(%node, %ip, limit = %format_elapsed(limit), "waiting for node to come up");

    loop {
        match timeout(poll, TcpStream::connect((ip, port))).await {
            Ok(Ok(_)) => {
                info!(%node, %ip, "node is reachable");
                return Ok(());
            }
            Ok(Err(e)) => debug!(%node, %ip, error = %e, "node not reachable yet"),
            Err(_) => debug!(%node, %ip, "connection attempt timed out"),
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(DeployError::Install {
                node: node.to_string(),
                reason: format!("{ip}:{port} not reachable after {}", format_elapsed(limit)),
            });
        }
        sleep(poll).await;
    }
}
