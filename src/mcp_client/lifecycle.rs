//! Session runner: the background task that owns one runtime connection.
//!
//! The runner launches the runtime, performs the handshake, hands the live
//! session to the controller over a oneshot, then parks until the stop signal
//! is raised and closes the channel on the way out.
//!
//! If the runner fails before the session is ready it drops the readiness
//! sender (so the waiter unblocks) and returns the failure as its task
//! output. If the task is aborted instead, the channel is dropped with the
//! task; process channels kill their child on drop.

use std::sync::Arc;

use tokio::sync::{oneshot, watch};

use super::config::LaunchSpec;
use super::errors::McpError;
use super::session::McpSession;
use super::transport::Launcher;

/// Output of a runner task.
pub type RunnerResult = Result<(), McpError>;

/// Run one session from launch to close.
pub async fn run_session(
    launcher: Arc<dyn Launcher>,
    spec: LaunchSpec,
    ready: oneshot::Sender<Arc<McpSession>>,
    mut stop: watch::Receiver<bool>,
) -> RunnerResult {
    let opened = tokio::select! {
        opened = open_session(launcher.as_ref(), &spec) => opened,
        _ = stop.wait_for(|requested| *requested) => {
            tracing::debug!(command = %spec.command, "stop requested before session was ready");
            return Ok(());
        }
    };

    let session = match opened {
        Ok(session) => Arc::new(session),
        Err(e) => {
            tracing::warn!(command = %spec.command, error = %e, "session runner failed to start");
            return Err(e);
        }
    };

    if ready.send(session.clone()).is_err() {
        tracing::debug!("startup waiter gone, closing session");
    } else {
        // A dropped sender also means nobody is left to stop us.
        let _ = stop.wait_for(|requested| *requested).await;
        tracing::debug!("stop requested, closing session");
    }

    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "error while closing runtime channel");
    }
    Ok(())
}

/// Launch the runtime and complete the handshake.
///
/// A channel whose handshake fails is closed before the error is returned.
async fn open_session(launcher: &dyn Launcher, spec: &LaunchSpec) -> Result<McpSession, McpError> {
    let channel = launcher.launch(spec).await?;
    let session = McpSession::new(channel);

    match session.initialize().await {
        Ok(init) => {
            let (server, version) = init
                .server_info
                .map(|info| (info.name, info.version))
                .unwrap_or_default();
            tracing::info!(
                server = %server,
                version = %version,
                protocol = init.protocol_version.as_deref().unwrap_or("unknown"),
                "MCP session ready"
            );
            Ok(session)
        }
        Err(e) => {
            let _ = session.close().await;
            Err(e)
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
