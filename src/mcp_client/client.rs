//! MCP Client — lazy runtime lifecycle plus the tool invocation surface.
//!
//! Lifecycle overview:
//! - Preferred: `client.with_session(|mcp| async move { ... })`, which stops
//!   the runtime on every exit path.
//! - The first `list_tools()` / `call_tool()` lazily calls `start()`, which
//!   launches a session runner and waits (bounded by the startup timeout)
//!   until the handshake completes.
//! - All tool operations reuse the one session and are serialized through a
//!   single gate, since the transport does not support concurrent requests.
//! - Without `with_session`, call `stop()` before dropping the client. `Drop`
//!   only raises the stop signal and aborts the runner as a last resort.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{oneshot, watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use super::config::{ClientConfig, ClientOptions};
use super::errors::{ConfigError, McpError};
use super::lifecycle::{run_session, RunnerResult};
use super::session::McpSession;
use super::tools::{render_outcome, AgentTool};
use super::transport::{Launcher, ProcessLauncher};
use super::types::{ToolCallResult, ToolDefinition};

// ─── Lifecycle State ─────────────────────────────────────────────────────────

/// Where the client is in its start/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Starting,
    Ready,
    Stopping,
}

/// Controller-side state. Only touched while holding the lifecycle lock.
struct Lifecycle {
    state: LifecycleState,
    /// At most one runner per client.
    runner: Option<JoinHandle<RunnerResult>>,
    /// Live session, present only while `Ready`.
    session: Option<Arc<McpSession>>,
}

impl Lifecycle {
    fn idle() -> Self {
        Self {
            state: LifecycleState::Idle,
            runner: None,
            session: None,
        }
    }
}

// ─── McpClient ───────────────────────────────────────────────────────────────

/// Client owning one private runtime process and its MCP session.
pub struct McpClient {
    config: ClientConfig,
    launcher: Arc<dyn Launcher>,
    lifecycle: Mutex<Lifecycle>,
    /// Stop-requested signal. Written only by the controller, read by the runner.
    stop_tx: watch::Sender<bool>,
    /// Serializes requests onto the shared session.
    call_gate: Mutex<()>,
}

impl McpClient {
    /// Create a client that spawns the runtime as a child process.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_launcher(config, Arc::new(ProcessLauncher))
    }

    /// Create a client with a custom launcher.
    pub fn with_launcher(config: ClientConfig, launcher: Arc<dyn Launcher>) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            config,
            launcher,
            lifecycle: Mutex::new(Lifecycle::idle()),
            stop_tx,
            call_gate: Mutex::new(()),
        }
    }

    /// Workspace key + skill name (auto-discovery).
    pub fn with_workspace_key(
        name: &str,
        workspace_key: &str,
        options: ClientOptions,
    ) -> Result<Self, ConfigError> {
        ClientConfig::with_workspace_key(name, workspace_key, options).map(Self::new)
    }

    /// Skill-specific key (recommended).
    pub fn with_skill_key(skill_key: &str, options: ClientOptions) -> Result<Self, ConfigError> {
        ClientConfig::with_skill_key(skill_key, options).map(Self::new)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Skill name, when authenticating with a workspace key.
    pub fn name(&self) -> Option<&str> {
        self.config.name()
    }

    /// Current lifecycle state.
    ///
    /// Takes the lifecycle lock, which `start()` and `stop()` hold for their
    /// whole wait, so this blocks until a running start or stop finishes.
    /// Do not poll it to watch progress. `Starting` is only observed after a start
    /// whose caller was cancelled mid-wait.
    pub async fn state(&self) -> LifecycleState {
        self.lifecycle.lock().await.state
    }

    pub async fn is_started(&self) -> bool {
        self.state().await == LifecycleState::Ready
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Start the runtime and wait for the handshake, unless already started.
    ///
    /// Safe to call multiple times; concurrent callers share one start
    /// attempt. On timeout or runner failure the client is back to `Idle`
    /// and `start()` may be retried.
    pub async fn start(&self) -> Result<(), McpError> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.start_locked(&mut lifecycle).await
    }

    /// Stop the runtime and clear all session state. A no-op when idle.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if let Some(Err(e)) = self.shutdown_locked(&mut lifecycle).await {
            tracing::warn!(error = %e, "session runner ended with error");
        }
    }

    /// Run `body` inside a started session and stop afterwards.
    ///
    /// The runtime is stopped whether `body` returns normally, returns an
    /// error value, or panics; a panic resumes once cleanup is done.
    pub async fn with_session<'a, F, Fut, T>(&'a self, body: F) -> Result<T, McpError>
    where
        F: FnOnce(&'a McpClient) -> Fut,
        Fut: Future<Output = T> + 'a,
    {
        self.start().await?;
        let outcome = AssertUnwindSafe(async { body(self).await })
            .catch_unwind()
            .await;
        self.stop().await;

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn start_locked(&self, lifecycle: &mut MutexGuard<'_, Lifecycle>) -> Result<(), McpError> {
        if lifecycle.state == LifecycleState::Ready {
            return Ok(());
        }

        // A previous start() whose caller was cancelled mid-wait.
        if lifecycle.runner.is_some() {
            tracing::debug!("tearing down abandoned start attempt");
            self.shutdown_locked(lifecycle).await;
        }

        let spec = self.config.launch_spec();
        tracing::info!(
            command = %spec.command,
            args = ?spec.args,
            skill = self.config.name().unwrap_or("-"),
            "starting MCP runtime"
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        self.stop_tx.send_replace(false);
        lifecycle.runner = Some(tokio::spawn(run_session(
            self.launcher.clone(),
            spec,
            ready_tx,
            self.stop_tx.subscribe(),
        )));
        lifecycle.state = LifecycleState::Starting;

        let timeout = self.config.startup_timeout();
        match tokio::time::timeout(timeout, ready_rx).await {
            Ok(Ok(session)) => {
                lifecycle.session = Some(session);
                lifecycle.state = LifecycleState::Ready;
                Ok(())
            }
            Ok(Err(_)) => {
                // The runner dropped the readiness sender: it failed or was stopped.
                let cause = match self.shutdown_locked(lifecycle).await {
                    Some(Err(e)) => e,
                    _ => McpError::RunnerAborted {
                        reason: "runner exited before the session was ready".into(),
                    },
                };
                Err(McpError::startup_failed(cause))
            }
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                tracing::warn!(timeout_ms, "MCP runtime startup timed out");
                self.stop_tx.send_replace(true);
                if let Some(runner) = lifecycle.runner.take() {
                    runner.abort();
                    let _ = runner.await;
                }
                lifecycle.session = None;
                lifecycle.state = LifecycleState::Idle;
                Err(McpError::StartupTimeout { timeout_ms })
            }
        }
    }

    /// Signal the runner, wait for it (bounded), abort it if needed, and
    /// reset to `Idle`. Returns the runner's own outcome when it finished by
    /// itself, `None` when there was nothing to stop or it had to be aborted.
    async fn shutdown_locked(
        &self,
        lifecycle: &mut MutexGuard<'_, Lifecycle>,
    ) -> Option<RunnerResult> {
        if lifecycle.state == LifecycleState::Idle && lifecycle.runner.is_none() {
            return None;
        }

        lifecycle.state = LifecycleState::Stopping;
        self.stop_tx.send_replace(true);

        let outcome = match lifecycle.runner.take() {
            Some(mut runner) => {
                let grace = self.config.shutdown_timeout();
                match tokio::time::timeout(grace, &mut runner).await {
                    Ok(joined) => Some(joined.unwrap_or_else(|e| {
                        Err(McpError::RunnerAborted {
                            reason: e.to_string(),
                        })
                    })),
                    Err(_) => {
                        tracing::warn!(
                            grace_ms = grace.as_millis() as u64,
                            "session runner did not stop in time, cancelling"
                        );
                        runner.abort();
                        let _ = runner.await;
                        None
                    }
                }
            }
            None => None,
        };

        lifecycle.session = None;
        lifecycle.state = LifecycleState::Idle;
        tracing::debug!("MCP runtime stopped");
        outcome
    }

    /// Start if needed and hand out the live session.
    async fn live_session(&self) -> Result<Arc<McpSession>, McpError> {
        let mut lifecycle = self.lifecycle.lock().await;
        self.start_locked(&mut lifecycle).await?;
        lifecycle.session.clone().ok_or_else(|| {
            tracing::error!(state = ?lifecycle.state, "no live session after successful start");
            McpError::SessionUnavailable
        })
    }

    // ─── Tool Operations ─────────────────────────────────────────────────

    /// Fetch the current tool definitions. Starts the session on first use.
    ///
    /// Every call re-fetches; nothing is cached.
    pub async fn tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        let session = self.live_session().await?;
        let remote = {
            let _gate = self.call_gate.lock().await;
            session.list_tools().await?
        };

        tracing::debug!(count = remote.len(), "listed tools");
        Ok(remote.into_iter().map(ToolDefinition::from).collect())
    }

    /// Fetch the tools in agent-framework shape.
    pub async fn list_tools(&self) -> Result<Vec<AgentTool>, McpError> {
        Ok(self.tools().await?.into_iter().map(AgentTool::from).collect())
    }

    /// Same as [`list_tools`](Self::list_tools), for agent frameworks.
    pub async fn agent_tools(&self) -> Result<Vec<AgentTool>, McpError> {
        self.list_tools().await
    }

    /// Look up one tool by name in a freshly fetched list.
    pub async fn get_tool_by_name(&self, name: &str) -> Result<Option<AgentTool>, McpError> {
        Ok(self.list_tools().await?.into_iter().find(|t| t.name() == name))
    }

    /// Call a tool on the shared session.
    ///
    /// Arguments are passed as-is. The runtime's `content` and `isError` are
    /// returned verbatim; an error-flagged result is data, not an `Err`.
    /// Only transport or session failures are raised.
    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult, McpError> {
        let session = self.live_session().await?;
        let _gate = self.call_gate.lock().await;

        let result = session.call_tool(tool_name, arguments).await?;
        tracing::debug!(tool = tool_name, is_error = result.is_error, "tool call finished");
        Ok(result)
    }

    /// Execute an agent tool and render the outcome as text.
    ///
    /// Never fails: raised errors are rendered in-band for the agent.
    pub async fn invoke(&self, tool: &AgentTool, arguments: serde_json::Value) -> String {
        let outcome = self.call_tool(tool.name(), arguments).await;
        render_outcome(tool.name(), outcome)
    }
}

impl Drop for McpClient {
    /// Last-resort leak mitigation, not a shutdown path.
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
        if let Some(runner) = self.lifecycle.get_mut().runner.take() {
            runner.abort();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
