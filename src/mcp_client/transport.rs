//! JSON-RPC over stdio transport.
//!
//! Handles low-level communication with the runtime child process:
//! - Spawning the process from a [`LaunchSpec`]
//! - Writing JSON-RPC requests to stdin
//! - Reading JSON-RPC responses from stdout
//! - Line-delimited JSON protocol (one JSON object per line)
//!
//! The [`Launcher`] and [`Channel`] traits are the seam the session runner
//! talks to, so the lifecycle can run against in-memory channels.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::config::LaunchSpec;
use super::errors::McpError;
use super::types::{error_codes, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Time the runtime gets to exit after its stdin is closed, before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ─── Request ID Generator ────────────────────────────────────────────────────

/// Global monotonic request ID counter.
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a unique request ID.
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

// ─── Seams ───────────────────────────────────────────────────────────────────

/// A duplex JSON-RPC message channel to the runtime.
///
/// Implementations are not required to support concurrent requests; callers
/// serialize them.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Send a request and wait for the response with the same id.
    async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, McpError>;

    /// Send a notification (no response expected).
    async fn notify(&self, notification: JsonRpcNotification) -> Result<(), McpError>;

    /// Close the channel and release the underlying process. Idempotent.
    async fn close(&self) -> Result<(), McpError>;
}

/// Produces a [`Channel`] for a launch spec.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn Channel>, McpError>;
}

// ─── Process Launcher ────────────────────────────────────────────────────────

/// Spawns the runtime as a child process speaking JSON-RPC over stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn Channel>, McpError> {
        let transport = StdioTransport::spawn(spec)?;
        Ok(Box::new(transport))
    }
}

// ─── Transport ───────────────────────────────────────────────────────────────

/// Bi-directional JSON-RPC transport over a child process's stdio.
pub struct StdioTransport {
    command: String,
    child: Mutex<Option<Child>>,
    /// `None` once closed; dropping stdin signals EOF to the runtime.
    writer: Mutex<Option<ChildStdin>>,
    reader: Mutex<BufReader<ChildStdout>>,
}

impl StdioTransport {
    /// Spawn the process described by `spec` and wire up its stdio.
    ///
    /// The child inherits the parent environment plus `spec.env`, and is
    /// killed if the transport is dropped without being closed.
    pub fn spawn(spec: &LaunchSpec) -> Result<Self, McpError> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args);
        cmd.envs(&spec.env);

        // Windows: prevent console window from appearing for child processes
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| McpError::SpawnFailed {
            command: spec.command.clone(),
            reason: format!("{e}"),
        })?;

        let stdin = child.stdin.take().ok_or(McpError::SpawnFailed {
            command: spec.command.clone(),
            reason: "failed to capture stdin".into(),
        })?;

        let stdout = child.stdout.take().ok_or(McpError::SpawnFailed {
            command: spec.command.clone(),
            reason: "failed to capture stdout".into(),
        })?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(spec.command.clone(), stderr));
        }

        tracing::debug!(
            command = %spec.command,
            args = ?spec.args,
            pid = child.id(),
            "runtime process spawned"
        );

        Ok(Self {
            command: spec.command.clone(),
            child: Mutex::new(Some(child)),
            writer: Mutex::new(Some(stdin)),
            reader: Mutex::new(BufReader::new(stdout)),
        })
    }

    async fn write_line(&self, mut json: String) -> Result<(), McpError> {
        json.push('\n');

        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| McpError::TransportError {
            reason: "transport closed".into(),
        })?;
        writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| McpError::TransportError {
                reason: format!("failed to write to stdin: {e}"),
            })?;
        writer.flush().await.map_err(|e| McpError::TransportError {
            reason: format!("failed to flush stdin: {e}"),
        })
    }
}

#[async_trait]
impl Channel for StdioTransport {
    /// Write one line of JSON, then read lines until a response with a
    /// matching `id` arrives.
    async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, McpError> {
        let id = request.id;
        self.write_line(serde_json::to_string(&request)?).await?;

        let mut line_buf = String::new();
        let mut reader = self.reader.lock().await;

        loop {
            line_buf.clear();
            let bytes_read =
                reader
                    .read_line(&mut line_buf)
                    .await
                    .map_err(|e| McpError::TransportError {
                        reason: format!("failed to read from stdout: {e}"),
                    })?;

            if bytes_read == 0 {
                return Err(McpError::TransportError {
                    reason: "runtime stdout closed (process may have exited)".into(),
                });
            }

            let trimmed = line_buf.trim();
            if trimmed.is_empty() {
                continue;
            }

            let Ok(message) = serde_json::from_str::<serde_json::Value>(trimmed) else {
                tracing::trace!(line = trimmed, "ignoring non-JSON line");
                continue;
            };

            // Server requests may reuse our ids; anything with a method is
            // never a response.
            if message.get("method").is_some() {
                if let Some(reply) = reply_to_server_request(&message) {
                    self.write_line(reply.to_string()).await?;
                }
                continue;
            }

            match serde_json::from_value::<JsonRpcResponse>(message) {
                Ok(resp) if resp.id == id => return Ok(resp),
                Ok(resp) => {
                    tracing::debug!(expected = id, got = resp.id, "skipping stale response");
                }
                Err(_) => {
                    tracing::trace!(line = trimmed, "ignoring non-response line");
                }
            }
        }
    }

    async fn notify(&self, notification: JsonRpcNotification) -> Result<(), McpError> {
        self.write_line(serde_json::to_string(&notification)?).await
    }

    async fn close(&self) -> Result<(), McpError> {
        // Closing stdin is the stdio transport's shutdown signal.
        drop(self.writer.lock().await.take());

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(command = %self.command, %status, "runtime exited");
            }
            _ => {
                tracing::warn!(
                    command = %self.command,
                    grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
                    "runtime did not exit after stdin closed, killing"
                );
                let _ = child.kill().await;
            }
        }
        Ok(())
    }
}

/// Answer a server-initiated request: `ping` gets an empty result, any other
/// method is refused. Notifications (no `id`) get no reply.
fn reply_to_server_request(message: &serde_json::Value) -> Option<serde_json::Value> {
    let id = message.get("id").filter(|id| !id.is_null())?.clone();
    let method = message
        .get("method")
        .and_then(|m| m.as_str())
        .unwrap_or_default();
    tracing::debug!(method, "server-initiated request");

    let reply = if method == "ping" {
        serde_json::json!({"jsonrpc": "2.0", "id": id, "result": {}})
    } else {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {
                "code": error_codes::METHOD_NOT_FOUND,
                "message": format!("method not supported by client: {method}"),
            }
        })
    };
    Some(reply)
}

/// Forward the runtime's stderr to the log, one event per line.
async fn forward_stderr(command: String, stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !line.trim().is_empty() {
            tracing::debug!(command = %command, stderr = %line, "runtime stderr");
        }
    }
}

// ─── Response Helpers ────────────────────────────────────────────────────────

/// Extract the result from a JSON-RPC response, converting errors to `McpError`.
pub fn extract_result(response: JsonRpcResponse) -> Result<serde_json::Value, McpError> {
    if let Some(err) = response.error {
        return Err(McpError::ServerError {
            code: err.code,
            message: err.message,
            data: err.data,
        });
    }

    response.result.ok_or(McpError::ServerError {
        code: error_codes::INTERNAL_ERROR,
        message: "response missing both result and error".into(),
        data: None,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
