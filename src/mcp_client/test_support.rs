//! In-memory launchers and channels for lifecycle tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::config::LaunchSpec;
use super::errors::McpError;
use super::transport::{Channel, Launcher};
use super::types::{error_codes, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Counters shared between a launcher, its channels and the test body.
#[derive(Default)]
pub struct StubStats {
    launches: AtomicUsize,
    handshakes: AtomicUsize,
    closes: AtomicUsize,
    drops: AtomicUsize,
    overlaps: AtomicUsize,
    in_flight: AtomicUsize,
    notifications: Mutex<Vec<String>>,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    last_spec: Mutex<Option<LaunchSpec>>,
}

impl StubStats {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
    pub fn notifications(&self) -> Vec<String> {
        self.notifications.lock().unwrap().clone()
    }
    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }
    pub fn last_spec(&self) -> Option<LaunchSpec> {
        self.last_spec.lock().unwrap().clone()
    }
}

/// How a scripted runtime answers.
#[derive(Clone)]
pub struct StubBehavior {
    /// Answer `initialize` with a JSON-RPC error.
    pub fail_initialize: bool,
    /// Never answer `initialize`.
    pub hang_initialize: bool,
    /// Tools reported by `tools/list`.
    pub tools: Vec<serde_json::Value>,
    /// Delay before answering `tools/call`.
    pub call_delay: Duration,
    /// Never finish `close`.
    pub hang_close: bool,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            fail_initialize: false,
            hang_initialize: false,
            tools: vec![
                serde_json::json!({
                    "name": "echo",
                    "description": "Echo the arguments",
                    "inputSchema": {"type": "object", "properties": {}}
                }),
                serde_json::json!({"name": "fail", "inputSchema": null}),
            ],
            call_delay: Duration::ZERO,
            hang_close: false,
        }
    }
}

/// A channel that answers like a small runtime and rejects overlapping requests.
pub struct ScriptedChannel {
    behavior: StubBehavior,
    stats: Arc<StubStats>,
}

impl ScriptedChannel {
    pub fn new(behavior: StubBehavior) -> Self {
        Self::with_stats(behavior, Arc::new(StubStats::default()))
    }

    fn with_stats(behavior: StubBehavior, stats: Arc<StubStats>) -> Self {
        Self { behavior, stats }
    }

    pub fn stats(&self) -> Arc<StubStats> {
        self.stats.clone()
    }

    async fn answer(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id;
        match request.method.as_str() {
            "initialize" => {
                if self.behavior.hang_initialize {
                    std::future::pending::<()>().await;
                }
                self.stats.handshakes.fetch_add(1, Ordering::SeqCst);
                if self.behavior.fail_initialize {
                    return JsonRpcResponse::failure(id, error_codes::INTERNAL_ERROR, "nats unreachable");
                }
                JsonRpcResponse::success(
                    id,
                    serde_json::json!({
                        "protocolVersion": "2024-11-05",
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "stub-runtime", "version": "0.0.0"}
                    }),
                )
            }
            "tools/list" => {
                JsonRpcResponse::success(id, serde_json::json!({"tools": self.behavior.tools}))
            }
            "tools/call" => {
                let params = request.params.clone().unwrap_or_default();
                let name = params["name"].as_str().unwrap_or_default().to_string();
                let arguments = params["arguments"].clone();
                self.stats
                    .calls
                    .lock()
                    .unwrap()
                    .push((name.clone(), arguments.clone()));

                if !self.behavior.call_delay.is_zero() {
                    tokio::time::sleep(self.behavior.call_delay).await;
                }

                match name.as_str() {
                    "echo" => JsonRpcResponse::success(
                        id,
                        serde_json::json!({
                            "content": [{"type": "text", "text": format!("echo {arguments}")}],
                            "isError": false
                        }),
                    ),
                    "fail" => JsonRpcResponse::success(
                        id,
                        serde_json::json!({
                            "content": [{"type": "text", "text": "boom"}],
                            "isError": true
                        }),
                    ),
                    other => JsonRpcResponse::failure(
                        id,
                        error_codes::INVALID_PARAMS,
                        &format!("unknown tool: {other}"),
                    ),
                }
            }
            _ => JsonRpcResponse::failure(id, error_codes::METHOD_NOT_FOUND, "Method not found"),
        }
    }
}

/// Decrements the in-flight counter even if the request future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, McpError> {
        let previous = self.stats.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlight(&self.stats.in_flight);
        if previous > 0 {
            self.stats.overlaps.fetch_add(1, Ordering::SeqCst);
            return Err(McpError::TransportError {
                reason: "overlapping in-flight requests".into(),
            });
        }
        Ok(self.answer(&request).await)
    }

    async fn notify(&self, notification: JsonRpcNotification) -> Result<(), McpError> {
        self.stats
            .notifications
            .lock()
            .unwrap()
            .push(notification.method);
        Ok(())
    }

    async fn close(&self) -> Result<(), McpError> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        if self.behavior.hang_close {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

impl Drop for ScriptedChannel {
    fn drop(&mut self) {
        self.stats.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// What a [`StubLauncher`] does when asked for a channel.
#[derive(Clone)]
pub enum LaunchMode {
    /// Yield a scripted channel.
    Ready(StubBehavior),
    /// Never yield.
    Hang,
    /// Never yield on the first launch, then yield scripted channels.
    HangOnce(StubBehavior),
    /// Fail as if the command did not exist.
    Fail,
}

pub struct StubLauncher {
    mode: LaunchMode,
    stats: Arc<StubStats>,
}

impl StubLauncher {
    pub fn new(mode: LaunchMode) -> Self {
        Self {
            mode,
            stats: Arc::new(StubStats::default()),
        }
    }

    pub fn ready() -> Self {
        Self::new(LaunchMode::Ready(StubBehavior::default()))
    }

    pub fn stats(&self) -> Arc<StubStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Launcher for StubLauncher {
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn Channel>, McpError> {
        let previous = self.stats.launches.fetch_add(1, Ordering::SeqCst);
        *self.stats.last_spec.lock().unwrap() = Some(spec.clone());

        match &self.mode {
            LaunchMode::Ready(behavior) => Ok(Box::new(ScriptedChannel::with_stats(
                behavior.clone(),
                self.stats.clone(),
            ))),
            LaunchMode::HangOnce(_) if previous == 0 => std::future::pending().await,
            LaunchMode::HangOnce(behavior) => Ok(Box::new(ScriptedChannel::with_stats(
                behavior.clone(),
                self.stats.clone(),
            ))),
            LaunchMode::Hang => std::future::pending().await,
            LaunchMode::Fail => Err(McpError::SpawnFailed {
                command: spec.command.clone(),
                reason: "No such file or directory (os error 2)".into(),
            }),
        }
    }
}
