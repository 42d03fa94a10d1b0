//! MCP Client — one lazily started Skilder runtime per client.
//!
//! This module handles:
//! - Validating the credential / skill-name combination
//! - Spawning the runtime child process (`npx @skilder-ai/runtime`)
//! - JSON-RPC 2.0 communication over process stdio
//! - The session runner task that owns the connection for its lifetime
//! - Start/stop with a bounded readiness wait, and serialized tool calls
//!
//! Agents use [`McpClient`] and never touch processes or handshakes.

pub mod client;
pub mod config;
pub mod errors;
pub mod lifecycle;
pub mod session;
pub mod tools;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-exports for convenience
pub use client::{LifecycleState, McpClient};
pub use config::{validate_auth, ClientConfig, ClientOptions, Credential, LaunchSpec};
pub use errors::{ConfigError, McpError};
pub use tools::AgentTool;
pub use transport::{Channel, Launcher, ProcessLauncher};
pub use types::{ContentItem, ToolCallResult, ToolDefinition};
