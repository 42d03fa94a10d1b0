//! Skilder MCP client for agents.
//!
//! Gives agent code access to the tools of a Skilder skill without managing
//! the runtime process or the MCP handshake:
//!
//! ```rust,ignore
//! use skilder_mcp::{ClientOptions, McpClient};
//!
//! let client = McpClient::with_skill_key("SKL_...", ClientOptions::default())?;
//! let names = client
//!     .with_session(|mcp| async move {
//!         let tools = mcp.list_tools().await?;
//!         Ok::<_, skilder_mcp::McpError>(tools.iter().map(|t| t.name().to_string()).collect::<Vec<_>>())
//!     })
//!     .await??;
//! ```

pub mod mcp_client;

pub use mcp_client::{
    validate_auth, AgentTool, ClientConfig, ClientOptions, ConfigError, ContentItem,
    LifecycleState, McpClient, McpError, ToolCallResult, ToolDefinition,
};
