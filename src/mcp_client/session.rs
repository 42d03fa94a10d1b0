//! Protocol session on top of a [`Channel`].
//!
//! Wraps the three MCP operations the client consumes (`initialize`,
//! `tools/list`, `tools/call`) and owns the channel it was opened on.

use super::errors::McpError;
use super::transport::{extract_result, next_request_id, Channel};
use super::types::{
    ImplementationInfo, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsResult, RemoteTool, ToolCallResult, PROTOCOL_VERSION,
};

/// Client name announced in the handshake.
const CLIENT_NAME: &str = "skilder-mcp";

/// One MCP session over one channel.
pub struct McpSession {
    channel: Box<dyn Channel>,
}

impl McpSession {
    pub fn new(channel: Box<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Perform the `initialize` handshake, then send `notifications/initialized`.
    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: serde_json::json!({}),
            client_info: ImplementationInfo {
                name: CLIENT_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let response = self
            .channel
            .request(JsonRpcRequest::new(
                next_request_id(),
                "initialize",
                Some(serde_json::to_value(&params)?),
            ))
            .await?;

        let result = extract_result(response).map_err(|e| McpError::InitFailed {
            reason: e.to_string(),
        })?;

        let init: InitializeResult =
            serde_json::from_value(result).map_err(|e| McpError::InitFailed {
                reason: format!("failed to parse initialize response: {e}"),
            })?;

        self.channel
            .notify(JsonRpcNotification::new("notifications/initialized", None))
            .await?;

        Ok(init)
    }

    /// Fetch the runtime's current tool list.
    pub async fn list_tools(&self) -> Result<Vec<RemoteTool>, McpError> {
        let response = self
            .channel
            .request(JsonRpcRequest::new(next_request_id(), "tools/list", None))
            .await?;

        let result = extract_result(response)?;
        let listed: ListToolsResult =
            serde_json::from_value(result).map_err(|e| McpError::InvalidResponse {
                method: "tools/list".into(),
                reason: e.to_string(),
            })?;

        Ok(listed.tools)
    }

    /// Call a tool. Arguments are passed through unmodified.
    ///
    /// A JSON-RPC error answer is a failed call, not a broken session, so it
    /// comes back as an error-flagged result. Transport failures are raised.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolCallResult, McpError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let response = self
            .channel
            .request(JsonRpcRequest::new(
                next_request_id(),
                "tools/call",
                Some(params),
            ))
            .await?;

        match extract_result(response) {
            Ok(result) => {
                serde_json::from_value(result).map_err(|e| McpError::InvalidResponse {
                    method: "tools/call".into(),
                    reason: e.to_string(),
                })
            }
            Err(McpError::ServerError { code, message, .. }) => {
                Ok(ToolCallResult::error_text(format!("[{code}] {message}")))
            }
            Err(e) => Err(e),
        }
    }

    /// Close the underlying channel.
    pub async fn close(&self) -> Result<(), McpError> {
        self.channel.close().await
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
