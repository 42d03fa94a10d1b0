//! MCP Client error types.

use thiserror::Error;

/// Invalid credential / name combination, detected before anything is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Neither a workspace key nor a skill key was supplied.
    #[error(
        "Authentication required: provide either 'workspace_key' (with 'name') or 'skill_key'. \
         Get keys from the Skilder UI: Settings > API Keys (workspace key) or Skills page (skill key)."
    )]
    MissingCredential,

    /// Both key types were supplied.
    #[error("Authentication conflict: provide either 'workspace_key' or 'skill_key', not both.")]
    ConflictingCredentials,

    /// A workspace key was supplied without a skill name.
    #[error(
        "When using 'workspace_key' (workspace key), you must provide a 'name' parameter to identify the skill."
    )]
    MissingName,

    /// A skill key was supplied together with a skill name.
    #[error(
        "When using 'skill_key', do not provide a 'name' parameter. The skill is identified by the key itself."
    )]
    UnexpectedName,
}

/// Errors that can occur during MCP client operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// The client configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The runtime process failed to start.
    #[error("failed to spawn runtime '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    /// The initialization handshake failed.
    #[error("runtime initialization failed: {reason}")]
    InitFailed { reason: String },

    /// JSON-RPC communication error (malformed message, I/O error, closed pipe).
    #[error("transport error: {reason}")]
    TransportError { reason: String },

    /// Runtime returned a JSON-RPC error response.
    #[error("server error [{code}]: {message}")]
    ServerError {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// A response arrived but its payload did not match the expected shape.
    #[error("invalid '{method}' response: {reason}")]
    InvalidResponse { method: String, reason: String },

    /// Readiness was not reached within the configured startup timeout.
    #[error(
        "MCP runtime startup timed out after {timeout_ms}ms. \
         Ensure runtime can start and dependencies (e.g., NATS) are reachable."
    )]
    StartupTimeout { timeout_ms: u64 },

    /// The session runner failed during launch or handshake.
    #[error("MCP runtime failed to start: {source}")]
    StartupFailed {
        #[source]
        source: Box<McpError>,
    },

    /// The session runner ended without reporting an outcome (panic or abort).
    #[error("session runner aborted: {reason}")]
    RunnerAborted { reason: String },

    /// No live session right after a successful start. Indicates a logic defect.
    #[error("no live MCP session after start() succeeded")]
    SessionUnavailable,
}

impl McpError {
    /// Wrap a runner failure as a startup failure.
    pub fn startup_failed(source: McpError) -> Self {
        McpError::StartupFailed {
            source: Box::new(source),
        }
    }
}

impl From<serde_json::Error> for McpError {
    fn from(e: serde_json::Error) -> Self {
        McpError::TransportError {
            reason: format!("serialization error: {e}"),
        }
    }
}
