//! List the tools of a Skilder skill, or call one of them.
//!
//! Credentials come from the environment:
//! - `WORKSPACE_KEY` + `SKILL_NAME` (auto-discovery), or
//! - `SKILL_KEY` (skill-specific key)
//!
//! Optional: `NATS_SERVERS`, `SKILDER_RUNTIME_VERSION`, `LOG_LEVEL`.
//!
//! Usage:
//!   skilder-tools                      # list tools
//!   skilder-tools <tool> '<json args>' # call a tool

use anyhow::{bail, Context};
use skilder_mcp::{ClientConfig, ClientOptions, McpClient};

fn init_tracing() {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("skilder_mcp=info,warn"));

    fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn config_from_env() -> anyhow::Result<ClientConfig> {
    let mut options = ClientOptions::default();
    if let Some(servers) = env_opt("NATS_SERVERS") {
        options.nats_servers = servers;
    }
    if let Some(version) = env_opt("SKILDER_RUNTIME_VERSION") {
        options.version = version;
    }
    options.log_level = env_opt("LOG_LEVEL");

    let name = env_opt("SKILL_NAME");
    let workspace_key = env_opt("WORKSPACE_KEY");
    let skill_key = env_opt("SKILL_KEY");

    ClientConfig::new(
        name.as_deref(),
        workspace_key.as_deref(),
        skill_key.as_deref(),
        options,
    )
    .context("invalid Skilder credentials in environment")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let call = match (args.next(), args.next()) {
        (Some(tool), raw) => {
            let raw = raw.unwrap_or_else(|| "{}".to_string());
            let arguments: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| format!("arguments are not JSON: {raw}"))?;
            if !arguments.is_object() {
                bail!("tool arguments must be a JSON object");
            }
            Some((tool, arguments))
        }
        (None, _) => None,
    };

    let client = McpClient::new(config_from_env()?);

    client
        .with_session(|mcp| async move {
            match call {
                None => {
                    let tools = mcp.list_tools().await?;
                    println!("Found {} tools:", tools.len());
                    for tool in &tools {
                        println!("  - {}: {}", tool.name(), tool.description());
                    }
                }
                Some((name, arguments)) => {
                    let Some(tool) = mcp.get_tool_by_name(&name).await? else {
                        bail!("no tool named '{name}'");
                    };
                    println!("{}", mcp.invoke(&tool, arguments).await);
                }
            }
            Ok(())
        })
        .await?
}
