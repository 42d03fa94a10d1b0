//! Client configuration and authentication validation.
//!
//! A `ClientConfig` only exists once its credentials passed `validate_auth`,
//! so a runtime process is never spawned for an invalid combination. The
//! config is also the single source of the runtime's launch command and
//! environment.

use std::collections::BTreeMap;
use std::time::Duration;

use super::errors::ConfigError;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Default NATS endpoint handed to the runtime.
pub const DEFAULT_NATS_SERVERS: &str = "nats://localhost:4222";

/// Default npm version of the runtime package.
pub const DEFAULT_RUNTIME_VERSION: &str = "latest";

/// npm package executed through `npx`.
pub const RUNTIME_PACKAGE: &str = "@skilder-ai/runtime";

/// Default time allowed for the runtime to finish its handshake.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(20);

/// Environment keys read by the runtime.
pub mod env_keys {
    pub const SKILL_NAME: &str = "SKILL_NAME";
    pub const WORKSPACE_KEY: &str = "WORKSPACE_KEY";
    pub const SKILL_KEY: &str = "SKILL_KEY";
    pub const NATS_SERVERS: &str = "NATS_SERVERS";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Check the name / credential combination.
///
/// Rules:
/// - exactly one of `workspace_key` or `skill_key` must be provided
/// - `workspace_key` requires `name`
/// - `skill_key` must not come with `name`
///
/// Empty strings count as absent.
pub fn validate_auth(
    name: Option<&str>,
    workspace_key: Option<&str>,
    skill_key: Option<&str>,
) -> Result<(), ConfigError> {
    let has_name = present(name).is_some();
    let has_workspace_key = present(workspace_key).is_some();
    let has_skill_key = present(skill_key).is_some();

    match (has_workspace_key, has_skill_key) {
        (false, false) => Err(ConfigError::MissingCredential),
        (true, true) => Err(ConfigError::ConflictingCredentials),
        (true, false) if !has_name => Err(ConfigError::MissingName),
        (false, true) if has_name => Err(ConfigError::UnexpectedName),
        _ => Ok(()),
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Tunables that do not affect authentication.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// NATS connection URL used by the runtime.
    pub nats_servers: String,
    /// npm version/range of the runtime package.
    pub version: String,
    /// Max time to wait for the session handshake.
    pub startup_timeout: Duration,
    /// Max time to wait for the runner to exit on stop. Defaults to `startup_timeout`.
    pub shutdown_timeout: Option<Duration>,
    /// Runtime log level (info, debug, warn). Forwarded only when set.
    pub log_level: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            nats_servers: DEFAULT_NATS_SERVERS.to_string(),
            version: DEFAULT_RUNTIME_VERSION.to_string(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            shutdown_timeout: None,
            log_level: None,
        }
    }
}

/// How the runtime authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Workspace-wide key; the named skill is discovered or created at runtime.
    Workspace { name: String, key: String },
    /// Key bound to a single pre-created skill.
    Skill { key: String },
}

/// Everything needed to launch a runtime process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

/// Validated, immutable client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    credential: Credential,
    options: ClientOptions,
    /// Overrides `npx @skilder-ai/runtime@<version>`.
    command_override: Option<(String, Vec<String>)>,
}

impl ClientConfig {
    /// Validate the credentials and build a config.
    pub fn new(
        name: Option<&str>,
        workspace_key: Option<&str>,
        skill_key: Option<&str>,
        options: ClientOptions,
    ) -> Result<Self, ConfigError> {
        validate_auth(name, workspace_key, skill_key)?;

        let credential = match (present(workspace_key), present(skill_key), present(name)) {
            (Some(key), None, Some(name)) => Credential::Workspace {
                name: name.to_string(),
                key: key.to_string(),
            },
            (None, Some(key), None) => Credential::Skill {
                key: key.to_string(),
            },
            // validate_auth rejected every other combination
            _ => return Err(ConfigError::MissingCredential),
        };

        Ok(Self {
            credential,
            options,
            command_override: None,
        })
    }

    /// Workspace key + skill name: the runtime creates or discovers the skill.
    pub fn with_workspace_key(
        name: &str,
        workspace_key: &str,
        options: ClientOptions,
    ) -> Result<Self, ConfigError> {
        Self::new(Some(name), Some(workspace_key), None, options)
    }

    /// Skill-specific key; access is limited to that one skill.
    pub fn with_skill_key(skill_key: &str, options: ClientOptions) -> Result<Self, ConfigError> {
        Self::new(None, None, Some(skill_key), options)
    }

    /// Launch a different runtime entry point (e.g. a local `node dist/index.js` build).
    pub fn with_runtime_command(mut self, command: &str, args: Vec<String>) -> Self {
        self.command_override = Some((command.to_string(), args));
        self
    }

    /// Skill name, when authenticating with a workspace key.
    pub fn name(&self) -> Option<&str> {
        match &self.credential {
            Credential::Workspace { name, .. } => Some(name),
            Credential::Skill { .. } => None,
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn startup_timeout(&self) -> Duration {
        self.options.startup_timeout
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.options
            .shutdown_timeout
            .unwrap_or(self.options.startup_timeout)
    }

    /// Build the process command, arguments and environment.
    pub fn launch_spec(&self) -> LaunchSpec {
        let (command, args) = match &self.command_override {
            Some((command, args)) => (command.clone(), args.clone()),
            None => (
                default_npx_command().to_string(),
                vec![format!("{RUNTIME_PACKAGE}@{}", self.options.version)],
            ),
        };

        let mut env = BTreeMap::new();
        env.insert(
            env_keys::NATS_SERVERS.to_string(),
            self.options.nats_servers.clone(),
        );

        match &self.credential {
            Credential::Workspace { name, key } => {
                env.insert(env_keys::WORKSPACE_KEY.to_string(), key.clone());
                env.insert(env_keys::SKILL_NAME.to_string(), name.clone());
            }
            Credential::Skill { key } => {
                env.insert(env_keys::SKILL_KEY.to_string(), key.clone());
            }
        }

        if let Some(level) = present(self.options.log_level.as_deref()) {
            env.insert(env_keys::LOG_LEVEL.to_string(), level.to_string());
        }

        LaunchSpec { command, args, env }
    }
}

/// Platform-correct npx command.
///
/// Windows requires `npx.cmd` because `npx` is a batch script.
fn default_npx_command() -> &'static str {
    if cfg!(target_os = "windows") {
        "npx.cmd"
    } else {
        "npx"
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
