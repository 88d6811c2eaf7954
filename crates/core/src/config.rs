use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub mcp: McpConfig,
    pub netbox: NetboxConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// How the agent reaches the tool provider. Every tool call spawns `command`
/// with `args` and talks MCP over its stdio.
#[derive(Clone, Debug)]
pub struct McpConfig {
    pub command: String,
    pub args: Vec<String>,
    pub call_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NetboxConfig {
    pub url: String,
    pub token: SecretString,
    pub timeout_secs: u64,
    pub page_size: u32,
}

#[derive(Clone, Debug, Default)]
pub struct AgentConfig {
    pub system_prompt_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub mcp_command: Option<String>,
    pub netbox_url: Option<String>,
    pub netbox_token: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3".to_string(),
                timeout_secs: 120,
            },
            mcp: McpConfig {
                command: "netops-mcp".to_string(),
                args: Vec::new(),
                call_timeout_secs: 60,
            },
            netbox: NetboxConfig {
                url: "http://localhost:8080".to_string(),
                token: String::new().into(),
                timeout_secs: 30,
                page_size: 1000,
            },
            agent: AgentConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("netops.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(mcp) = patch.mcp {
            if let Some(command) = mcp.command {
                self.mcp.command = command;
            }
            if let Some(args) = mcp.args {
                self.mcp.args = args;
            }
            if let Some(call_timeout_secs) = mcp.call_timeout_secs {
                self.mcp.call_timeout_secs = call_timeout_secs;
            }
        }

        if let Some(netbox) = patch.netbox {
            if let Some(url) = netbox.url {
                self.netbox.url = url;
            }
            if let Some(netbox_token_value) = netbox.token {
                self.netbox.token = secret_value(netbox_token_value);
            }
            if let Some(timeout_secs) = netbox.timeout_secs {
                self.netbox.timeout_secs = timeout_secs;
            }
            if let Some(page_size) = netbox.page_size {
                self.netbox.page_size = page_size;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(system_prompt_path) = agent.system_prompt_path {
                self.agent.system_prompt_path = Some(system_prompt_path);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let llm_base_url = read_env("NETOPS_LLM_BASE_URL").or_else(|| read_env("OLLAMA_HOST"));
        if let Some(value) = llm_base_url {
            self.llm.base_url = value;
        }
        let llm_model = read_env("NETOPS_LLM_MODEL").or_else(|| read_env("MODEL_NAME"));
        if let Some(value) = llm_model {
            self.llm.model = value;
        }
        if let Some(value) = read_env("NETOPS_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("NETOPS_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("NETOPS_MCP_COMMAND") {
            self.mcp.command = value;
        }
        if let Some(value) = read_env("NETOPS_MCP_ARGS") {
            self.mcp.args = value.split_whitespace().map(str::to_string).collect();
        }
        if let Some(value) = read_env("NETOPS_MCP_CALL_TIMEOUT_SECS") {
            self.mcp.call_timeout_secs = parse_u64("NETOPS_MCP_CALL_TIMEOUT_SECS", &value)?;
        }

        let netbox_url = read_env("NETOPS_NETBOX_URL").or_else(|| read_env("NETBOX_URL"));
        if let Some(value) = netbox_url {
            self.netbox.url = value;
        }
        let netbox_token = read_env("NETOPS_NETBOX_TOKEN").or_else(|| read_env("NETBOX_TOKEN"));
        if let Some(value) = netbox_token {
            self.netbox.token = secret_value(value);
        }
        if let Some(value) = read_env("NETOPS_NETBOX_TIMEOUT_SECS") {
            self.netbox.timeout_secs = parse_u64("NETOPS_NETBOX_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("NETOPS_NETBOX_PAGE_SIZE") {
            self.netbox.page_size = parse_u32("NETOPS_NETBOX_PAGE_SIZE", &value)?;
        }

        if let Some(value) = read_env("NETOPS_AGENT_SYSTEM_PROMPT_PATH") {
            self.agent.system_prompt_path = Some(PathBuf::from(value));
        }

        let log_level = read_env("NETOPS_LOGGING_LEVEL").or_else(|| read_env("NETOPS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("NETOPS_LOGGING_FORMAT").or_else(|| read_env("NETOPS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(mcp_command) = overrides.mcp_command {
            self.mcp.command = mcp_command;
        }
        if let Some(netbox_url) = overrides.netbox_url {
            self.netbox.url = netbox_url;
        }
        if let Some(netbox_token) = overrides.netbox_token {
            self.netbox.token = secret_value(netbox_token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_mcp(&self.mcp)?;
        validate_netbox(&self.netbox)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

impl NetboxConfig {
    /// The inventory server cannot start without a token; the chat client never
    /// talks to NetBox directly, so this is checked by the server only.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        let token = self.token.expose_secret();
        if token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "netbox.token is required. Create one in NetBox under Admin > API Tokens"
                    .to_string(),
            ));
        }
        Ok(token)
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("netops.toml"), PathBuf::from("config/netops.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_mcp(mcp: &McpConfig) -> Result<(), ConfigError> {
    if mcp.command.trim().is_empty() {
        return Err(ConfigError::Validation(
            "mcp.command must name the tool provider executable".to_string(),
        ));
    }

    if mcp.call_timeout_secs == 0 || mcp.call_timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "mcp.call_timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    Ok(())
}

fn validate_netbox(netbox: &NetboxConfig) -> Result<(), ConfigError> {
    if !is_http_url(&netbox.url) {
        return Err(ConfigError::Validation(
            "netbox.url must start with http:// or https://".to_string(),
        ));
    }

    if netbox.timeout_secs == 0 || netbox.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "netbox.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if netbox.page_size == 0 {
        return Err(ConfigError::Validation(
            "netbox.page_size must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    mcp: Option<McpPatch>,
    netbox: Option<NetboxPatch>,
    agent: Option<AgentPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct McpPatch {
    command: Option<String>,
    args: Option<Vec<String>>,
    call_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NetboxPatch {
    url: Option<String>,
    token: Option<String>,
    timeout_secs: Option<u64>,
    page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    system_prompt_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
