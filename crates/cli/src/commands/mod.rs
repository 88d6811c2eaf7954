pub mod ask;
pub mod chat;
pub mod config;
pub mod doctor;
pub mod tools;
pub mod topology;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use netops_agent::prompt::load_system_prompt;
use netops_agent::{DialogueOrchestrator, OllamaClient, Session, ToolDispatcher};
use netops_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

use crate::provider::McpToolProvider;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_TOOL_PROVIDER: u8 = 3;
pub const EXIT_MODEL: u8 = 4;
pub const EXIT_RUNTIME: u8 = 5;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Plain text output, printed as is.
    pub fn text(exit_code: u8, output: impl Into<String>) -> Self {
        Self { exit_code, output: output.into() }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config and starts logging, or explains why it could not.
pub(crate) fn prepare(command: &str, options: LoadOptions) -> Result<AppConfig, CommandResult> {
    let config = AppConfig::load(options).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })?;
    init_logging(&config);
    Ok(config)
}

pub(crate) fn runtime(command: &str) -> Result<tokio::runtime::Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            "runtime",
            format!("failed to initialize async runtime: {error}"),
            EXIT_RUNTIME,
        )
    })
}

/// Logs go to stderr so command output on stdout stays clean.
pub(crate) fn init_logging(config: &AppConfig) {
    use netops_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        Compact => builder.compact().try_init(),
        Pretty => builder.pretty().try_init(),
        Json => builder.json().try_init(),
    };
    if let Err(error) = installed {
        tracing::debug!(
            event_name = "cli.logging.already_installed",
            error = %error,
            "keeping the existing log subscriber"
        );
    }
}

/// The tool server inherits our environment; its own logging stays at warn
/// unless we are debugging too.
pub(crate) fn tool_provider(config: &AppConfig) -> McpToolProvider {
    let level = config.logging.level.trim().to_ascii_lowercase();
    let child_level = if matches!(level.as_str(), "debug" | "trace") { level } else { "warn".to_string() };
    McpToolProvider::from_config(&config.mcp).with_env("NETOPS_LOGGING_LEVEL", child_level)
}

pub(crate) fn call_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.mcp.call_timeout_secs)
}

/// Builds a fresh session: system prompt, model client and the provider's
/// tool registry.
pub(crate) async fn start_session(config: &AppConfig) -> anyhow::Result<DialogueOrchestrator> {
    let system_prompt = load_system_prompt(&config.agent)?;
    let llm = OllamaClient::new(&config.llm).context("failed to build language model client")?;
    let provider = Arc::new(tool_provider(config));
    let dispatcher = ToolDispatcher::connect(provider, call_timeout(config))
        .await
        .with_context(|| format!("failed to load tools from `{}`", config.mcp.command))?;

    let session = Session::new(system_prompt);
    tracing::info!(
        event_name = "cli.session.started",
        session_id = %session.id(),
        model = %llm.model(),
        tool_count = dispatcher.registry().len(),
        "chat session started"
    );
    Ok(DialogueOrchestrator::new(Arc::new(llm), dispatcher, session))
}

#[cfg(test)]
mod tests {
    use netops_core::config::{AppConfig, LogFormat};

    use super::init_logging;

    #[test]
    fn logging_setup_tolerates_repeated_commands() {
        let mut config = AppConfig::default();
        init_logging(&config);

        config.logging.format = LogFormat::Json;
        init_logging(&config);
    }
}
