use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use netops_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Sources {
    file_doc: Option<Value>,
    file_path: Option<PathBuf>,
    model_flag: bool,
    log_level_flag: bool,
}

pub fn run(options: LoadOptions, explicit_path: Option<&Path>) -> String {
    let model_flag = options.overrides.llm_model.is_some();
    let log_level_flag = options.overrides.log_level.is_some();
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let file_path = detect_config_path(explicit_path);
    let sources = Sources {
        file_doc: load_config_file_doc(file_path.as_deref()),
        file_path,
        model_flag,
        log_level_flag,
    };
    render(&config, &sources)
}

fn render(config: &AppConfig, sources: &Sources) -> String {
    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    let mut push = |key: &str, value: &str, env_keys: &[&str], flag: Option<&str>| {
        lines.push(render_line(key, value, field_source(key, env_keys, flag, sources)));
    };

    push("llm.base_url", &config.llm.base_url, &["NETOPS_LLM_BASE_URL", "OLLAMA_HOST"], None);
    push(
        "llm.model",
        &config.llm.model,
        &["NETOPS_LLM_MODEL", "MODEL_NAME"],
        sources.model_flag.then_some("--model"),
    );
    push(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        &["NETOPS_LLM_TIMEOUT_SECS"],
        None,
    );

    push("mcp.command", &config.mcp.command, &["NETOPS_MCP_COMMAND"], None);
    push("mcp.args", &format!("{:?}", config.mcp.args), &["NETOPS_MCP_ARGS"], None);
    push(
        "mcp.call_timeout_secs",
        &config.mcp.call_timeout_secs.to_string(),
        &["NETOPS_MCP_CALL_TIMEOUT_SECS"],
        None,
    );

    push("netbox.url", &config.netbox.url, &["NETOPS_NETBOX_URL", "NETBOX_URL"], None);
    push(
        "netbox.token",
        &redact_token(config.netbox.token.expose_secret()),
        &["NETOPS_NETBOX_TOKEN", "NETBOX_TOKEN"],
        None,
    );
    push(
        "netbox.timeout_secs",
        &config.netbox.timeout_secs.to_string(),
        &["NETOPS_NETBOX_TIMEOUT_SECS"],
        None,
    );
    push(
        "netbox.page_size",
        &config.netbox.page_size.to_string(),
        &["NETOPS_NETBOX_PAGE_SIZE"],
        None,
    );

    let prompt_path = config
        .agent
        .system_prompt_path
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<built-in>".to_string());
    push(
        "agent.system_prompt_path",
        &prompt_path,
        &["NETOPS_AGENT_SYSTEM_PROMPT_PATH"],
        None,
    );

    push(
        "logging.level",
        &config.logging.level,
        &["NETOPS_LOGGING_LEVEL", "NETOPS_LOG_LEVEL"],
        sources.log_level_flag.then_some("--log-level"),
    );
    push(
        "logging.format",
        &format!("{:?}", config.logging.format),
        &["NETOPS_LOGGING_FORMAT", "NETOPS_LOG_FORMAT"],
        None,
    );

    lines.join("\n")
}

fn detect_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("netops.toml"), PathBuf::from("config/netops.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(key_path: &str, env_keys: &[&str], flag: Option<&str>, sources: &Sources) -> String {
    if let Some(flag) = flag {
        return format!("flag ({flag})");
    }

    if let Some(env_key) = env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false))
    {
        return format!("env ({env_key})");
    }

    if let Some(doc) = &sources.file_doc {
        if contains_path(doc, key_path) {
            let file_path = sources
                .file_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.len() > 8 && trimmed.is_ascii() {
        return format!("{}***", &trimmed[..4]);
    }
    "<redacted>".to_string()
}
