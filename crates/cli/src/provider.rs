//! MCP tool provider: spawns the inventory server as a child process and
//! talks MCP over its stdio.
//!
//! Every call opens a fresh connection and closes it afterwards, so a crashed
//! or wedged server only ever costs the call that hit it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use netops_agent::conversation::arguments_to_json;
use netops_agent::{ProviderCallOutput, ProviderToolSpec, ToolArguments, ToolProvider, ToolProviderError};
use netops_core::config::McpConfig;
use rmcp::model::{CallToolRequestParam, CallToolResult, Tool};
use rmcp::service::{RoleClient, RunningService};
use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
use rmcp::ServiceExt;
use serde_json::Value;
use tokio::process::Command;

pub struct McpToolProvider {
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl McpToolProvider {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self { command: command.into(), args, env: BTreeMap::new() }
    }

    pub fn from_config(config: &McpConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone())
    }

    /// Adds an environment variable for the spawned server.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn connect(&self) -> Result<RunningService<RoleClient, ()>, ToolProviderError> {
        let command = Command::new(&self.command).configure(|cmd| {
            cmd.args(&self.args);
            cmd.envs(&self.env);
        });
        let transport = TokioChildProcess::new(command).map_err(|error| {
            ToolProviderError::Connect(format!("could not spawn `{}`: {error}", self.command))
        })?;

        ().serve(transport).await.map_err(|error| {
            ToolProviderError::Connect(format!("MCP handshake with `{}` failed: {error}", self.command))
        })
    }
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    async fn list_tools(&self) -> Result<Vec<ProviderToolSpec>, ToolProviderError> {
        let client = self.connect().await?;
        let listed = client.list_all_tools().await;
        close(client).await;

        let tools = listed.map_err(|error| ToolProviderError::Request(error.to_string()))?;
        tracing::debug!(
            event_name = "cli.mcp.tools.listed",
            command = %self.command,
            tool_count = tools.len(),
            "tool provider listed tools"
        );
        Ok(tools.into_iter().map(provider_spec).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ProviderCallOutput, ToolProviderError> {
        let client = self.connect().await?;
        let called = client
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments_to_json(arguments)),
            })
            .await;
        close(client).await;

        let result = called.map_err(|error| ToolProviderError::Request(error.to_string()))?;
        Ok(call_output(result))
    }
}

async fn close(client: RunningService<RoleClient, ()>) {
    if let Err(error) = client.cancel().await {
        tracing::debug!(
            event_name = "cli.mcp.close.failed",
            error = %error,
            "tool provider connection did not close cleanly"
        );
    }
}

fn provider_spec(tool: Tool) -> ProviderToolSpec {
    let description = tool.description.as_deref().unwrap_or_default().to_string();
    ProviderToolSpec::new(
        tool.name.to_string(),
        description,
        Value::Object(tool.input_schema.as_ref().clone()),
    )
}

/// Text blocks in order; structured content stands in when there is no text.
fn call_output(result: CallToolResult) -> ProviderCallOutput {
    let mut text_blocks: Vec<String> = result
        .content
        .iter()
        .filter_map(|content| content.raw.as_text().map(|text| text.text.clone()))
        .collect();
    if text_blocks.is_empty() {
        if let Some(structured) = &result.structured_content {
            text_blocks.push(structured.to_string());
        }
    }
    ProviderCallOutput { text_blocks, is_error: result.is_error.unwrap_or(false) }
}

#[cfg(test)]
mod tests {
    use netops_core::config::McpConfig;
    use rmcp::model::{CallToolResult, Content};
    use serde_json::json;

    use super::{call_output, McpToolProvider};

    #[test]
    fn error_results_keep_their_text() {
        let output = call_output(CallToolResult::error(vec![Content::text("Error: 503")]));

        assert!(output.is_error);
        assert_eq!(output.text_blocks, vec!["Error: 503".to_string()]);
    }

    #[test]
    fn text_blocks_are_kept_in_order() {
        let output = call_output(CallToolResult::success(vec![
            Content::text("first"),
            Content::text("second"),
        ]));

        assert!(!output.is_error);
        assert_eq!(output.text_blocks, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn structured_content_fills_in_for_missing_text() {
        let mut result = CallToolResult::success(Vec::new());
        result.structured_content = Some(json!({"count": 3}));

        assert_eq!(call_output(result).text_blocks, vec![r#"{"count":3}"#.to_string()]);
    }

    #[test]
    fn built_from_config() {
        let config = McpConfig {
            command: "netops-mcp".to_string(),
            args: vec!["--stdio".to_string()],
            call_timeout_secs: 30,
        };
        let provider = McpToolProvider::from_config(&config).with_env("NETOPS_LOGGING_LEVEL", "warn");

        assert_eq!(provider.command(), "netops-mcp");
        assert_eq!(provider.args, vec!["--stdio".to_string()]);
        assert_eq!(provider.env.get("NETOPS_LOGGING_LEVEL").map(String::as_str), Some("warn"));
    }
}
