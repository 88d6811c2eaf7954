use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use netops_core::errors::AgentError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::conversation::{ArgValue, ToolArguments, ToolResult};

/// A tool as the provider advertises it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

impl ProviderToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self { name: name.into(), description: description.into(), input_schema }
    }
}

/// A tool in the model's function-calling convention:
/// `{"type": "function", "function": {"name", "description", "parameters"}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallableToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Converts provider tools into model-callable descriptions. Names and
/// descriptions are copied verbatim and schemas pass through untouched.
pub fn describe(tools: &[ProviderToolSpec]) -> Vec<CallableToolSpec> {
    tools
        .iter()
        .map(|tool| CallableToolSpec {
            kind: "function".to_string(),
            function: FunctionSpec {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            },
        })
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderCallOutput {
    pub text_blocks: Vec<String>,
    pub is_error: bool,
}

#[derive(Debug, Error)]
pub enum ToolProviderError {
    #[error("failed to connect to tool provider: {0}")]
    Connect(String),
    #[error("tool provider request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait ToolProvider: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ProviderToolSpec>, ToolProviderError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ProviderCallOutput, ToolProviderError>;
}

/// The provider's tool list, kept in advertised order.
#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ProviderToolSpec>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<ProviderToolSpec>) -> Self {
        let mut registry = Self::default();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Later registrations replace earlier ones with the same name.
    pub fn register(&mut self, tool: ProviderToolSpec) {
        match self.tools.iter_mut().find(|existing| existing.name == tool.name) {
            Some(existing) => *existing = tool,
            None => self.tools.push(tool),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ProviderToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(|tool| tool.name.as_str())
    }

    pub fn specs(&self) -> &[ProviderToolSpec] {
        &self.tools
    }

    pub fn describe(&self) -> Vec<CallableToolSpec> {
        describe(&self.tools)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Checks arguments against the tool's input schema: required properties,
/// scalar `type` declarations, and `additionalProperties: false`.
pub fn validate_arguments(
    tool: &ProviderToolSpec,
    arguments: &ToolArguments,
) -> Result<(), AgentError> {
    let invalid = |message: String| AgentError::InvalidToolArguments {
        name: tool.name.clone(),
        message,
    };
    let schema = &tool.input_schema;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !arguments.contains_key(key) {
                return Err(invalid(format!("missing required argument `{key}`")));
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in arguments {
        let declared = properties.and_then(|properties| properties.get(key));
        let Some(declared) = declared else {
            if closed {
                return Err(invalid(format!("unexpected argument `{key}`")));
            }
            continue;
        };
        if let Some(expected) = declared_types(declared) {
            if !expected.iter().any(|ty| type_matches(ty, value)) {
                return Err(invalid(format!(
                    "argument `{key}` should be {}, got {}",
                    expected.join(" or "),
                    value.json_type()
                )));
            }
        }
    }

    Ok(())
}

/// Scalar types a property declares. `None` when the property is untyped or
/// allows objects or arrays, which are not checked.
fn declared_types(property: &Value) -> Option<Vec<&str>> {
    let types: Vec<&str> = match property.get("type")? {
        Value::String(ty) => vec![ty.as_str()],
        Value::Array(types) => types.iter().filter_map(Value::as_str).collect(),
        _ => return None,
    };
    if types.is_empty() || types.iter().any(|ty| matches!(*ty, "object" | "array")) {
        return None;
    }
    Some(types)
}

fn type_matches(expected: &str, value: &ArgValue) -> bool {
    match (expected, value) {
        ("string", ArgValue::String(_)) => true,
        ("boolean", ArgValue::Bool(_)) => true,
        ("null", ArgValue::Null) => true,
        ("number", ArgValue::Number(_)) => true,
        ("integer", ArgValue::Number(_)) => value.json_type() == "integer",
        _ => false,
    }
}

/// Executes one tool call against the provider and turns every outcome into
/// a [`ToolResult`]. Dispatch never fails the caller.
pub struct ToolDispatcher {
    provider: Arc<dyn ToolProvider>,
    registry: ToolRegistry,
    call_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(provider: Arc<dyn ToolProvider>, registry: ToolRegistry, call_timeout: Duration) -> Self {
        Self { provider, registry, call_timeout }
    }

    /// Fetches the provider's tool list and builds a dispatcher around it.
    pub async fn connect(
        provider: Arc<dyn ToolProvider>,
        call_timeout: Duration,
    ) -> Result<Self, ToolProviderError> {
        let tools = provider.list_tools().await?;
        Ok(Self::new(provider, ToolRegistry::new(tools), call_timeout))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn invoke(&self, name: &str, arguments: &ToolArguments) -> ToolResult {
        match self.try_invoke(name, arguments).await {
            Ok(content) => {
                tracing::info!(
                    event_name = "agent.tool.dispatch.completed",
                    tool_name = name,
                    content_len = content.len(),
                    "tool call completed"
                );
                ToolResult::success(name, content)
            }
            Err(error) => {
                tracing::warn!(
                    event_name = "agent.tool.dispatch.failed",
                    tool_name = name,
                    error_class = error.error_class(),
                    error = %error,
                    "tool call failed"
                );
                ToolResult::failure(name, error.tool_turn_content())
            }
        }
    }

    async fn try_invoke(&self, name: &str, arguments: &ToolArguments) -> Result<String, AgentError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| AgentError::ToolNotFound { name: name.to_string() })?;
        validate_arguments(tool, arguments)?;

        let failure = |message: String| AgentError::ToolInvocationFailure {
            name: name.to_string(),
            message,
        };

        let output = tokio::time::timeout(self.call_timeout, self.provider.call_tool(name, arguments))
            .await
            .map_err(|_| failure(format!("timed out after {}s", self.call_timeout.as_secs())))?
            .map_err(|error| failure(error.to_string()))?;

        let content = output.text_blocks.join("\n");
        if output.is_error {
            return Err(failure(content));
        }
        Ok(content)
    }
}
