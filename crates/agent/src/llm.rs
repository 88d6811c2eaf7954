use std::time::Duration;

use async_trait::async_trait;
use netops_core::config::LlmConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::conversation::{arguments_from_json, arguments_to_json, Role, ToolCallRequest, Turn};
use crate::tools::CallableToolSpec;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Language-model boundary. `tools: None` means tool use is disabled for the
/// call. The returned turn is always an assistant turn.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(
        &self,
        transcript: &[Turn],
        tools: Option<&[CallableToolSpec]>,
    ) -> Result<Turn, LlmError>;
}

/// Client for Ollama's `/api/chat` endpoint with native tool calling.
#[derive(Clone, Debug)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Whether the server answers at all and lists the configured model.
    pub async fn check_health(&self) -> Result<bool, LlmError> {
        let response = self.client.get(format!("{}/api/tags", self.base_url)).send().await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let tags: OllamaTags = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;
        Ok(tags.models.iter().any(|model| {
            model.name == self.model || model.name.split(':').next() == Some(self.model.as_str())
        }))
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(
        &self,
        transcript: &[Turn],
        tools: Option<&[CallableToolSpec]>,
    ) -> Result<Turn, LlmError> {
        let request = build_request(&self.model, transcript, tools);
        tracing::debug!(
            event_name = "agent.llm.request.sent",
            model = %self.model,
            message_count = request.messages.len(),
            tool_count = request.tools.as_ref().map_or(0, Vec::len),
            "sending chat request"
        );

        let response =
            self.client.post(format!("{}/api/chat", self.base_url)).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|error| LlmError::InvalidResponse(error.to_string()))?;
        Ok(into_turn(body))
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<CallableToolSpec>>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

fn build_request<'a>(
    model: &'a str,
    transcript: &[Turn],
    tools: Option<&[CallableToolSpec]>,
) -> OllamaRequest<'a> {
    OllamaRequest {
        model,
        messages: transcript.iter().map(to_message).collect(),
        tools: tools.filter(|tools| !tools.is_empty()).map(<[CallableToolSpec]>::to_vec),
        stream: false,
    }
}

fn to_message(turn: &Turn) -> OllamaMessage {
    OllamaMessage {
        role: turn.role().as_str().to_string(),
        content: turn.content().to_string(),
        tool_calls: turn
            .structured_calls()
            .iter()
            .map(|call| OllamaToolCall {
                function: OllamaFunctionCall {
                    name: call.name.clone(),
                    arguments: Value::Object(arguments_to_json(&call.arguments)),
                },
            })
            .collect(),
        tool_name: turn.tool_name().map(str::to_string),
    }
}

fn into_turn(response: OllamaResponse) -> Turn {
    let message = response.message;
    if message.role != Role::Assistant.as_str() {
        tracing::debug!(
            event_name = "agent.llm.response.unexpected_role",
            role = %message.role,
            "treating model message as assistant turn"
        );
    }
    let calls = message
        .tool_calls
        .into_iter()
        .filter(|call| !call.function.name.is_empty())
        .map(|call| {
            let arguments = match call.function.arguments {
                Value::Null => Value::Object(Map::new()),
                other => other,
            };
            ToolCallRequest::new(call.function.name, arguments_from_json(arguments))
        })
        .collect();
    Turn::assistant(message.content, calls)
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{LlmClient, LlmError};
    use crate::conversation::Turn;
    use crate::tools::CallableToolSpec;

    /// Replays scripted replies and records what each call was given.
    #[derive(Default)]
    pub struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<Turn, String>>>,
        pub seen: Mutex<Vec<(Vec<Turn>, bool)>>,
    }

    impl ScriptedLlm {
        pub fn new(replies: Vec<Result<Turn, String>>) -> Self {
            Self { replies: Mutex::new(replies.into()), seen: Mutex::default() }
        }

        /// `(transcript length, tools enabled)` for each call so far.
        pub fn calls(&self) -> Vec<(usize, bool)> {
            self.seen
                .lock()
                .map(|seen| seen.iter().map(|(turns, tools)| (turns.len(), *tools)).collect())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            transcript: &[Turn],
            tools: Option<&[CallableToolSpec]>,
        ) -> Result<Turn, LlmError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push((transcript.to_vec(), tools.is_some()));
            }
            let next = self.replies.lock().ok().and_then(|mut replies| replies.pop_front());
            match next {
                Some(Ok(turn)) => Ok(turn),
                Some(Err(message)) => Err(LlmError::InvalidResponse(message)),
                None => Err(LlmError::InvalidResponse("no scripted reply left".to_string())),
            }
        }
    }
}
