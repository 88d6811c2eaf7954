use thiserror::Error;

/// Failures the dialogue core can observe during a round.
///
/// Only [`AgentError::ModelCallFailure`] ever reaches the user as an explicit
/// failure. Tool failures become `tool` turns for the model to narrate, and a
/// malformed fallback intent degrades to "no call" or "call with no arguments".
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AgentError {
    #[error("tool `{name}` is not provided by the tool server")]
    ToolNotFound { name: String },
    #[error("invalid arguments for tool `{name}`: {message}")]
    InvalidToolArguments { name: String, message: String },
    #[error("tool `{name}` failed: {message}")]
    ToolInvocationFailure { name: String, message: String },
    #[error("could not recover tool call from model text: {0}")]
    MalformedFallbackIntent(String),
    #[error("language model call failed: {0}")]
    ModelCallFailure(String),
}

impl AgentError {
    pub fn user_visible(&self) -> bool {
        matches!(self, Self::ModelCallFailure(_))
    }

    pub fn error_class(&self) -> &'static str {
        match self {
            Self::ToolNotFound { .. } => "tool_not_found",
            Self::InvalidToolArguments { .. } => "invalid_tool_arguments",
            Self::ToolInvocationFailure { .. } => "tool_invocation_failure",
            Self::MalformedFallbackIntent(_) => "malformed_fallback_intent",
            Self::ModelCallFailure(_) => "model_call_failure",
        }
    }

    /// Text placed in a `tool` turn when a dispatch fails.
    pub fn tool_turn_content(&self) -> String {
        format!("Error calling tool: {self}")
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::ModelCallFailure(message) => {
                format!("The assistant is unavailable right now ({message}). Please try again.")
            }
            _ => "The request could not be completed. Please try again.".to_string(),
        }
    }
}
