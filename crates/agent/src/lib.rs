//! Agent Runtime - tool-augmented dialogue over network inventory
//!
//! This crate is the conversational core of netops. It:
//! - Keeps the running conversation for one session
//! - Advertises the tool provider's tools to the language model
//! - Recovers tool-call intent from structured or free-text model output
//! - Dispatches tool calls and folds their results back into the transcript
//!
//! # Architecture
//!
//! One round of dialogue follows a constrained loop:
//! 1. **Model Call** (`llm`) - send the transcript plus tool descriptions
//! 2. **Intent Extraction** (`intent`) - structured calls first, text fallback second
//! 3. **Tool Dispatch** (`tools`) - validate arguments, call the provider, capture the result
//! 4. **Final Answer** - a second model call with tools disabled narrates the results
//!
//! # Key Types
//!
//! - `DialogueOrchestrator` - round state machine (see `runtime` module)
//! - `LlmClient` - language-model boundary, with an Ollama implementation
//! - `ToolProvider` - tool-server boundary, implemented over MCP by the CLI
//!
//! # Safety Principle
//!
//! The model never invents inventory facts on its own authority. Every fact in
//! a final answer is expected to come from a tool turn in the transcript.

pub mod conversation;
pub mod intent;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod tools;

pub use conversation::{ArgValue, Role, Session, ToolArguments, ToolCallRequest, ToolResult, Turn};
pub use intent::{IntentExtractor, IntentStrategy, StructuredCalls, TextFallback};
pub use llm::{LlmClient, LlmError, OllamaClient};
pub use runtime::{DialogueOrchestrator, RoundOutcome, RoundState};
pub use tools::{
    describe, CallableToolSpec, ProviderCallOutput, ProviderToolSpec, ToolDispatcher,
    ToolProvider, ToolProviderError, ToolRegistry,
};
