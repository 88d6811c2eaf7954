use std::sync::OnceLock;

use netops_core::errors::AgentError;
use regex::Regex;
use serde_json::Value;

use crate::conversation::{arguments_from_json, Role, ToolArguments, ToolCallRequest, Turn};

/// One way of recovering tool calls from an assistant turn.
pub trait IntentStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, turn: &Turn) -> Vec<ToolCallRequest>;

    /// Heuristic strategies only yield requests for tools the caller knows.
    fn is_heuristic(&self) -> bool {
        false
    }
}

/// Tool calls the model returned through its native function-calling channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuredCalls;

impl IntentStrategy for StructuredCalls {
    fn name(&self) -> &'static str {
        "structured_calls"
    }

    fn extract(&self, turn: &Turn) -> Vec<ToolCallRequest> {
        turn.structured_calls().to_vec()
    }
}

/// Recovers a single tool call written into the reply text as JSON, e.g.
/// `{"name": "get_device", "parameters": {"name": "core-rtr-01"}}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextFallback;

/// Unquoted value tokens some models write where JSON wants `null`.
const NULL_PLACEHOLDERS: [&str; 2] = ["<nil>", "None"];

fn call_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"\{\s*["']name["']\s*:\s*["']([\w_]+)["']"#).ok())
        .as_ref()
}

impl IntentStrategy for TextFallback {
    fn name(&self) -> &'static str {
        "text_fallback"
    }

    fn extract(&self, turn: &Turn) -> Vec<ToolCallRequest> {
        let Some(pattern) = call_pattern() else {
            return Vec::new();
        };
        let content = turn.content();
        let Some(captures) = pattern.captures(content) else {
            return Vec::new();
        };
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            return Vec::new();
        };

        let fragment = enclosing_fragment(content, whole.start());
        let arguments = match parse_arguments(fragment) {
            Ok(arguments) => arguments,
            Err(error) => {
                tracing::warn!(
                    event_name = "agent.intent.fallback.malformed",
                    tool_name = name.as_str(),
                    error_class = error.error_class(),
                    error = %error,
                    "fallback tool call arguments could not be parsed; calling with none"
                );
                ToolArguments::new()
            }
        };

        vec![ToolCallRequest::new(name.as_str(), arguments)]
    }

    fn is_heuristic(&self) -> bool {
        true
    }
}

/// Tracks whether a character scan is inside a single- or double-quoted
/// string literal, honoring backslash escapes.
#[derive(Default)]
struct QuoteScanner {
    open: Option<char>,
    escaped: bool,
}

impl QuoteScanner {
    /// Feeds one character; true when it is part of a string literal,
    /// delimiters included.
    fn in_string(&mut self, character: char) -> bool {
        if let Some(open) = self.open {
            if self.escaped {
                self.escaped = false;
            } else if character == '\\' {
                self.escaped = true;
            } else if character == open {
                self.open = None;
            }
            return true;
        }
        if character == '"' || character == '\'' {
            self.open = Some(character);
            return true;
        }
        false
    }
}

/// The balanced `{...}` fragment opening at `start`. Braces inside quoted
/// strings are ignored. Unbalanced text runs to the last `}` (or the end).
fn enclosing_fragment(content: &str, start: usize) -> &str {
    let tail = &content[start..];
    let mut depth = 0usize;
    let mut quotes = QuoteScanner::default();

    for (offset, character) in tail.char_indices() {
        if quotes.in_string(character) {
            continue;
        }
        match character {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &tail[..=offset];
                }
            }
            _ => {}
        }
    }

    match tail.rfind('}') {
        Some(end) => &tail[..=end],
        None => tail,
    }
}

/// Rewrites placeholder tokens that appear as unquoted values (right after a
/// `:`) to `null`. String literals pass through untouched.
fn null_placeholders(fragment: &str) -> String {
    let mut output = String::with_capacity(fragment.len());
    let mut quotes = QuoteScanner::default();
    let mut after_colon = false;
    let mut rest = fragment;

    while let Some(character) = rest.chars().next() {
        if quotes.in_string(character) {
            after_colon = false;
        } else {
            if after_colon {
                let token = NULL_PLACEHOLDERS
                    .iter()
                    .find(|token| rest.starts_with(**token) && !continues_word(&rest[token.len()..]));
                if let Some(token) = token {
                    output.push_str("null");
                    rest = &rest[token.len()..];
                    after_colon = false;
                    continue;
                }
            }
            if character == ':' {
                after_colon = true;
            } else if !character.is_whitespace() {
                after_colon = false;
            }
        }
        output.push(character);
        rest = &rest[character.len_utf8()..];
    }
    output
}

fn continues_word(rest: &str) -> bool {
    rest.chars().next().is_some_and(|next| next.is_alphanumeric() || next == '_')
}

fn parse_arguments(fragment: &str) -> Result<ToolArguments, AgentError> {
    let cleaned = null_placeholders(fragment);

    let value: Value = serde_json::from_str(&cleaned)
        .map_err(|error| AgentError::MalformedFallbackIntent(error.to_string()))?;

    let payload = value.get("parameters").or_else(|| value.get("arguments")).cloned();
    let mut arguments = payload.map(arguments_from_json).unwrap_or_default();
    arguments.retain(|_, value| !value.is_blank());
    Ok(arguments)
}

/// Runs strategies in order and returns the first non-empty result.
pub struct IntentExtractor {
    strategies: Vec<Box<dyn IntentStrategy>>,
}

impl Default for IntentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl IntentExtractor {
    pub fn new() -> Self {
        Self::with_strategies(vec![Box::new(StructuredCalls), Box::new(TextFallback)])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn IntentStrategy>>) -> Self {
        Self { strategies }
    }

    /// Empty when the turn is a final answer.
    pub fn extract(&self, turn: &Turn) -> Vec<ToolCallRequest> {
        self.extract_known(turn, |_| true)
    }

    /// Like [`extract`](Self::extract), but requests from heuristic
    /// strategies are kept only when `is_known` accepts their tool name.
    /// Structured calls are never filtered.
    pub fn extract_known(
        &self,
        turn: &Turn,
        is_known: impl Fn(&str) -> bool,
    ) -> Vec<ToolCallRequest> {
        if turn.role() != Role::Assistant {
            return Vec::new();
        }
        for strategy in &self.strategies {
            let mut requests = strategy.extract(turn);
            if strategy.is_heuristic() {
                requests.retain(|request| {
                    let known = is_known(&request.name);
                    if !known {
                        tracing::debug!(
                            event_name = "agent.intent.unknown_tool.ignored",
                            strategy = strategy.name(),
                            tool_name = %request.name,
                            "text looked like a call to an unknown tool; treating as answer"
                        );
                    }
                    known
                });
            }
            if !requests.is_empty() {
                tracing::debug!(
                    event_name = "agent.intent.extracted",
                    strategy = strategy.name(),
                    request_count = requests.len(),
                    "tool intent extracted"
                );
                return requests;
            }
        }
        Vec::new()
    }
}
