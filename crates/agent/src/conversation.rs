use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// Scalar argument value passed to a tool.
///
/// Objects and arrays produced by the model are carried as their compact JSON
/// text so every argument stays a scalar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ArgValue {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl ArgValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(value) => Value::String(value.clone()),
            Self::Number(value) => Value::Number(value.clone()),
            Self::Bool(value) => Value::Bool(*value),
            Self::Null => Value::Null,
        }
    }

    /// JSON Schema type name of the value. Whole numbers report `integer`.
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(value) if value.is_i64() || value.is_u64() => "integer",
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Null => "null",
        }
    }

    /// Null, or a string that only stands in for a missing value.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::String(value) => {
                let value = value.trim();
                value.is_empty() || value == "null" || value == "<nil>"
            }
            _ => false,
        }
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(value),
            Value::Number(value) => Self::Number(value),
            Value::String(value) => Self::String(value),
            other => Self::String(other.to_string()),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Number(Number::from(value))
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

pub type ToolArguments = BTreeMap<String, ArgValue>;

/// Reads a tool-call argument payload. Objects map key by key; a string is
/// parsed as JSON first since some models send arguments stringified. Anything
/// else yields no arguments.
pub fn arguments_from_json(value: Value) -> ToolArguments {
    match value {
        Value::Object(map) => map.into_iter().map(|(key, value)| (key, ArgValue::from(value))).collect(),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed @ Value::Object(_)) => arguments_from_json(parsed),
            _ => ToolArguments::new(),
        },
        _ => ToolArguments::new(),
    }
}

pub fn arguments_to_json(arguments: &ToolArguments) -> Map<String, Value> {
    arguments.iter().map(|(key, value)| (key.clone(), value.to_json())).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolCallRequest {
    pub name: String,
    pub arguments: ToolArguments,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self { name: name.into(), arguments }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { tool_name: tool_name.into(), content: content.into(), is_error: false }
    }

    pub fn failure(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { tool_name: tool_name.into(), content: content.into(), is_error: true }
    }
}

/// One message in the transcript. Fields are read-only once built; the
/// constructors keep `tool_name` on tool turns and `structured_calls` on
/// assistant turns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Turn {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    structured_calls: Vec<ToolCallRequest>,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>, structured_calls: Vec<ToolCallRequest>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_name: None, structured_calls }
    }

    pub fn tool(result: &ToolResult) -> Self {
        Self {
            role: Role::Tool,
            content: result.content.clone(),
            tool_name: Some(result.tool_name.clone()),
            structured_calls: Vec::new(),
        }
    }

    fn plain(role: Role, content: String) -> Self {
        Self { role, content, tool_name: None, structured_calls: Vec::new() }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }

    pub fn structured_calls(&self) -> &[ToolCallRequest] {
        &self.structured_calls
    }
}

/// A single conversation. The transcript only grows.
#[derive(Clone, Debug)]
pub struct Session {
    id: Uuid,
    transcript: Vec<Turn>,
}

impl Session {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self { id: Uuid::new_v4(), transcript: vec![Turn::system(system_prompt)] }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    pub(crate) fn commit(&mut self, turns: Vec<Turn>) {
        self.transcript.extend(turns);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{arguments_from_json, arguments_to_json, ArgValue, Role, Session, ToolResult, Turn};

    #[test]
    fn non_scalar_arguments_are_carried_as_json_text() {
        let arguments = arguments_from_json(json!({
            "name": "core-rtr-01",
            "limit": 5,
            "brief": true,
            "tags": ["edge", "lab"],
            "site": null
        }));

        assert_eq!(arguments["name"], ArgValue::from("core-rtr-01"));
        assert_eq!(arguments["limit"].json_type(), "integer");
        assert_eq!(arguments["brief"], ArgValue::Bool(true));
        assert_eq!(arguments["tags"], ArgValue::from("[\"edge\",\"lab\"]"));
        assert_eq!(arguments["site"], ArgValue::Null);
    }

    #[test]
    fn stringified_arguments_are_parsed() {
        let arguments = arguments_from_json(json!("{\"address\": \"10.0.0.1/24\"}"));
        assert_eq!(arguments["address"], ArgValue::from("10.0.0.1/24"));
        assert!(arguments_from_json(json!("not json")).is_empty());
        assert!(arguments_from_json(json!(42)).is_empty());
    }

    #[test]
    fn arguments_serialize_back_to_plain_json() {
        let arguments = arguments_from_json(json!({"name": "fw-perimeter-01", "limit": 2}));
        assert_eq!(
            serde_json::Value::Object(arguments_to_json(&arguments)),
            json!({"name": "fw-perimeter-01", "limit": 2})
        );
    }

    #[test]
    fn blank_values_cover_missing_value_sentinels() {
        for blank in [ArgValue::Null, ArgValue::from(""), ArgValue::from("null"), ArgValue::from("<nil>")]
        {
            assert!(blank.is_blank(), "{blank:?} should be blank");
        }
        assert!(!ArgValue::from("nil").is_blank());
        assert!(!ArgValue::from(0_i64).is_blank());
        assert!(!ArgValue::Bool(false).is_blank());
    }

    #[test]
    fn tool_turns_carry_the_tool_name() {
        let turn = Turn::tool(&ToolResult::success("list_sites", "[]"));
        assert_eq!(turn.role(), Role::Tool);
        assert_eq!(turn.tool_name(), Some("list_sites"));
        assert!(turn.structured_calls().is_empty());

        let user = Turn::user("show me all devices");
        assert_eq!(user.tool_name(), None);
    }

    #[test]
    fn session_starts_with_system_prompt() {
        let mut session = Session::new("be factual");
        assert_eq!(session.len(), 1);
        assert_eq!(session.transcript()[0].role(), Role::System);

        session.commit(vec![Turn::user("hi"), Turn::assistant("hello", Vec::new())]);
        assert_eq!(session.len(), 3);
        assert_eq!(session.transcript()[2].content(), "hello");
        assert_ne!(session.id(), Session::new("be factual").id());
    }
}
