//! Canonical message types shared by the engine and the wire adapter.

use serde::{Deserialize, Serialize};

use crate::error::DroverError;

/// Conversation role.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Parse a role string; anything outside the closed set is a hard error.
    pub fn parse(s: &str) -> Result<Self, DroverError> {
        s.parse()
            .map_err(|_| DroverError::InvalidRole(s.to_string()))
    }
}

/// Function invocation carried by a tool call. `arguments` is a serialized
/// JSON object, exactly as the model emitted it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Function {
    pub name: String,
    pub arguments: String,
}

/// A tool/function call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: Function,
}

impl ToolCall {
    /// Create a function-typed tool call.
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: "function".to_string(),
            function: Function {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

/// A message in a conversation.
///
/// Constructed via the role-specific constructors; a `tool` message must carry
/// the `tool_call_id` of the call it answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            tool_calls: None,
            name: None,
            tool_call_id: None,
            base64_image: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            tool_calls: None,
            name: None,
            tool_call_id: None,
            base64_image: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: None,
            name: None,
            tool_call_id: None,
            base64_image: None,
        }
    }

    /// Create an assistant message carrying tool calls.
    pub fn from_tool_calls(tool_calls: Vec<ToolCall>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            tool_calls: Some(tool_calls),
            name: None,
            tool_call_id: None,
            base64_image: None,
        }
    }

    /// Create a tool-result message echoing the originating call id.
    pub fn tool(
        content: impl Into<String>,
        name: impl Into<String>,
        tool_call_id: impl Into<String>,
        base64_image: Option<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
            base64_image,
        }
    }

    /// Convert to a JSON value, omitting absent fields entirely.
    pub fn to_value(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("role".into(), serde_json::json!(self.role));
        if let Some(ref content) = self.content {
            map.insert("content".into(), serde_json::json!(content));
        }
        if let Some(ref tool_calls) = self.tool_calls {
            map.insert("tool_calls".into(), serde_json::json!(tool_calls));
        }
        if let Some(ref name) = self.name {
            map.insert("name".into(), serde_json::json!(name));
        }
        if let Some(ref tool_call_id) = self.tool_call_id {
            map.insert("tool_call_id".into(), serde_json::json!(tool_call_id));
        }
        if let Some(ref base64_image) = self.base64_image {
            map.insert("base64_image".into(), serde_json::json!(base64_image));
        }
        serde_json::Value::Object(map)
    }
}

// Message + Message, Message + Vec<Message>, Vec<Message> + Message all yield
// an ordered list preserving argument order. Other operand types are rejected
// at compile time.

impl std::ops::Add for Message {
    type Output = Vec<Message>;

    fn add(self, other: Message) -> Vec<Message> {
        vec![self, other]
    }
}

impl std::ops::Add<Vec<Message>> for Message {
    type Output = Vec<Message>;

    fn add(self, other: Vec<Message>) -> Vec<Message> {
        let mut out = Vec::with_capacity(other.len() + 1);
        out.push(self);
        out.extend(other);
        out
    }
}

impl std::ops::Add<Message> for Vec<Message> {
    type Output = Vec<Message>;

    fn add(mut self, other: Message) -> Vec<Message> {
        self.push(other);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parse_accepts_all_valid_roles() {
        for (s, role) in [
            ("system", Role::System),
            ("user", Role::User),
            ("assistant", Role::Assistant),
            ("tool", Role::Tool),
        ] {
            assert_eq!(Role::parse(s).unwrap(), role);
        }
    }

    #[test]
    fn role_parse_rejects_unknown_role() {
        let err = Role::parse("moderator").unwrap_err();
        assert!(matches!(err, DroverError::InvalidRole(_)));
    }

    #[test]
    fn to_value_omits_absent_fields() {
        let value = Message::user("hi").to_value();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["role"], "user");
        assert_eq!(obj["content"], "hi");
        assert!(!obj.contains_key("tool_calls"));
        assert!(!obj.contains_key("tool_call_id"));
    }

    #[test]
    fn to_value_includes_present_fields() {
        let msg = Message::tool("42", "calc", "call_1", Some("imgdata".into()));
        let value = msg.to_value();
        assert_eq!(value["tool_call_id"], "call_1");
        assert_eq!(value["name"], "calc");
        assert_eq!(value["base64_image"], "imgdata");
    }

    #[test]
    fn tool_call_arguments_round_trip() {
        let call = ToolCall::function("c1", "x", r#"{"a":1}"#);
        let json = serde_json::to_string(&call).unwrap();
        let back: ToolCall = serde_json::from_str(&json).unwrap();
        assert_eq!(back, call);
        let args: serde_json::Value = serde_json::from_str(&back.function.arguments).unwrap();
        assert_eq!(args, serde_json::json!({"a": 1}));
    }

    #[test]
    fn message_concatenation_preserves_order() {
        let a = Message::user("a");
        let b = Message::assistant("b");
        let c = Message::user("c");

        let pair = a.clone() + b.clone();
        assert_eq!(pair.len(), 2);
        assert_eq!(pair[0].content.as_deref(), Some("a"));

        let list = pair + c.clone();
        assert_eq!(list.len(), 3);
        assert_eq!(list[2].content.as_deref(), Some("c"));

        let fronted = c + vec![a, b];
        assert_eq!(fronted[0].content.as_deref(), Some("c"));
    }
}
