//! Core message types: a permissive model of the OpenAI chat format.
//!
//! Incoming payloads come from arbitrary clients, so every field that varies
//! in the wild is optional here and resolved explicitly by the consumers.
//! The `role` is a plain string (unknown roles must survive a round trip),
//! and tool calls accept both the nested `{function:{name,arguments}}` shape
//! and the flat legacy `{name,arguments}` shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────
// Chat messages
// ─────────────────────────────────────────────

/// A single chat message as received from a client.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,

    /// Tool name for `tool` role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool calls requested by an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Legacy single function call (pre-tool-calls API).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ChatMessage {
    /// Create a user message with text content.
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: Some(MessageContent::Text(content.into())),
            ..Default::default()
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".to_string(),
            content: Some(MessageContent::Text(content.into())),
            ..Default::default()
        }
    }

    /// Create an assistant message with text content.
    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "assistant".to_string(),
            content: Some(MessageContent::Text(content.into())),
            ..Default::default()
        }
    }

    /// Create a tool result message.
    pub fn tool(
        name: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        ChatMessage {
            role: "tool".to_string(),
            content: Some(MessageContent::Text(content.into())),
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
            ..Default::default()
        }
    }

    /// Create a user message with multipart content.
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: Some(MessageContent::Parts(parts)),
            ..Default::default()
        }
    }

    /// Flatten this message's content to plain text.
    ///
    /// Strings pass through, multipart content keeps only its text parts
    /// (in order), absent content is empty, and anything else is rendered
    /// as compact JSON.
    pub fn content_text(&self) -> String {
        match &self.content {
            None => String::new(),
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            Some(MessageContent::Other(value)) => value.to_string(),
        }
    }
}

// ─────────────────────────────────────────────
// Message content (text or multipart)
// ─────────────────────────────────────────────

/// Message content: plain text, multipart, or an unrecognized JSON shape.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content (most common case).
    Text(String),
    /// Multipart content with text and/or file references.
    Parts(Vec<ContentPart>),
    /// Anything else a client sends; stringified on use.
    Other(Value),
}

/// A single part of a multipart message.
///
/// The `image_url` tag is historical; it carries any MIME type, not just
/// images. Unknown part shapes land in `Other` so one bad part never rejects
/// the whole message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        image_url: ImageUrl,
    },
    #[serde(untagged)]
    Other(Value),
}

/// File reference payload: a remote URL or a `data:` URI.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

// ─────────────────────────────────────────────
// Tool / function calls
// ─────────────────────────────────────────────

/// A tool call from an assistant message.
///
/// Permissive: OpenAI nests name/arguments under `function`, while older
/// clients send them flat. Consumers resolve nested-first.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

impl ToolCall {
    /// Create a nested-shape tool call (the current OpenAI format).
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        ToolCall {
            id: Some(id.into()),
            function: Some(FunctionCall {
                name: Some(name.into()),
                arguments: Some(arguments),
            }),
            ..Default::default()
        }
    }
}

/// Function name and arguments, either inside a tool call or as a legacy
/// top-level `function_call`.
///
/// `arguments` may be a JSON-encoded string or a structured value.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

// ─────────────────────────────────────────────
// Attachments
// ─────────────────────────────────────────────

/// A resolved file attachment: any MIME type, base64-encoded payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    /// MIME type (e.g. "image/png", "application/pdf").
    pub mime: String,
    /// Base64-encoded file bytes.
    pub data: String,
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_message_round_trip() {
        let json = json!({"role": "user", "content": "Hello"});
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content_text(), "Hello");

        let back = serde_json::to_value(&msg).unwrap();
        assert_eq!(back["content"], "Hello");
        assert!(back.get("tool_calls").is_none());
    }

    #[test]
    fn test_multipart_content_deserialization() {
        let json = json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "Look at "},
                {"type": "text", "text": "this:"},
                {"type": "image_url", "image_url": {"url": "https://x.test/a.png"}}
            ]
        });
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg.content_text(), "Look at this:");
    }

    #[test]
    fn test_unknown_part_shape_is_preserved() {
        let json = json!({
            "role": "user",
            "content": [
                {"type": "audio", "audio": {"data": "xxx"}},
                {"type": "text", "text": "hi"}
            ]
        });
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        match &msg.content {
            Some(MessageContent::Parts(parts)) => {
                assert!(matches!(parts[0], ContentPart::Other(_)));
                assert!(matches!(parts[1], ContentPart::Text { .. }));
            }
            other => panic!("Expected parts, got {other:?}"),
        }
        // Unknown parts contribute no text
        assert_eq!(msg.content_text(), "hi");
    }

    #[test]
    fn test_object_content_is_stringified() {
        let json = json!({"role": "user", "content": {"weird": true}});
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg.content_text(), r#"{"weird":true}"#);
    }

    #[test]
    fn test_absent_content_is_empty() {
        let json = json!({"role": "assistant"});
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg.content_text(), "");
    }

    #[test]
    fn test_nested_tool_call_deserialization() {
        let json = json!({
            "role": "assistant",
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"}
            }]
        });
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        let calls = msg.tool_calls.unwrap();
        assert_eq!(
            calls[0].function.as_ref().unwrap().name.as_deref(),
            Some("search")
        );
    }

    #[test]
    fn test_flat_tool_call_deserialization() {
        let json = json!({
            "role": "assistant",
            "tool_calls": [{"name": "lookup", "arguments": {"id": 7}}]
        });
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        let calls = msg.tool_calls.unwrap();
        assert!(calls[0].function.is_none());
        assert_eq!(calls[0].name.as_deref(), Some("lookup"));
        assert_eq!(calls[0].arguments, Some(json!({"id": 7})));
    }

    #[test]
    fn test_legacy_function_call_deserialization() {
        let json = json!({
            "role": "assistant",
            "function_call": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}
        });
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        let call = msg.function_call.unwrap();
        assert_eq!(call.name.as_deref(), Some("get_weather"));
    }

    #[test]
    fn test_unknown_role_survives() {
        let json = json!({"role": "critic", "content": "not great"});
        let msg: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(msg.role, "critic");
    }

    #[test]
    fn test_tool_constructor() {
        let msg = ChatMessage::tool("search", "call_9", "42");
        assert_eq!(msg.role, "tool");
        assert_eq!(msg.name.as_deref(), Some("search"));
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_9"));
        assert_eq!(msg.content_text(), "42");
    }

    #[test]
    fn test_attachment_serialization() {
        let att = Attachment {
            mime: "image/png".to_string(),
            data: "QUJD".to_string(),
        };
        let json = serde_json::to_value(&att).unwrap();
        assert_eq!(json["mime"], "image/png");
        assert_eq!(json["data"], "QUJD");
    }
}
