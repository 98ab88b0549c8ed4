//! Transcript rendering: flattens a full message history into one
//! annotated text block.
//!
//! Purely textual: attachment resolution happens upstream, so multimodal
//! parts only leave `[image]` placeholders here. Never performs I/O.

use postbox_core::types::{ChatMessage, ContentPart, MessageContent};

use crate::normalizer::render_tool_calls;

/// Render the whole conversation as `"<Role>: <content>\n\n"` per message.
///
/// Assistant messages carry the same tool-call/function-call annotations as
/// the last-message normalizer (with history-flavored labels), and each
/// image-tagged part appends one `[image]` marker whether or not the file
/// was actually fetched.
pub fn render_transcript(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();

    for msg in messages {
        let role_lower = msg.role.to_lowercase();
        let role = match role_lower.as_str() {
            "system" => "System".to_string(),
            "user" => "User".to_string(),
            "tool" => format!("Tool[{}]", msg.name.as_deref().unwrap_or("tool")),
            "assistant" => "Assistant".to_string(),
            _ if msg.role.is_empty() => "Assistant".to_string(),
            _ => msg.role.clone(),
        };

        let mut content = msg.content_text();

        if role_lower == "assistant" {
            if let Some(calls) = msg.tool_calls.as_deref().filter(|c| !c.is_empty()) {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&format!("Tool calls:\n{}", render_tool_calls(calls)));
            } else if let Some(name) = msg
                .function_call
                .as_ref()
                .and_then(|f| f.name.as_deref())
                .filter(|n| !n.is_empty())
            {
                let args = msg
                    .function_call
                    .as_ref()
                    .and_then(|f| f.arguments.as_ref())
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| "{}".to_string());
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str(&format!("Function call: {name}({args})"));
            }
        }

        if let Some(MessageContent::Parts(parts)) = &msg.content {
            let image_count = parts
                .iter()
                .filter(|p| matches!(p, ContentPart::ImageUrl { .. }))
                .count();
            for _ in 0..image_count {
                content.push_str("[image]");
            }
        }

        prompt.push_str(&format!("{role}: {content}\n\n"));
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use postbox_core::types::{FunctionCall, ImageUrl, ToolCall};
    use serde_json::json;

    fn image_part(url: &str) -> ContentPart {
        ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.to_string(),
                detail: None,
            },
        }
    }

    #[test]
    fn test_basic_roles() {
        let msgs = vec![
            ChatMessage::system("Be terse."),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ];
        assert_eq!(
            render_transcript(&msgs),
            "System: Be terse.\n\nUser: hi\n\nAssistant: hello\n\n"
        );
    }

    #[test]
    fn test_tool_role_label() {
        let msgs = vec![ChatMessage::tool("search", "call_1", "42")];
        assert_eq!(render_transcript(&msgs), "Tool[search]: 42\n\n");
    }

    #[test]
    fn test_tool_role_default_name() {
        let mut msg = ChatMessage::tool("x", "call_1", "ok");
        msg.name = None;
        assert_eq!(render_transcript(&[msg]), "Tool[tool]: ok\n\n");
    }

    #[test]
    fn test_unknown_role_renders_verbatim() {
        let msgs = vec![ChatMessage {
            role: "critic".to_string(),
            content: Some(MessageContent::Text("meh".to_string())),
            ..Default::default()
        }];
        assert_eq!(render_transcript(&msgs), "critic: meh\n\n");
    }

    #[test]
    fn test_empty_role_falls_back_to_assistant() {
        let msgs = vec![ChatMessage {
            role: String::new(),
            content: Some(MessageContent::Text("hm".to_string())),
            ..Default::default()
        }];
        assert_eq!(render_transcript(&msgs), "Assistant: hm\n\n");
    }

    #[test]
    fn test_assistant_tool_call_annotation() {
        let mut msg = ChatMessage::assistant("checking");
        msg.tool_calls = Some(vec![ToolCall::new("id", "search", json!("{\"q\":\"x\"}"))]);
        assert_eq!(
            render_transcript(&[msg]),
            "Assistant: checking\nTool calls:\nsearch: {\"q\":\"x\"}\n\n"
        );
    }

    #[test]
    fn test_assistant_function_call_annotation() {
        let mut msg = ChatMessage {
            role: "assistant".to_string(),
            ..Default::default()
        };
        msg.function_call = Some(FunctionCall {
            name: Some("get_time".to_string()),
            arguments: None,
        });
        assert_eq!(
            render_transcript(&[msg]),
            "Assistant: Function call: get_time({})\n\n"
        );
    }

    #[test]
    fn test_image_markers_appended_per_part() {
        let msgs = vec![ChatMessage::user_parts(vec![
            ContentPart::Text {
                text: "two pics".to_string(),
            },
            image_part("https://x.test/a.png"),
            image_part("data:image/png;base64,QUJD"),
        ])];
        assert_eq!(render_transcript(&msgs), "User: two pics[image][image]\n\n");
    }

    #[test]
    fn test_history_annotations_apply_to_all_messages() {
        let mut first = ChatMessage::assistant("step 1");
        first.tool_calls = Some(vec![ToolCall::new("a", "shell", json!("{}"))]);
        let msgs = vec![first, ChatMessage::user("and then?")];
        let out = render_transcript(&msgs);
        assert!(out.contains("Tool calls:\nshell: {}"));
        assert!(out.ends_with("User: and then?\n\n"));
    }
}
