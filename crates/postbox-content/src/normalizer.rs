//! Content normalization: resolves the newest message into plain text plus
//! attachment descriptors.
//!
//! Only the final message of a conversation gets full attachment treatment:
//! `data:` URIs are decoded inline, http(s) URLs go through the
//! [`AttachmentFetcher`], and tool/function activity is rewritten into
//! explicit context lines so a text-only upstream still sees what happened.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::warn;

use postbox_core::types::{Attachment, ChatMessage, ContentPart, MessageContent, ToolCall};

use crate::fetcher::AttachmentFetcher;

/// Matches `data:<mime>;base64,<payload>` for any MIME type.
fn data_uri_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^data:([^;]+);base64,(.+)$").expect("static regex"))
}

/// Render tool calls as readable lines, one `"<name>: <args>"` per call.
///
/// The name resolves from the nested function object first, then the flat
/// top-level field, defaulting to `"unknown_tool"`. String arguments pass
/// through untouched; structured arguments render as compact JSON.
pub fn render_tool_calls(tool_calls: &[ToolCall]) -> String {
    let lines: Vec<String> = tool_calls
        .iter()
        .map(|call| {
            let function = call.function.as_ref();
            let name = function
                .and_then(|f| f.name.as_deref())
                .or(call.name.as_deref())
                .unwrap_or("unknown_tool");
            let arguments = function
                .and_then(|f| f.arguments.as_ref())
                .or(call.arguments.as_ref());
            format!("{name}: {}", args_text(arguments))
        })
        .collect();
    lines.join("\n")
}

fn args_text(arguments: Option<&Value>) -> String {
    match arguments {
        None => "{}".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(value) => value.to_string(),
    }
}

/// Split the final message into plain text and resolved attachments.
///
/// Inline `data:` URIs are captured without network access; remote http(s)
/// URLs are downloaded concurrently, with failed downloads elided from the
/// attachment list. Unsupported part shapes are logged and dropped.
pub async fn split_last_message(
    messages: &[ChatMessage],
    fetcher: &AttachmentFetcher,
) -> (String, Vec<Attachment>) {
    let Some(last) = messages.last() else {
        return (String::new(), Vec::new());
    };

    let mut text = String::new();
    let mut attachments: Vec<Attachment> = Vec::new();
    let mut remote_urls: Vec<String> = Vec::new();

    match &last.content {
        None => {}
        Some(MessageContent::Text(s)) => text.push_str(s),
        Some(MessageContent::Other(value)) => text.push_str(&value.to_string()),
        Some(MessageContent::Parts(parts)) => {
            for part in parts {
                match part {
                    ContentPart::Text { text: t } => text.push_str(t),
                    ContentPart::ImageUrl { image_url } => {
                        let url = &image_url.url;
                        if let Some(caps) = data_uri_re().captures(url) {
                            attachments.push(Attachment {
                                mime: caps[1].to_string(),
                                data: caps[2].to_string(),
                            });
                        } else if url.starts_with("http://") || url.starts_with("https://") {
                            remote_urls.push(url.clone());
                        } else {
                            warn!(
                                url = %url.chars().take(30).collect::<String>(),
                                "unsupported file reference, dropping"
                            );
                        }
                    }
                    ContentPart::Other(value) => {
                        warn!(part = %value, "unsupported content part, dropping");
                    }
                }
            }
        }
    }

    text = augment_for_role(last, text);

    if !remote_urls.is_empty() {
        let fetched = fetcher.fetch_all(&remote_urls).await;
        attachments.extend(fetched.into_iter().flatten());
    }

    (text, attachments)
}

/// Wrap tool output and tool/function requests in explicit context lines.
fn augment_for_role(msg: &ChatMessage, text: String) -> String {
    match msg.role.to_lowercase().as_str() {
        "tool" => {
            let name = msg.name.as_deref().unwrap_or("tool");
            let call_part = msg
                .tool_call_id
                .as_deref()
                .map(|id| format!(" ({id})"))
                .unwrap_or_default();
            format!("Tool result from {name}{call_part}:\n{text}")
        }
        "assistant" => {
            if let Some(calls) = msg.tool_calls.as_deref().filter(|c| !c.is_empty()) {
                let mut out = format!("Assistant requested tool calls:\n{}", render_tool_calls(calls));
                if !text.is_empty() {
                    out.push('\n');
                    out.push_str(&text);
                }
                out
            } else if let Some(name) = msg
                .function_call
                .as_ref()
                .and_then(|f| f.name.as_deref())
                .filter(|n| !n.is_empty())
            {
                let args = args_text(msg.function_call.as_ref().and_then(|f| f.arguments.as_ref()));
                let mut out = format!("Assistant requested function call: {name}({args})");
                if !text.is_empty() {
                    out.push('\n');
                    out.push_str(&text);
                }
                out
            } else {
                text
            }
        }
        _ => text,
    }
}
