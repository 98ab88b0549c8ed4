//! Conversation fingerprinting: a stable key for session reuse.
//!
//! The key is derived from the first three messages (role + normalized text)
//! plus a client identifier, so a user's follow-up turns land on the same
//! session without requiring the entire history to match, while different
//! clients with identical openers never collide.

use sha2::{Digest, Sha256};

use crate::types::ChatMessage;

/// How many leading messages participate in the fingerprint.
const FINGERPRINT_MESSAGES: usize = 3;

/// Derive a deterministic conversation key.
///
/// Empty message lists get a sentinel (`"<id>:empty"`, or `"empty"` when no
/// identifier is given) instead of a hash. Otherwise the first three
/// messages are reduced to `role:text` pairs (text trimmed and lowercased,
/// multimodal content flattened to its text parts), joined with `|`,
/// prefixed with the client identifier, and hashed with SHA-256.
pub fn conversation_key(messages: &[ChatMessage], client_identifier: &str) -> String {
    if messages.is_empty() {
        return if client_identifier.is_empty() {
            "empty".to_string()
        } else {
            format!("{client_identifier}:empty")
        };
    }

    let prefix: Vec<String> = messages
        .iter()
        .take(FINGERPRINT_MESSAGES)
        .map(|msg| {
            let text = msg.content_text().trim().to_lowercase();
            format!("{}:{}", msg.role, text)
        })
        .collect();

    let mut joined = prefix.join("|");
    if !client_identifier.is_empty() {
        joined = format!("{client_identifier}|{joined}");
    }

    hex::encode(Sha256::digest(joined.as_bytes()))
}
