//! Postbox core: shared message types, timestamp parsing, and conversation
//! fingerprinting.
//!
//! This crate contains:
//! - **types**: permissive OpenAI-style chat message model and [`types::Attachment`]
//! - **timeparse**: heterogeneous timestamp decoding to UTC-naive instants
//! - **fingerprint**: deterministic conversation keys for session reuse

pub mod fingerprint;
pub mod timeparse;
pub mod types;

pub use fingerprint::conversation_key;
pub use timeparse::parse_instant;
pub use types::{Attachment, ChatMessage, ContentPart, FunctionCall, MessageContent, ToolCall};
