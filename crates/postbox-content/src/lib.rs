//! Postbox content: normalizes heterogeneous chat payloads to plain text.
//!
//! This crate contains:
//! - **fetcher**: concurrent, failure-isolated download of remote attachments
//! - **normalizer**: last-message text/attachment split and tool-call rendering
//! - **transcript**: full-history rendering with role labels and placeholders

pub mod fetcher;
pub mod normalizer;
pub mod transcript;

pub use fetcher::AttachmentFetcher;
pub use normalizer::{render_tool_calls, split_last_message};
pub use transcript::render_transcript;
