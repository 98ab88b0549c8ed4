//! Error taxonomy for the mailbox client.

use thiserror::Error;

/// Failures surfaced by the low-level request path.
///
/// `Transport` is the only variant that escapes [`crate::client::MailClient`]'s
/// request primitive; every public method absorbs it into a sentinel return.
#[derive(Debug, Error)]
pub enum MailError {
    /// Network, DNS, or TLS failure from the HTTP layer.
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Terminal auth rejection (401/403 after the query-param fallback).
    #[error("authentication rejected with HTTP {status}")]
    Auth { status: u16 },

    /// Payload did not match any shape we know how to read.
    #[error("unexpected payload shape: {0}")]
    Format(&'static str),
}
