//! Postbox mail: resilient client for disposable-mailbox providers.
//!
//! This crate contains:
//! - **client**: [`client::MailClient`] handles registration, two-tier auth
//!   fallback, and the bounded verification-code polling loop
//! - **records**: boundary schema for the provider's polymorphic listing and
//!   detail payloads
//! - **error**: the transport-level error taxonomy
//!
//! Public client methods never propagate errors; failures are logged and
//! reported as `false`/`None`/empty sentinels. Only the low-level request
//! primitive re-raises, for callers that bypass the high-level API.

pub mod client;
pub mod error;
pub mod records;

pub use client::{CodeExtractor, MailClient, MailConfig};
pub use error::MailError;
pub use records::{EmailDetail, EmailRecord, ParsedEmail};
