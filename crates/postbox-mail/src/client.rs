//! Disposable-mailbox client.
//!
//! Lifecycle: `Unregistered -> Registered -> Polling -> {CodeFound | TimedOut}`.
//! A client owns at most one mailbox address, set once by [`MailClient::register`]
//! (or adopted via [`MailClient::set_address`]) and read-only afterwards.
//!
//! Authentication uses a two-tier scheme: the bearer token rides in the
//! `Authorization` and `X-Admin-Token` headers on every request; if a call
//! comes back 401/403, it is retried exactly once with the token duplicated
//! as an `admin_token` query parameter. The retry is never recursive and
//! never concurrent with the primary attempt.

use std::time::Duration;

use chrono::NaiveDateTime;
use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::MailError;
use crate::records::{sort_newest_first, unwrap_listing, EmailDetail, EmailRecord, ParsedEmail};

/// Default per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// How many skipped-email indexes to show before truncating the log line.
const MAX_LISTED_INDEXES: usize = 10;

// ─────────────────────────────────────────────
// Code extractor (external collaborator)
// ─────────────────────────────────────────────

/// Pluggable verification-code matcher.
///
/// The actual regex/heuristic matching lives outside this crate; anything
/// that maps full email text to an optional code string plugs in here.
/// Plain closures implement the trait automatically.
pub trait CodeExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Option<String>;
}

impl<F> CodeExtractor for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn extract(&self, text: &str) -> Option<String> {
        (self)(text)
    }
}

// ─────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────

/// Mailbox client configuration.
#[derive(Clone, Debug)]
pub struct MailConfig {
    /// Provider base URL, without a trailing slash.
    pub base_url: String,
    /// Bearer/admin token; empty means unauthenticated.
    pub auth_token: String,
    /// Optional proxy URL, applied to every request.
    pub proxy: Option<String>,
    /// Set to `false` to accept invalid TLS certificates.
    pub verify_ssl: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".to_string(),
            auth_token: String::new(),
            proxy: None,
            verify_ssl: true,
            timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    }
}

// ─────────────────────────────────────────────
// MailClient
// ─────────────────────────────────────────────

/// Client for a disposable-mailbox provider.
pub struct MailClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
    /// The registered mailbox address, if any.
    address: Option<String>,
    extractor: Box<dyn CodeExtractor>,
}

impl std::fmt::Debug for MailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailClient")
            .field("base_url", &self.base_url)
            .field("address", &self.address)
            .finish()
    }
}

impl MailClient {
    /// Create a new client from config and an external code extractor.
    pub fn new(config: MailConfig, extractor: impl CodeExtractor + 'static) -> Self {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)));
        if !config.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            match reqwest::Proxy::all(proxy) {
                Ok(p) => builder = builder.proxy(p),
                Err(e) => warn!(proxy = %proxy, error = %e, "invalid proxy, ignoring"),
            }
        }
        let client = builder.build().unwrap_or_default();

        MailClient {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.trim().to_string(),
            address: None,
            extractor: Box::new(extractor),
        }
    }

    /// The registered mailbox address, if any.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Adopt a pre-existing mailbox address instead of registering a new one.
    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = Some(address.into());
    }

    // ────────────── Request primitives ──────────────

    /// Lowest-level request. Logs and re-raises transport errors; this is
    /// the only place where a transport [`MailError`] originates.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        use_admin_token_query: bool,
    ) -> Result<Response, MailError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method.clone(), &url);

        if !self.auth_token.is_empty() {
            req = req
                .bearer_auth(&self.auth_token)
                .header("X-Admin-Token", &self.auth_token);
            if use_admin_token_query {
                req = req.query(&[("admin_token", self.auth_token.as_str())]);
            }
        }
        if !query.is_empty() {
            req = req.query(query);
        }

        debug!(method = %method, url = %url, "sending request");
        let res = match req.send().await {
            Ok(res) => res,
            Err(e) => {
                error!(method = %method, url = %url, error = %e, "request failed");
                return Err(MailError::Transport(e));
            }
        };

        let status = res.status();
        debug!(status = %status, "response received");
        if status.is_client_error() || status.is_server_error() {
            warn!(status = %status, url = %url, "error response");
        }
        Ok(res)
    }

    /// Primary attempt with header auth; on 401/403, exactly one retry with
    /// the token duplicated as an `admin_token` query parameter.
    async fn request_with_auth_fallback(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, MailError> {
        let res = self.request(method.clone(), path, query, false).await?;

        let rejected = matches!(res.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN);
        if !rejected || self.auth_token.is_empty() {
            return Ok(res);
        }

        warn!("header auth rejected, retrying once with admin_token query parameter");
        self.request(method, path, query, true).await
    }

    // ────────────── Registration ──────────────

    /// Create a new mailbox address, optionally scoped to a domain.
    ///
    /// Tries GET then POST against the generate endpoint, stopping early on
    /// any response outside {404, 405}. Returns `false` on auth failure or
    /// a missing address field; never raises.
    pub async fn register(&mut self, domain: Option<&str>) -> bool {
        match self.try_register(domain).await {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, "mailbox registration failed");
                false
            }
        }
    }

    async fn try_register(&mut self, domain: Option<&str>) -> Result<bool, MailError> {
        let query: Vec<(&str, &str)> = match domain {
            Some(d) => {
                info!(domain = %d, "registering mailbox on requested domain");
                vec![("domain", d)]
            }
            None => {
                info!("registering mailbox, provider picks the domain");
                Vec::new()
            }
        };

        let mut last = None;
        for method in [Method::GET, Method::POST] {
            let res = self
                .request_with_auth_fallback(method, "/api/generate", &query)
                .await?;
            let stop = !matches!(res.status().as_u16(), 404 | 405);
            last = Some(res);
            if stop {
                break;
            }
        }
        let Some(res) = last else {
            error!("mailbox registration got no response");
            return Ok(false);
        };

        match res.status().as_u16() {
            200 | 201 => {
                let data: Value = res.json().await.unwrap_or(Value::Null);
                let address = ["email", "mailbox"]
                    .iter()
                    .find_map(|key| data.get(*key).and_then(Value::as_str))
                    .filter(|s| !s.is_empty());
                match address {
                    Some(addr) => {
                        info!(address = %addr, "mailbox registered");
                        self.address = Some(addr.to_string());
                        Ok(true)
                    }
                    None => {
                        error!("registration response missing email/mailbox field");
                        Ok(false)
                    }
                }
            }
            status @ (401 | 403) => Err(MailError::Auth { status }),
            status => {
                error!(status, "mailbox registration failed");
                Ok(false)
            }
        }
    }

    // ────────────── Verification codes ──────────────

    /// Scan the mailbox once for a verification code.
    ///
    /// Emails are checked newest-first. With `since` set, emails without a
    /// parseable timestamp and emails strictly older than `since` are
    /// skipped (and counted). Returns the first code the extractor finds.
    pub async fn fetch_verification_code(&self, since: Option<NaiveDateTime>) -> Option<String> {
        match self.try_fetch_code(since).await {
            Ok(code) => code,
            Err(e) => {
                error!(error = %e, "verification code fetch failed");
                None
            }
        }
    }

    async fn try_fetch_code(
        &self,
        since: Option<NaiveDateTime>,
    ) -> Result<Option<String>, MailError> {
        let Some(address) = self.address.as_deref() else {
            error!("mailbox address not set, register first");
            return Ok(None);
        };

        debug!(mailbox = %address, "listing emails");
        let res = self
            .request_with_auth_fallback(Method::GET, "/api/emails", &[("mailbox", address)])
            .await?;

        match res.status().as_u16() {
            200 => {}
            status @ (401 | 403) => return Err(MailError::Auth { status }),
            status => {
                error!(status, "email listing failed");
                return Ok(None);
            }
        }

        let payload: Value = res.json().await.unwrap_or(Value::Array(Vec::new()));
        let Some(entries) = unwrap_listing(&payload) else {
            return Err(MailError::Format("email listing is not a list"));
        };
        if entries.is_empty() {
            info!("mailbox is empty");
            return Ok(None);
        }
        info!(count = entries.len(), "checking emails for a verification code");

        let mut emails: Vec<ParsedEmail> = entries
            .iter()
            .map(EmailRecord::from_value)
            .map(ParsedEmail::new)
            .collect();
        sort_newest_first(&mut emails);

        let mut skipped_no_time: Vec<usize> = Vec::new();
        let mut skipped_expired: Vec<usize> = Vec::new();

        for (i, email) in emails.iter().enumerate() {
            let index = i + 1;

            if let Some(since) = since {
                match email.instant {
                    None => {
                        skipped_no_time.push(index);
                        continue;
                    }
                    Some(instant) if instant < since => {
                        skipped_expired.push(index);
                        continue;
                    }
                    _ => {}
                }
            }

            let (body_text, body_html) = self.email_body(&email.record).await;
            let full_text = format!("{} {} {}", email.record.subject, body_text, body_html);

            if let Some(code) = self.extractor.extract(&full_text) {
                log_skip_summary(&skipped_no_time, &skipped_expired);
                info!(code = %code, "verification code found");
                return Ok(Some(code));
            }
            debug!(index, "no verification code in email");
        }

        log_skip_summary(&skipped_no_time, &skipped_expired);
        warn!("no verification code in any email");
        Ok(None)
    }

    /// Full body for one email: detail endpoint when an id is present,
    /// degrading to listing-level fields on any detail failure.
    async fn email_body(&self, record: &EmailRecord) -> (String, String) {
        if let Some(id) = record.id.as_deref() {
            let path = format!("/api/email/{id}");
            match self.request_with_auth_fallback(Method::GET, &path, &[]).await {
                Ok(res) if res.status() == StatusCode::OK => {
                    let payload: Value = res.json().await.unwrap_or(Value::Null);
                    let detail = EmailDetail::from_value(&payload);
                    return (detail.body_text, detail.body_html);
                }
                Ok(res) => {
                    warn!(id = %id, status = %res.status(), "detail fetch failed, using listing fields");
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "detail fetch failed, using listing fields");
                }
            }
        }
        (
            format!("{} {}", record.body_text, record.preview),
            record.body_html.clone(),
        )
    }

    /// Poll the mailbox until a verification code arrives or the attempt
    /// budget runs out.
    ///
    /// `max_attempts = max(1, timeout / interval)`; the loop sleeps
    /// `interval` between attempts but not after the last one.
    pub async fn poll_for_code(
        &self,
        timeout: Duration,
        interval: Duration,
        since: Option<NaiveDateTime>,
    ) -> Option<String> {
        let max_attempts = (timeout.as_millis() / interval.as_millis().max(1)).max(1) as u32;
        info!(
            timeout_secs = timeout.as_secs(),
            interval_secs = interval.as_secs(),
            max_attempts,
            "polling for verification code"
        );

        for attempt in 1..=max_attempts {
            debug!(attempt, max_attempts, "poll attempt");
            if let Some(code) = self.fetch_verification_code(since).await {
                info!(attempt, "verification code obtained");
                return Some(code);
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }

        error!(
            timeout_secs = timeout.as_secs(),
            "verification code polling timed out"
        );
        None
    }

    // ────────────── Domains ──────────────

    /// Best-effort: the first available domain name, or `""` on any failure.
    pub async fn list_domains(&self) -> String {
        match self.try_list_domains().await {
            Ok(domain) => domain,
            Err(e) => {
                warn!(error = %e, "domain listing failed");
                String::new()
            }
        }
    }

    async fn try_list_domains(&self) -> Result<String, MailError> {
        let res = self
            .request_with_auth_fallback(Method::GET, "/api/domains", &[])
            .await?;
        if res.status() != StatusCode::OK {
            return Ok(String::new());
        }

        let payload: Value = res.json().await.unwrap_or(Value::Array(Vec::new()));
        let domains = match &payload {
            Value::Array(list) => Some(list),
            Value::Object(obj) => ["domains", "data", "items"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_array)),
            _ => None,
        };

        let first = domains.and_then(|list| list.first());
        Ok(match first {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(obj)) => ["domain", "name"]
                .iter()
                .find_map(|key| obj.get(*key).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        })
    }
}

// ─────────────────────────────────────────────
// Skip-summary logging
// ─────────────────────────────────────────────

/// Aggregate log lines for skipped emails: counts, not per-item noise.
fn log_skip_summary(skipped_no_time: &[usize], skipped_expired: &[usize]) {
    if !skipped_no_time.is_empty() {
        info!(
            count = skipped_no_time.len(),
            indexes = %format_indexes(skipped_no_time),
            "skipped emails without a parseable time"
        );
    }
    if !skipped_expired.is_empty() {
        info!(
            count = skipped_expired.len(),
            indexes = %format_indexes(skipped_expired),
            "skipped emails older than the cutoff"
        );
    }
}

/// Render index lists compactly, truncated to 10 with a remainder count.
fn format_indexes(indexes: &[usize]) -> String {
    let rendered: Vec<String> = indexes
        .iter()
        .take(MAX_LISTED_INDEXES)
        .map(usize::to_string)
        .collect();
    if indexes.len() <= MAX_LISTED_INDEXES {
        rendered.join(",")
    } else {
        format!(
            "{}...(+{})",
            rendered.join(","),
            indexes.len() - MAX_LISTED_INDEXES
        )
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
