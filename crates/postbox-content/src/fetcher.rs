//! Attachment fetching: concurrent resolution of remote file URLs.
//!
//! All URLs belonging to one message are fetched in a single fan-out; each
//! download's failure is captured at its own boundary, so one bad URL never
//! cancels or blocks its siblings. Result order always matches input order.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use postbox_core::types::Attachment;

/// Per-download timeout.
const FETCH_TIMEOUT_SECS: u64 = 30;

/// MIME type used when the server declares none.
const DEFAULT_MIME: &str = "application/octet-stream";

/// Downloads remote attachments and base64-encodes them in memory.
///
/// No MIME allow-list is enforced; whatever the server serves is accepted.
pub struct AttachmentFetcher {
    client: Client,
}

impl AttachmentFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .redirect(reqwest::redirect::Policy::limited(5))
                .timeout(std::time::Duration::from_secs(FETCH_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Fetch every URL concurrently.
    ///
    /// The returned vector has one slot per input URL, in input order.
    /// A `None` slot means the file expired (404) or the download failed.
    pub async fn fetch_all(&self, urls: &[String]) -> Vec<Option<Attachment>> {
        join_all(urls.iter().map(|url| self.fetch_one(url))).await
    }

    async fn fetch_one(&self, url: &str) -> Option<Attachment> {
        match self.try_fetch(url).await {
            Ok(attachment) => attachment,
            Err(e) => {
                warn!(url = %truncate(url, 50), error = %e, "attachment download failed");
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> anyhow::Result<Option<Attachment>> {
        let resp = self.client.get(url).send().await?;

        // Expired upload links 404 routinely; that is not an error.
        if resp.status() == StatusCode::NOT_FOUND {
            warn!(url = %truncate(url, 50), "attachment gone (404), skipping");
            return Ok(None);
        }
        let resp = resp.error_for_status()?;

        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_MIME)
            .split(';')
            .next()
            .unwrap_or(DEFAULT_MIME)
            .trim()
            .to_string();

        let bytes = resp.bytes().await?;
        debug!(
            url = %truncate(url, 50),
            bytes = bytes.len(),
            mime = %mime,
            "attachment downloaded"
        );

        Ok(Some(Attachment {
            mime,
            data: BASE64.encode(&bytes),
        }))
    }
}

impl Default for AttachmentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Shorten a URL for log lines.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len).collect();
        format!("{head}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"ABC".to_vec()),
            )
            .mount(&server)
            .await;

        let fetcher = AttachmentFetcher::new();
        let results = fetcher
            .fetch_all(&[format!("{}/file.png", server.uri())])
            .await;

        assert_eq!(results.len(), 1);
        let att = results[0].as_ref().unwrap();
        assert_eq!(att.mime, "image/png");
        assert_eq!(att.data, "QUJD");
    }

    #[tokio::test]
    async fn test_content_type_parameters_are_stripped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/doc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain; charset=utf-8")
                    .set_body_bytes(b"hi".to_vec()),
            )
            .mount(&server)
            .await;

        let fetcher = AttachmentFetcher::new();
        let results = fetcher.fetch_all(&[format!("{}/doc", server.uri())]).await;
        assert_eq!(results[0].as_ref().unwrap().mime, "text/plain");
    }

    #[tokio::test]
    async fn test_missing_content_type_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/blob"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&server)
            .await;

        let fetcher = AttachmentFetcher::new();
        let results = fetcher.fetch_all(&[format!("{}/blob", server.uri())]).await;
        let mime = &results[0].as_ref().unwrap().mime;
        // wiremock may or may not set a content type; either way nothing panics
        assert!(!mime.is_empty());
    }

    #[tokio::test]
    async fn test_404_and_success_mixed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/here"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/pdf")
                    .set_body_bytes(b"PDF".to_vec()),
            )
            .mount(&server)
            .await;

        let fetcher = AttachmentFetcher::new();
        let results = fetcher
            .fetch_all(&[
                format!("{}/gone", server.uri()),
                format!("{}/here", server.uri()),
            ])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_none());
        assert_eq!(results[1].as_ref().unwrap().mime, "application/pdf");
    }

    #[tokio::test]
    async fn test_server_error_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boom"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = AttachmentFetcher::new();
        let results = fetcher.fetch_all(&[format!("{}/boom", server.uri())]).await;
        assert_eq!(results, vec![None]);
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_none() {
        let fetcher = AttachmentFetcher::new();
        let results = fetcher
            .fetch_all(&["http://127.0.0.1:1/nope".to_string()])
            .await;
        assert_eq!(results, vec![None]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let fetcher = AttachmentFetcher::new();
        assert!(fetcher.fetch_all(&[]).await.is_empty());
    }
}
