// src/fetch/http.rs
// =============================================================================
// The default renderer: plain HTTP via reqwest.
//
// Key functionality:
// - GET requests with a per-request timeout
// - Follows redirects and reports the final URL (response.url())
// - Maps reqwest failures onto FetchError variants
// - Implements both PageRenderer (HTML pages) and Fetch (sitemap lookups)
// - Bounded reads: non-HTML pages (PDFs, images, archives) are recorded
//   without downloading their body, HTML is cut off at MAX_PAGE_BYTES and a
//   sitemap body over MAX_DOCUMENT_BYTES is an error
//
// Limitation: this renderer does not execute page JavaScript, so links that
// only exist after client-side rendering are not discovered. A script-capable
// renderer can be plugged in behind the same PageRenderer trait.
// =============================================================================

use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use url::Url;

use super::html::UNTITLED;
use super::{extract_page, Fetch, FetchedBody, PageRenderer, RenderedPage};
use crate::error::{ExtractError, FetchError};

/// Follow at most this many redirects per request
const MAX_REDIRECTS: usize = 10;

/// HTML beyond this size is not parsed for links
const MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;

/// Sitemap / robots.txt bodies larger than this are rejected
const MAX_DOCUMENT_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    // Builds the shared HTTP client
    //
    // The client is reused for every request of a run (connection pooling).
    // Failing to build it is a run failure: nothing can be fetched without it.
    pub fn new(user_agent: &str) -> Result<Self, ExtractError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| ExtractError::RendererInit(e.to_string()))?;
        Ok(Self { client })
    }

    async fn send(&self, url: &Url, timeout: Duration) -> Result<reqwest::Response, FetchError> {
        self.client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| categorize_error(e, timeout))
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, FetchError> {
        let response = self.send(url, timeout).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let resolved_url = response.url().clone();
        let content_type = content_type(&response);
        if !is_html(content_type.as_deref()) {
            // The page exists, it just has no links to offer
            tracing::debug!(url = %resolved_url, content_type = ?content_type, "not an HTML page, body skipped");
            return Ok(RenderedPage {
                title: UNTITLED.to_string(),
                path: resolved_url.path().to_string(),
                resolved_url,
                links: Vec::new(),
            });
        }

        let (body, complete) = read_capped(response, MAX_PAGE_BYTES, timeout).await?;
        if !complete {
            tracing::warn!(url = %resolved_url, limit = MAX_PAGE_BYTES, "page truncated");
        }
        let html = String::from_utf8_lossy(&body);

        let (title, links) = extract_page(&html, &resolved_url);
        Ok(RenderedPage {
            title,
            path: resolved_url.path().to_string(),
            resolved_url,
            links,
        })
    }
}

#[async_trait]
impl Fetch for HttpRenderer {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<FetchedBody, FetchError> {
        let response = self.send(url, timeout).await?;

        let status = response.status().as_u16();
        let content_type = content_type(&response);
        let (body, complete) = read_capped(response, MAX_DOCUMENT_BYTES, timeout).await?;
        if !complete {
            return Err(FetchError::Body(format!(
                "response larger than {MAX_DOCUMENT_BYTES} bytes"
            )));
        }

        Ok(FetchedBody {
            status,
            content_type,
            body,
        })
    }
}

fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

// A missing Content-Type is treated as HTML; most servers that omit it are
// serving pages
fn is_html(content_type: Option<&str>) -> bool {
    content_type.map_or(true, |ct| ct.to_ascii_lowercase().contains("html"))
}

// Reads the body chunk by chunk, stopping at `limit` bytes
//
// Returns: (bytes read, whether the whole body fit)
async fn read_capped(
    mut response: reqwest::Response,
    limit: usize,
    timeout: Duration,
) -> Result<(Vec<u8>, bool), FetchError> {
    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| categorize_error(e, timeout))?
    {
        if !append_capped(&mut body, &chunk, limit) {
            return Ok((body, false));
        }
    }
    Ok((body, true))
}

// Appends as much of `chunk` as fits under `limit`.
// false means the limit was reached and the rest was dropped.
fn append_capped(body: &mut Vec<u8>, chunk: &[u8], limit: usize) -> bool {
    let room = limit.saturating_sub(body.len());
    if chunk.len() > room {
        body.extend_from_slice(&chunk[..room]);
        return false;
    }
    body.extend_from_slice(chunk);
    true
}

// Categorizes reqwest errors
//
// reqwest errors can happen for many reasons:
// - Network timeout
// - DNS resolution failure / connection refused
// - SSL certificate issues
// - Too many redirects
// - Body decoding problems
fn categorize_error(error: reqwest::Error, timeout: Duration) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            secs: timeout.as_secs(),
        }
    } else if error.is_redirect() {
        FetchError::Network("too many redirects".to_string())
    } else if error.is_body() || error.is_decode() {
        FetchError::Body(error.to_string())
    } else if error.is_builder() {
        FetchError::InvalidUrl(
            error
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| error.to_string()),
        )
    } else {
        FetchError::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds() {
        assert!(HttpRenderer::new("site-mapper-test").is_ok());
    }

    #[test]
    fn test_invalid_user_agent_fails_to_start() {
        let result = HttpRenderer::new("bad\nagent");
        assert!(matches!(result, Err(ExtractError::RendererInit(_))));
    }

    #[test]
    fn test_html_detection() {
        assert!(is_html(Some("text/html; charset=utf-8")));
        assert!(is_html(Some("application/xhtml+xml")));
        assert!(is_html(None));
        assert!(!is_html(Some("application/pdf")));
        assert!(!is_html(Some("image/png")));
    }

    #[test]
    fn test_body_is_capped() {
        let mut body = Vec::new();
        assert!(append_capped(&mut body, b"hello", 8));
        assert!(!append_capped(&mut body, b"world", 8));
        assert_eq!(body, b"hellowor");
        assert!(!append_capped(&mut body, b"!", 8));
        assert_eq!(body.len(), 8);

        let mut exact = Vec::new();
        assert!(append_capped(&mut exact, b"12345678", 8));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_fetch_error() {
        let renderer = HttpRenderer::new("site-mapper-test").unwrap();
        // Port 9 (discard) on localhost is closed in any sane test environment
        let url = Url::parse("http://127.0.0.1:9/").unwrap();
        let result = renderer.render(&url, Duration::from_secs(2)).await;
        assert!(result.is_err());
    }
}
