// src/fetch/mod.rs
// =============================================================================
// This module is the boundary to the outside world: everything that talks to
// the target site goes through one of the two traits defined here.
//
// - PageRenderer: turns a URL into page data (title, final URL, links).
//   Used by the crawl scheduler.
// - Fetch: plain GET returning status, content type and raw bytes.
//   Used by sitemap discovery.
//
// Submodules:
// - http: HttpRenderer, the reqwest-backed implementation of both traits
// - html: pulls the title and <a href> links out of an HTML document
//
// Keeping these behind traits lets a script-executing renderer replace the
// HTTP one without the crawler noticing, and lets tests run without network.
// =============================================================================

mod html;
mod http;

use async_trait::async_trait;
use std::time::Duration;
use url::Url;

use crate::error::FetchError;

pub use html::extract_page;
pub use http::HttpRenderer;

/// One outbound link as found on a rendered page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    /// Absolute URL (already resolved against the page URL)
    pub href: String,
    pub anchor_text: String,
}

/// What the renderer hands back for one URL
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub title: String,
    /// Final URL after redirects
    pub resolved_url: Url,
    /// Path of the resolved URL
    pub path: String,
    pub links: Vec<PageLink>,
}

/// Raw response used by sitemap discovery
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Renders pages for the crawl scheduler
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, FetchError>;

    /// Releases whatever the renderer holds (browser, connections).
    /// Called once when a run ends, whether it finished or was cancelled.
    async fn close(&self) {}
}

/// Plain document fetcher for sitemap discovery
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<FetchedBody, FetchError>;
}
