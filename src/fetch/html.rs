// src/fetch/html.rs
// =============================================================================
// This module pulls page data out of an HTML document.
//
// We use the `scraper` crate which:
// - Parses HTML into a DOM (Document Object Model)
// - Supports CSS selectors for finding elements
// - Is built on html5ever (Mozilla's HTML parser)
//
// We also use the `url` crate to resolve relative hrefs against the page URL,
// the same way a browser fills in `a.href`.
//
// Filtering (same host, mailto:, social hosts...) is NOT done here. This
// module reports what the page links to; the crawler decides what to follow.
// =============================================================================

use scraper::{Html, Selector};
use url::Url;

use super::PageLink;

/// Title used when a page has no <title> (or an empty one)
pub const UNTITLED: &str = "Untitled";

/// Anchor text used when a link has no visible text
const NO_TEXT: &str = "No text";

// Extracts the title and all links from an HTML document
//
// Parameters:
//   html: the HTML content to parse
//   page_url: the final URL of the page (for resolving relative links)
//
// Returns: (title, links) where every link href is absolute
//
// Links are returned in document order with exact duplicates (same href)
// removed; the first occurrence keeps its anchor text.
pub fn extract_page(html: &str, page_url: &Url) -> (String, Vec<PageLink>) {
    let document = Html::parse_document(html);

    let title = match Selector::parse("title") {
        Ok(selector) => document
            .select(&selector)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string()),
        Err(_) => UNTITLED.to_string(),
    };

    let mut links: Vec<PageLink> = Vec::new();
    let selector = match Selector::parse("a[href]") {
        Ok(selector) => selector,
        Err(_) => return (title, links),
    };

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(absolute) = resolve_url(page_url, href) else {
            continue;
        };
        if links.iter().any(|l| l.href == absolute) {
            continue;
        }

        let text = collapse_whitespace(&element.text().collect::<String>());
        links.push(PageLink {
            href: absolute,
            anchor_text: if text.is_empty() { NO_TEXT.to_string() } else { text },
        });
    }

    (title, links)
}

// Resolves a possibly-relative href to an absolute URL
//
// Examples (base = "https://example.com/page"):
//   "/docs"              -> Some("https://example.com/docs")
//   "../other"           -> Some("https://example.com/other")
//   "#top"               -> Some("https://example.com/page#top")
//   "javascript:void(0)" -> Some("javascript:void(0)") (filtered later)
//   "http://[broken"     -> None
fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.join(href).ok().map(|url| url.to_string()),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
