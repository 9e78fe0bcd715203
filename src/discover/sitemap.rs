// src/discover/sitemap.rs
// =============================================================================
// Cheap URL discovery through sitemap.xml / robots.txt.
//
// Strategy:
// - Try a fixed list of well-known paths on the base origin, in order
// - XML answers are read for <url><loc> entries
// - robots.txt is scanned for a "Sitemap: <url>" line; that sitemap is
//   fetched and read the same way (one hop only, no sitemap-index recursion)
// - Entries on another host are dropped, duplicates (same normalized key)
//   are collapsed
// - The first location that still yields URLs after that wins
//
// Every failure (network, status, bad XML, timeout, oversized body) just
// moves on to the next location. An empty result tells the caller to crawl
// instead.
//
// Rust concepts used:
// - Generic struct over a trait object-compatible bound (F: Fetch + ?Sized)
// - quick-xml's pull parser: we ask for one event at a time and keep two
//   booleans of state instead of building a DOM
// - std::io::Read::take to put a ceiling on gzip inflation
// =============================================================================

use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use std::io::Read;
use std::time::Duration;
use url::Url;

use crate::crawl::{normalize, same_host, KeyPolicy};
use crate::fetch::{Fetch, FetchedBody};

/// Tried in this order; the first success wins
pub const WELL_KNOWN_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap.xml.gz",
    "/robots.txt",
];

const ROBOTS_PATH: &str = "/robots.txt";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Largest uncompressed sitemap we accept (the sitemaps.org limit is 50MB)
pub const MAX_SITEMAP_BYTES: u64 = 50 * 1024 * 1024;

pub struct SitemapDiscoverer<'a, F: Fetch + ?Sized> {
    fetcher: &'a F,
    timeout: Duration,
    key_policy: KeyPolicy,
    max_bytes: u64,
}

impl<'a, F: Fetch + ?Sized> SitemapDiscoverer<'a, F> {
    pub fn new(fetcher: &'a F, timeout: Duration) -> Self {
        Self {
            fetcher,
            timeout,
            key_policy: KeyPolicy::default(),
            max_bytes: MAX_SITEMAP_BYTES,
        }
    }

    /// Which URL variants count as the same entry when collapsing duplicates
    pub fn with_key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    /// Returns the sitemap's URLs in document order, or an empty list
    pub async fn discover(&self, base: &Url) -> Vec<Url> {
        for path in WELL_KNOWN_PATHS {
            let Ok(candidate) = base.join(path) else {
                continue;
            };

            let Some(body) = self.fetch_ok(&candidate).await else {
                continue;
            };

            if *path == ROBOTS_PATH {
                let text = String::from_utf8_lossy(&body.body);
                if let Some(target) = sitemap_directive(&text).and_then(|s| base.join(s).ok()) {
                    tracing::info!(sitemap = %target, "found sitemap in robots.txt");
                    // One level of indirection: whatever this yields is final
                    return self.fetch_sitemap(&target, base).await;
                }
                continue;
            }

            let gzipped = body.body.starts_with(&GZIP_MAGIC);
            if !gzipped && !is_xml(body.content_type.as_deref()) {
                tracing::debug!(candidate = %candidate, "not an XML response");
                continue;
            }

            match self.read_sitemap(&body.body, base) {
                Some(urls) if !urls.is_empty() => {
                    tracing::info!(candidate = %candidate, count = urls.len(), "sitemap found");
                    return urls;
                }
                Some(_) => {
                    tracing::debug!(candidate = %candidate, "sitemap has no entries on this host");
                }
                None => {}
            }
        }

        Vec::new()
    }

    async fn fetch_sitemap(&self, url: &Url, base: &Url) -> Vec<Url> {
        match self.fetch_ok(url).await {
            Some(body) => self.read_sitemap(&body.body, base).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    // Reads a (possibly gzipped) sitemap body into same-host, de-duplicated
    // URLs in document order. None means the body could not be decoded or
    // parsed.
    fn read_sitemap(&self, body: &[u8], base: &Url) -> Option<Vec<Url>> {
        let xml = if body.starts_with(&GZIP_MAGIC) {
            inflate(body, self.max_bytes)?
        } else {
            body.to_vec()
        };

        let locs = parse_sitemap_locs(&xml)?;
        let mut seen = HashSet::new();
        let urls = locs
            .iter()
            .filter(|loc| seen.insert(normalize(loc.as_str(), self.key_policy)))
            .filter_map(|loc| Url::parse(loc).ok())
            .filter(|url| {
                let keep = same_host(url, base);
                if !keep {
                    tracing::debug!(url = %url, "sitemap entry on another host, skipped");
                }
                keep
            })
            .collect();
        Some(urls)
    }

    async fn fetch_ok(&self, url: &Url) -> Option<FetchedBody> {
        match self.fetcher.get(url, self.timeout).await {
            Ok(body) if body.is_success() => Some(body),
            Ok(body) => {
                tracing::debug!(url = %url, status = body.status, "sitemap lookup returned non-success");
                None
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "sitemap lookup failed");
                None
            }
        }
    }
}

fn is_xml(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("xml"))
}

/// First "Sitemap:" value in a robots.txt, matched case-insensitively
pub fn sitemap_directive(robots: &str) -> Option<&str> {
    robots.lines().find_map(|line| {
        let line = line.trim();
        let (name, value) = line.split_once(':')?;
        if !name.trim().eq_ignore_ascii_case("sitemap") {
            return None;
        }
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    })
}

// Inflates a gzip body, refusing anything that grows beyond `limit` bytes
fn inflate(body: &[u8], limit: u64) -> Option<Vec<u8>> {
    let mut inflated = Vec::new();
    // One byte over the limit is enough to tell "too big" from "exactly full"
    let mut reader = GzDecoder::new(body).take(limit + 1);
    if let Err(e) = reader.read_to_end(&mut inflated) {
        tracing::debug!(error = %e, "failed to inflate gzip sitemap");
        return None;
    }
    if inflated.len() as u64 > limit {
        tracing::warn!(limit, "gzip sitemap inflates past the size limit, ignored");
        return None;
    }
    Some(inflated)
}

/// Extracts the text of every <loc> nested in a <url> element.
///
/// <sitemap><loc> entries of a sitemap index are ignored.
pub fn parse_sitemap_locs(xml: &[u8]) -> Option<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_url = false;
    let mut in_loc = false;
    let mut locs = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"url" => in_url = true,
                b"loc" if in_url => in_loc = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"url" => in_url = false,
                b"loc" => in_loc = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_loc => {
                if let Ok(text) = t.unescape() {
                    push_loc(&mut locs, &text);
                }
            }
            Ok(Event::CData(c)) if in_loc => {
                push_loc(&mut locs, &String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "malformed sitemap XML");
                return None;
            }
            _ => {}
        }
        buf.clear();
    }

    Some(locs)
}

fn push_loc(locs: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        locs.push(text.to_string());
    }
}
