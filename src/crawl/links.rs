// src/crawl/links.rs
// =============================================================================
// Link selection: which of a page's outbound links get crawled next.
//
// Steps, in order:
// 1. Drop non-navigational links (javascript:, mailto:, tel:, bare #anchors,
//    anchors back into the current page, non-http schemes)
// 2. Drop links to other hosts and to denied hosts (share/social buttons)
// 3. Drop links whose key is already visited
// 4. Deduplicate by normalized key, keeping the first occurrence
// 5. Order shallow paths first (fewer path segments)
// 6. Keep only as many as the depth's link budget allows
//
// Ordering decides what gets crawled first when the budget runs out; it does
// not affect which pages are considered duplicates.
//
// Rust concepts used:
// - Option<T> with `?`: accept() bails out at the first check that fails
// - Iterator adapters (filter_map, filter) chained into one pass
// - A closure that mutates captured state (`seen.insert` inside filter)
// - Stable sort: sort_by_key keeps the original order for equal keys
// =============================================================================

use std::collections::HashSet;
use url::Url;

use super::normalize::{normalize_url, same_host, segment_count, KeyPolicy, NormalizedKey};
use crate::fetch::PageLink;

const SKIPPED_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:"];

#[derive(Debug, Clone)]
pub struct LinkFilter {
    base: Url,
    deny_hosts: Vec<String>,
    policy: KeyPolicy,
}

impl LinkFilter {
    pub fn new(base: Url, deny_hosts: &[String], policy: KeyPolicy) -> Self {
        // Hosts are compared lowercased, so store them that way once
        Self {
            base,
            deny_hosts: deny_hosts.iter().map(|h| h.to_lowercase()).collect(),
            policy,
        }
    }

    /// Parses and checks one link. `None` means "never follow this".
    pub fn accept(&self, page_url: &Url, href: &str) -> Option<Url> {
        let trimmed = href.trim();

        // Cheap string checks before paying for a URL parse
        let lower = trimmed.to_ascii_lowercase();
        if SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            return None;
        }

        // Links arrive already resolved against the page, so anything that
        // does not parse on its own is garbage
        let url = Url::parse(trimmed).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        // "/page#section" while on /page is the same document
        if url.fragment().is_some() && same_document(&url, page_url) {
            return None;
        }
        if !same_host(&url, &self.base) {
            return None;
        }
        if self.is_denied(&url) {
            return None;
        }
        Some(url)
    }

    // Share buttons usually live on the site itself but carry the social
    // host somewhere in the URL ("/share?to=twitter.com"), so match the
    // whole string as well as the host.
    fn is_denied(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let full = url.as_str().to_ascii_lowercase();
        self.deny_hosts.iter().any(|denied| {
            host == *denied || host.ends_with(&format!(".{denied}")) || full.contains(denied.as_str())
        })
    }

    /// Runs the full selection pipeline over a rendered page's links
    pub fn select(
        &self,
        page_url: &Url,
        links: &[PageLink],
        visited: &HashSet<NormalizedKey>,
        budget: usize,
    ) -> Vec<Url> {
        // Keys already picked from this page; `visited` only knows about
        // pages from earlier in the crawl
        let mut seen: HashSet<NormalizedKey> = HashSet::new();
        let mut selected: Vec<Url> = links
            .iter()
            .filter_map(|link| self.accept(page_url, &link.href))
            .filter(|url| {
                let key = normalize_url(url, self.policy);
                !visited.contains(&key) && seen.insert(key)
            })
            .collect();

        // sort_by_key is stable: equal depths keep document order
        selected.sort_by_key(segment_count);
        selected.truncate(budget);
        selected
    }
}

// Compares two URLs with their #fragment removed.
// Url has no "equal ignoring fragment", so clone and clear.
fn same_document(a: &Url, b: &Url) -> bool {
    let mut a = a.clone();
    let mut b = b.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}
