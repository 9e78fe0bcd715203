// src/crawl/normalize.rs
// =============================================================================
// URL normalization.
//
// Every URL the crawler sees is reduced to a NormalizedKey before it is
// compared with anything else. Two URLs that only differ by fragment, letter
// case or trailing slash end up with the same key, so the crawler treats
// them as one page.
//
// The key is for comparison only. Display strings (titles, links in the
// rendered tree) keep the URL's original case.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Whether query strings take part in the key.
///
/// Traversal excludes them by default: paginated or session-parameterized
/// links otherwise turn into an endless supply of "new" pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    #[default]
    StripQuery,
    KeepQuery,
}

/// Canonical, lowercase comparison key for a URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedKey(String);

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes a raw URL string.
///
/// Never fails: a string that does not parse as a URL with a host becomes
/// a degraded key (trimmed and lowercased, otherwise as given), so case
/// variants still collapse.
pub fn normalize(raw: &str, policy: KeyPolicy) -> NormalizedKey {
    let raw = raw.trim();
    match Url::parse(raw) {
        Ok(url) if url.host_str().is_some() => normalize_url(&url, policy),
        _ => NormalizedKey(raw.to_lowercase()),
    }
}

/// Normalizes an already-parsed URL
pub fn normalize_url(url: &Url, policy: KeyPolicy) -> NormalizedKey {
    let mut key = String::with_capacity(url.as_str().len());
    key.push_str(url.scheme());
    key.push_str("://");
    key.push_str(url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        key.push(':');
        key.push_str(&port.to_string());
    }

    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        key.push('/');
    } else {
        key.push_str(path);
    }

    if policy == KeyPolicy::KeepQuery {
        if let Some(query) = url.query().filter(|q| !q.is_empty()) {
            key.push('?');
            key.push_str(query);
        }
    }

    NormalizedKey(key.to_lowercase())
}

/// True when `url` lives on the same host as `base` (case-insensitive)
pub fn same_host(url: &Url, base: &Url) -> bool {
    match (url.host_str(), base.host_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Number of non-empty path segments ("/a/b/" -> 2)
pub fn segment_count(url: &Url) -> usize {
    url.path().split('/').filter(|s| !s.is_empty()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> String {
        normalize(raw, KeyPolicy::StripQuery).to_string()
    }

    #[test]
    fn test_fragment_case_and_trailing_slash_collapse() {
        let expected = "https://example.com/docs/intro";
        assert_eq!(key("https://example.com/docs/intro"), expected);
        assert_eq!(key("https://example.com/docs/intro/"), expected);
        assert_eq!(key("https://example.com/docs/intro#setup"), expected);
        assert_eq!(key("HTTPS://Example.COM/Docs/Intro/"), expected);
    }

    #[test]
    fn test_root_keeps_single_slash() {
        assert_eq!(key("https://example.com"), "https://example.com/");
        assert_eq!(key("https://example.com/"), "https://example.com/");
        assert_eq!(key("https://example.com///"), "https://example.com/");
    }

    #[test]
    fn test_query_policy() {
        let raw = "https://example.com/list?page=2#top";
        assert_eq!(key(raw), "https://example.com/list");
        assert_eq!(
            normalize(raw, KeyPolicy::KeepQuery).to_string(),
            "https://example.com/list?page=2"
        );
    }

    #[test]
    fn test_explicit_port_is_kept() {
        assert_eq!(key("http://localhost:8080/a/"), "http://localhost:8080/a");
        assert_eq!(key("https://example.com:443/a"), "https://example.com/a");
    }

    #[test]
    fn test_malformed_url_is_degraded_not_rejected() {
        assert_eq!(key("not a url"), "not a url");
        assert_eq!(key("mailto:someone@example.com"), "mailto:someone@example.com");
    }

    #[test]
    fn test_degraded_keys_ignore_case() {
        assert_eq!(key("Not A Url"), key("not a url"));
        assert_eq!(key("  /Relative/Path "), "/relative/path");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "https://Example.com/A/b//",
            "https://example.com/x?y=1#z",
            "http://localhost:3000/",
            "https://example.com/%7Euser/",
            "garbage",
        ];
        for policy in [KeyPolicy::StripQuery, KeyPolicy::KeepQuery] {
            for raw in samples {
                let once = normalize(raw, policy);
                let twice = normalize(once.as_ref(), policy);
                assert_eq!(once, twice, "not idempotent for {raw}");
            }
        }
    }

    #[test]
    fn test_same_host_ignores_case() {
        let base = Url::parse("https://Example.com/").unwrap();
        assert!(same_host(&Url::parse("https://EXAMPLE.com/a").unwrap(), &base));
        assert!(!same_host(&Url::parse("https://other.com/a").unwrap(), &base));
    }

    #[test]
    fn test_segment_count() {
        assert_eq!(segment_count(&Url::parse("https://example.com/").unwrap()), 0);
        assert_eq!(segment_count(&Url::parse("https://example.com/a/b/").unwrap()), 2);
    }
}
