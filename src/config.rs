// src/config.rs
// =============================================================================
// Run configuration.
//
// ExtractConfig carries every knob an extraction run needs. It starts from
// sensible defaults and is adjusted with with_* builder methods, so the CLI
// only sets what the user actually passed.
//
// RunRequest is the run trigger: the raw base URL and optional depth as they
// arrive from the outside world, validated before a run is created.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::crawl::KeyPolicy;
use crate::error::ExtractError;

/// Default crawl depth when the trigger does not specify one
pub const DEFAULT_MAX_DEPTH: usize = 2;

pub const DEFAULT_USER_AGENT: &str = concat!("site-mapper/", env!("CARGO_PKG_VERSION"));

/// Hosts whose links are never followed (share/social buttons)
pub const DEFAULT_DENY_HOSTS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
];

/// How many links may be expanded from a page at a given depth.
///
/// budget(depth) = max(start - step * depth, floor)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkBudget {
    pub start: usize,
    pub step: usize,
    pub floor: usize,
}

impl Default for LinkBudget {
    fn default() -> Self {
        Self {
            start: 50,
            step: 10,
            floor: 10,
        }
    }
}

impl LinkBudget {
    pub fn at_depth(&self, depth: usize) -> usize {
        self.start
            .saturating_sub(self.step.saturating_mul(depth))
            .max(self.floor)
    }
}

#[derive(Debug, Clone)]
pub struct ExtractConfig {
    pub base_url: Url,
    pub max_depth: usize,
    pub output_dir: PathBuf,
    /// Timeout for one page render during traversal
    pub fetch_timeout: Duration,
    /// Timeout for one sitemap/robots lookup
    pub sitemap_timeout: Duration,
    /// Visit attempts at one key before it is skipped for good
    pub loop_threshold: u32,
    pub link_budget: LinkBudget,
    pub deny_hosts: Vec<String>,
    pub key_policy: KeyPolicy,
    /// Progress total assumed while traversing (the real total is unknown)
    pub crawl_estimate: usize,
    pub user_agent: String,
}

impl ExtractConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            max_depth: DEFAULT_MAX_DEPTH,
            output_dir: PathBuf::from("extractions"),
            fetch_timeout: Duration::from_secs(20),
            sitemap_timeout: Duration::from_secs(10),
            loop_threshold: 5,
            link_budget: LinkBudget::default(),
            deny_hosts: DEFAULT_DENY_HOSTS.iter().map(|h| h.to_string()).collect(),
            key_policy: KeyPolicy::default(),
            crawl_estimate: 50,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_sitemap_timeout(mut self, timeout: Duration) -> Self {
        self.sitemap_timeout = timeout;
        self
    }

    pub fn with_deny_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into().to_lowercase();
        if !self.deny_hosts.contains(&host) {
            self.deny_hosts.push(host);
        }
        self
    }

    pub fn with_key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Raw run trigger: `{ baseUrl, maxDepth }`
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub base_url: Option<String>,
    pub max_depth: Option<usize>,
}

impl RunRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            max_depth: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Checks the trigger and turns it into a config with default settings
    pub fn validate(&self) -> Result<ExtractConfig, ExtractError> {
        let raw = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(ExtractError::MissingUrl)?;

        let url = Url::parse(raw).map_err(|e| ExtractError::InvalidUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ExtractError::InvalidUrl {
                url: raw.to_string(),
                reason: "expected an absolute http(s) URL".to_string(),
            });
        }

        Ok(ExtractConfig::new(url).with_max_depth(self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_is_rejected() {
        let err = RunRequest::default().validate().unwrap_err();
        assert!(matches!(err, ExtractError::MissingUrl));
        assert_eq!(err.to_string(), "URL is required");

        let err = RunRequest::new("   ").validate().unwrap_err();
        assert!(matches!(err, ExtractError::MissingUrl));
    }

    #[test]
    fn test_relative_url_is_rejected() {
        let err = RunRequest::new("/just/a/path").validate().unwrap_err();
        assert!(matches!(err, ExtractError::InvalidUrl { .. }));

        let err = RunRequest::new("mailto:someone@example.com").validate().unwrap_err();
        assert!(matches!(err, ExtractError::InvalidUrl { .. }));
    }

    #[test]
    fn test_default_depth() {
        let config = RunRequest::new("https://example.com").validate().unwrap();
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.loop_threshold, 5);

        let config = RunRequest::new("https://example.com")
            .with_max_depth(0)
            .validate()
            .unwrap();
        assert_eq!(config.max_depth, 0);
    }

    #[test]
    fn test_link_budget_shrinks_with_depth() {
        let budget = LinkBudget::default();
        assert_eq!(budget.at_depth(0), 50);
        assert_eq!(budget.at_depth(1), 40);
        assert_eq!(budget.at_depth(4), 10);
        assert_eq!(budget.at_depth(9), 10);
    }

    #[test]
    fn test_deny_host_is_not_duplicated() {
        let config = ExtractConfig::new(Url::parse("https://example.com").unwrap())
            .with_deny_host("Facebook.com")
            .with_deny_host("tracker.example.net");
        assert_eq!(
            config.deny_hosts.iter().filter(|h| *h == "facebook.com").count(),
            1
        );
        assert!(config.deny_hosts.contains(&"tracker.example.net".to_string()));
    }
}
