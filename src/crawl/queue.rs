// src/crawl/queue.rs
// =============================================================================
// This module implements depth-bounded website traversal.
//
// How it works:
// 1. Start with the base URL on a work stack
// 2. Pop an item, decide whether it may be fetched (depth, loops, duplicates,
//    host)
// 3. Ask the page renderer for the page and record it in the page tree
// 4. Select the page's links (see links.rs) and push them for depth + 1
// 5. Repeat until the stack is empty
//
// The stack makes this depth-first without recursion: links are pushed in
// reverse so the shallowest link of a page is crawled next. Exactly one fetch
// is in flight at a time, which keeps the load on the target site low.
//
// Per-URL failures never end the crawl. A page that fails to load is logged
// and skipped; its siblings carry on. Only cancellation stops the loop.
//
// Rust concepts:
// - Lifetimes: the Scheduler borrows the renderer and config ('a) instead
//   of owning them
// - tokio::select! to race a page fetch against the cancellation token
// - Vec as a stack (push / pop)
// =============================================================================

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::links::LinkFilter;
use super::normalize::{normalize_url, same_host, NormalizedKey};
use crate::config::ExtractConfig;
use crate::error::ExtractError;
use crate::fetch::PageRenderer;
use crate::progress::ProgressTracker;
use crate::structure::{NewPage, PageId, PageTree};

// Represents a page waiting on the work stack
#[derive(Debug, Clone)]
struct CrawlItem {
    url: Url,
    depth: usize,          // How many link hops from the base URL
    parent: Option<PageId>, // Page whose link led here
}

/// Terminal state of one popped work item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitOutcome {
    Recorded(PageId),
    Duplicate,
    LoopDetected,
    CrossOrigin,
    OverDepth,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub recorded: usize,
    pub duplicates: usize,
    pub loops: usize,
    pub cross_origin: usize,
    pub over_depth: usize,
    pub failed: usize,
}

impl CrawlStats {
    fn count(&mut self, outcome: VisitOutcome) {
        match outcome {
            VisitOutcome::Recorded(_) => self.recorded += 1,
            VisitOutcome::Duplicate => self.duplicates += 1,
            VisitOutcome::LoopDetected => self.loops += 1,
            VisitOutcome::CrossOrigin => self.cross_origin += 1,
            VisitOutcome::OverDepth => self.over_depth += 1,
            VisitOutcome::Failed => self.failed += 1,
        }
    }
}

/// Per-run crawl state. One per run, never shared.
#[derive(Debug, Default)]
pub struct CrawlContext {
    pub visited: HashSet<NormalizedKey>,
    pub loop_counter: HashMap<NormalizedKey, u32>,
    pub pages: PageTree,
    pub stats: CrawlStats,
}

impl CrawlContext {
    pub fn new() -> Self {
        Self {
            visited: HashSet::new(),
            loop_counter: HashMap::new(),
            pages: PageTree::new(),
            stats: CrawlStats::default(),
        }
    }
}

pub struct Scheduler<'a, R: PageRenderer + ?Sized> {
    renderer: &'a R,
    config: &'a ExtractConfig,
    filter: LinkFilter,
    cancel: CancellationToken,
}

impl<'a, R: PageRenderer + ?Sized> Scheduler<'a, R> {
    pub fn new(renderer: &'a R, config: &'a ExtractConfig, cancel: CancellationToken) -> Self {
        let filter = LinkFilter::new(
            config.base_url.clone(),
            &config.deny_hosts,
            config.key_policy,
        );
        Self {
            renderer,
            config,
            filter,
            cancel,
        }
    }

    // Crawls from the base URL until the work stack is empty
    //
    // Returns: Ok(()) when the crawl ran to completion (even if some pages
    // failed), Err(Cancelled) when the run was stopped.
    pub async fn traverse(
        &self,
        ctx: &mut CrawlContext,
        progress: &mut ProgressTracker,
    ) -> Result<(), ExtractError> {
        let mut stack = vec![CrawlItem {
            url: self.config.base_url.clone(),
            depth: 0,
            parent: None,
        }];

        while let Some(item) = stack.pop() {
            if self.cancel.is_cancelled() {
                return Err(ExtractError::Cancelled);
            }
            let outcome = self.visit(ctx, progress, item, &mut stack).await?;
            ctx.stats.count(outcome);
        }

        tracing::info!(
            recorded = ctx.stats.recorded,
            failed = ctx.stats.failed,
            loops = ctx.stats.loops,
            "crawl finished"
        );
        Ok(())
    }

    async fn visit(
        &self,
        ctx: &mut CrawlContext,
        progress: &mut ProgressTracker,
        item: CrawlItem,
        stack: &mut Vec<CrawlItem>,
    ) -> Result<VisitOutcome, ExtractError> {
        if item.depth > self.config.max_depth {
            return Ok(VisitOutcome::OverDepth);
        }

        let key = normalize_url(&item.url, self.config.key_policy);

        // Loop detection counts attempts, not successful visits
        let attempts = ctx.loop_counter.entry(key.clone()).or_insert(0);
        if *attempts >= self.config.loop_threshold {
            tracing::warn!(key = %key, depth = item.depth, "loop detected, skipping");
            return Ok(VisitOutcome::LoopDetected);
        }
        *attempts += 1;

        if ctx.visited.contains(&key) {
            if let (Some(existing), Some(parent)) = (ctx.pages.id_of(&key), item.parent) {
                ctx.pages.add_referrer(existing, parent);
            }
            return Ok(VisitOutcome::Duplicate);
        }

        if !same_host(&item.url, &self.config.base_url) {
            return Ok(VisitOutcome::CrossOrigin);
        }

        ctx.visited.insert(key.clone());
        progress.advance(format!("Scanning: {}", item.url.path()));
        tracing::info!(depth = item.depth, url = %item.url, "scanning");

        // Single suspension point; a stop signal wins over a slow page
        let rendered = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ExtractError::Cancelled),
            result = self.renderer.render(&item.url, self.config.fetch_timeout) => result,
        };

        let page = match rendered {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(url = %item.url, error = %e, "failed to render page");
                return Ok(VisitOutcome::Failed);
            }
        };

        let id = ctx.pages.insert(
            NewPage {
                url: item.url.to_string(),
                key,
                title: page.title.clone(),
                path: page.path.clone(),
                depth: item.depth,
            },
            item.parent,
        );

        if item.depth < self.config.max_depth {
            let budget = self.config.link_budget.at_depth(item.depth);
            let selected = self
                .filter
                .select(&page.resolved_url, &page.links, &ctx.visited, budget);
            tracing::debug!(
                depth = item.depth,
                found = page.links.len(),
                processing = selected.len(),
                "selected links"
            );

            // Reverse so the first (shallowest) link is popped first
            for url in selected.into_iter().rev() {
                stack.push(CrawlItem {
                    url,
                    depth: item.depth + 1,
                    parent: Some(id),
                });
            }
        }

        Ok(VisitOutcome::Recorded(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::fake::FakeSite;

    fn config(depth: usize) -> ExtractConfig {
        ExtractConfig::new(Url::parse("https://example.com/").unwrap()).with_max_depth(depth)
    }

    async fn crawl(site: &FakeSite, config: &ExtractConfig) -> CrawlContext {
        let scheduler = Scheduler::new(site, config, CancellationToken::new());
        let mut ctx = CrawlContext::new();
        let mut progress = ProgressTracker::new(None);
        scheduler.traverse(&mut ctx, &mut progress).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_depth_zero_records_only_root() {
        let site = FakeSite::new().page("https://example.com/", "Home", &["/a", "/b"]);
        let ctx = crawl(&site, &config(0)).await;

        assert_eq!(ctx.pages.len(), 1);
        assert!(ctx.pages.root().unwrap().children.is_empty());
        assert_eq!(site.rendered(), vec!["https://example.com/"]);
    }

    #[tokio::test]
    async fn test_fragment_and_case_variants_make_one_child() {
        let site = FakeSite::new()
            .page("https://example.com/", "Home", &["/a", "/a#frag", "/A"])
            .page("https://example.com/a", "A", &[]);
        let ctx = crawl(&site, &config(2)).await;

        let root = ctx.pages.root().unwrap();
        assert_eq!(root.children.len(), 1);
        assert_eq!(ctx.pages.get(root.children[0]).unwrap().path, "/a");
        assert_eq!(ctx.pages.len(), ctx.visited.len());
    }

    #[tokio::test]
    async fn test_never_fetches_beyond_max_depth() {
        let site = FakeSite::new()
            .page("https://example.com/", "Home", &["/one"])
            .page("https://example.com/one", "One", &["/one/two"])
            .page("https://example.com/one/two", "Two", &["/one/two/three"])
            .page("https://example.com/one/two/three", "Three", &[]);
        let ctx = crawl(&site, &config(2)).await;

        assert_eq!(ctx.pages.len(), 3);
        assert!(!site.rendered().iter().any(|u| u.ends_with("/three")));
        assert!(ctx.pages.records().iter().all(|r| r.depth <= 2));
    }

    #[tokio::test]
    async fn test_cycles_terminate_and_record_referrers() {
        let site = FakeSite::new()
            .page("https://example.com/", "Home", &["/a", "/b"])
            .page("https://example.com/a", "A", &["/b", "/"])
            .page("https://example.com/b", "B", &["/a", "/"]);
        let ctx = crawl(&site, &config(5)).await;

        assert_eq!(ctx.pages.len(), 3);
        assert_eq!(site.rendered().len(), 3);
        // /a is crawled first (document order) and reaches /b before the root's
        // own link to /b is popped
        let b = ctx.pages.get(2).unwrap();
        assert_eq!(b.path, "/b");
        assert_eq!(b.parent, Some(1));
        assert_eq!(b.referrers, vec![0]);
    }

    #[tokio::test]
    async fn test_cross_origin_and_social_links_never_recorded() {
        let site = FakeSite::new()
            .page(
                "https://example.com/",
                "Home",
                &[
                    "https://other.org/page",
                    "https://twitter.com/example",
                    "mailto:hello@example.com",
                    "/contact",
                ],
            )
            .page("https://example.com/contact", "Contact", &[]);
        let ctx = crawl(&site, &config(3)).await;

        assert_eq!(ctx.pages.len(), 2);
        assert!(ctx
            .pages
            .records()
            .iter()
            .all(|r| r.url.starts_with("https://example.com/")));
    }

    #[tokio::test]
    async fn test_failed_page_does_not_stop_siblings() {
        let site = FakeSite::new()
            .page("https://example.com/", "Home", &["/missing", "/ok"])
            .page("https://example.com/ok", "Ok", &[]);
        let ctx = crawl(&site, &config(1)).await;

        assert_eq!(ctx.stats.failed, 1);
        assert_eq!(ctx.stats.recorded, 2);
        assert_eq!(ctx.pages.len(), 2);
        assert_eq!(site.rendered().len(), 3);
    }

    #[tokio::test]
    async fn test_loop_threshold_stops_attempts() {
        let site = FakeSite::new().page("https://example.com/a", "A", &[]);
        let config = config(3);
        let scheduler = Scheduler::new(&site, &config, CancellationToken::new());
        let mut ctx = CrawlContext::new();
        let mut progress = ProgressTracker::new(None);
        let mut stack = Vec::new();

        let mut outcomes = Vec::new();
        for _ in 0..7 {
            let item = CrawlItem {
                url: Url::parse("https://example.com/a").unwrap(),
                depth: 1,
                parent: None,
            };
            outcomes.push(
                scheduler
                    .visit(&mut ctx, &mut progress, item, &mut stack)
                    .await
                    .unwrap(),
            );
        }

        assert_eq!(outcomes[0], VisitOutcome::Recorded(0));
        assert!(outcomes[1..5].iter().all(|o| *o == VisitOutcome::Duplicate));
        assert!(outcomes[5..].iter().all(|o| *o == VisitOutcome::LoopDetected));
        assert_eq!(site.rendered().len(), 1);
    }

    #[tokio::test]
    async fn test_link_budget_caps_expansion() {
        let hrefs: Vec<String> = (0..60).map(|i| format!("/p{i}")).collect();
        let refs: Vec<&str> = hrefs.iter().map(String::as_str).collect();
        let site = FakeSite::new().page("https://example.com/", "Home", &refs);
        let ctx = crawl(&site, &config(1)).await;

        // 50 links expanded from depth 0; none of them exist, so all fail
        assert_eq!(site.rendered().len(), 51);
        assert_eq!(ctx.stats.failed, 50);
    }

    #[tokio::test]
    async fn test_cancelled_run_fetches_nothing() {
        let site = FakeSite::new().page("https://example.com/", "Home", &[]);
        let config = config(2);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let scheduler = Scheduler::new(&site, &config, cancel);
        let mut ctx = CrawlContext::new();
        let mut progress = ProgressTracker::new(None);

        let result = scheduler.traverse(&mut ctx, &mut progress).await;
        assert!(matches!(result, Err(ExtractError::Cancelled)));
        assert!(site.rendered().is_empty());
    }
}
