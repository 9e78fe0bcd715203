// src/extract.rs
// =============================================================================
// One extraction run, start to finish.
//
// What happens here:
// 1. Initializing  (2%)   create the output root
// 2. Discovering   (8%)   sitemap lookup (URL-structure runs only)
// 3. Processing    (10-85%) sitemap URLs into the trie, or a crawl
// 4. Finalizing    (88-96%) build the index, write and publish artifacts
// 5. Completed     (100%)
//
// Any error that escapes is a run failure: the progress listener gets a
// final `failed` event (percentage held), the renderer is closed and nothing
// half-written is left in the output directory. That includes a renderer
// that cannot even be built: `launch` reports it the same way.
//
// The run owns its crawl state; two runs never share anything.
//
// Rust concepts:
// - Builder methods that take and return `self` (with_progress, with_cancel)
// - `run(mut self)` consumes the run, so it cannot be started twice
// - A closure factory (FnOnce) so renderer construction happens inside the
//   reported run
// =============================================================================

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ExtractConfig;
use crate::crawl::{CrawlContext, CrawlStats, Scheduler};
use crate::discover::SitemapDiscoverer;
use crate::error::ExtractError;
use crate::fetch::{Fetch, PageRenderer};
use crate::output::{self, Artifacts};
use crate::progress::{Phase, ProgressEvent, ProgressTracker};
use crate::structure::{PathTrie, Structure, StructureIndex};

/// Which structure a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Path-segment trie, sitemap first, crawl as fallback
    Structure,
    /// Page-identity tree, always crawled
    Map,
}

/// How the run found its URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Sitemap,
    Crawl,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub mode: Mode,
    pub source: Source,
    pub base_url: String,
    pub max_depth: usize,
    pub total_discovered: usize,
    pub crawl: CrawlStats,
    pub artifacts: Artifacts,
    #[serde(skip)]
    pub index: StructureIndex,
}

/// Builds the renderer, then runs one extraction with it
pub async fn launch<R, F>(
    config: ExtractConfig,
    mode: Mode,
    sink: Option<UnboundedSender<ProgressEvent>>,
    cancel: CancellationToken,
    make_renderer: F,
) -> Result<RunSummary, ExtractError>
where
    R: PageRenderer + Fetch,
    F: FnOnce(&ExtractConfig) -> Result<R, ExtractError>,
{
    let renderer = match make_renderer(&config) {
        Ok(renderer) => renderer,
        Err(e) => {
            let mut progress = ProgressTracker::new(sink);
            progress.report(Phase::Initializing, 2, "Initializing extraction...");
            tracing::error!(error = %e, "page renderer could not be started");
            progress.fail(format!("Error: {e}"));
            return Err(e);
        }
    };

    let mut run = ExtractionRun::new(config, mode, &renderer).with_cancel(cancel);
    if let Some(sink) = sink {
        run = run.with_progress(sink);
    }
    let summary = run.run().await?;
    Ok(summary)
}

pub struct ExtractionRun<'a, R: PageRenderer + Fetch + ?Sized> {
    config: ExtractConfig,
    mode: Mode,
    renderer: &'a R,
    progress: ProgressTracker,
    cancel: CancellationToken,
    run_id: String,
    crawl: CrawlContext,
}

impl<'a, R: PageRenderer + Fetch + ?Sized> ExtractionRun<'a, R> {
    pub fn new(config: ExtractConfig, mode: Mode, renderer: &'a R) -> Self {
        Self {
            config,
            mode,
            renderer,
            progress: ProgressTracker::new(None),
            cancel: CancellationToken::new(),
            run_id: Utc::now().format("%Y-%m-%dT%H-%M-%S-%3f").to_string(),
            crawl: CrawlContext::new(),
        }
    }

    pub fn with_progress(mut self, sink: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = ProgressTracker::new(Some(sink));
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    // Runs to completion or failure. The renderer is closed either way.
    pub async fn run(mut self) -> Result<RunSummary, ExtractError> {
        let result = self.execute().await;
        self.renderer.close().await;

        match result {
            Ok(summary) => Ok(summary),
            Err(e) => {
                output::discard(&self.config.output_dir, &self.run_id).await;
                let state = self.progress.state();
                tracing::error!(
                    run_id = %self.run_id,
                    phase = ?state.phase,
                    percentage = state.percentage,
                    error = %e,
                    "extraction failed"
                );
                self.progress.fail(format!("Error: {e}"));
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<RunSummary, ExtractError> {
        tracing::info!(
            run_id = %self.run_id,
            base_url = %self.config.base_url,
            max_depth = self.config.max_depth,
            mode = ?self.mode,
            "starting extraction"
        );
        self.progress
            .report(Phase::Initializing, 2, "Initializing extraction...");
        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|e| ExtractError::io(&self.config.output_dir, e))?;

        let (structure, source) = match self.mode {
            Mode::Structure => self.build_path_structure().await?,
            Mode::Map => {
                self.progress
                    .report(Phase::Discovering, 8, "Preparing crawl...");
                self.crawl_site().await?;
                let pages = std::mem::take(&mut self.crawl.pages);
                if pages.root().is_none() {
                    tracing::warn!(base_url = %self.config.base_url, "start page could not be rendered");
                }
                (Structure::Pages(pages), Source::Crawl)
            }
        };

        self.ensure_running()?;
        self.progress
            .report(Phase::Finalizing, 88, "Finalizing structure...");
        let index = StructureIndex::new(&self.config.base_url, self.config.max_depth, structure);

        self.progress
            .report(Phase::Finalizing, 92, "Generating reports...");
        let artifacts =
            output::write_artifacts(&self.config.output_dir, &self.run_id, &index).await?;
        self.progress.report(Phase::Finalizing, 96, "Files saved");

        tracing::info!(
            total = index.total_discovered,
            dir = %artifacts.dir.display(),
            "extraction completed"
        );
        self.progress.complete("Extraction completed!");

        Ok(RunSummary {
            run_id: self.run_id.clone(),
            mode: self.mode,
            source,
            base_url: self.config.base_url.to_string(),
            max_depth: self.config.max_depth,
            total_discovered: index.total_discovered,
            crawl: self.crawl.stats.clone(),
            artifacts,
            index,
        })
    }

    async fn build_path_structure(&mut self) -> Result<(Structure, Source), ExtractError> {
        let base = self.config.base_url.clone();
        let mut trie = PathTrie::new(&base);

        self.progress
            .report(Phase::Discovering, 8, "Checking for sitemap...");
        let discoverer = SitemapDiscoverer::new(self.renderer, self.config.sitemap_timeout)
            .with_key_policy(self.config.key_policy);
        let sitemap_urls = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ExtractError::Cancelled),
            urls = discoverer.discover(&base) => urls,
        };

        if sitemap_urls.is_empty() {
            self.progress
                .report(Phase::Processing, 12, "No sitemap found, starting crawl...");
            self.crawl_site().await?;
            for record in self.crawl.pages.records() {
                if let Ok(url) = Url::parse(&record.url) {
                    trie.insert(&url);
                }
            }
            tracing::debug!(nodes = trie.len(), "path tree built from crawl");
            return Ok((Structure::Paths(trie), Source::Crawl));
        }

        let total = sitemap_urls.len();
        self.progress.report(
            Phase::Processing,
            12,
            format!("Processing {total} URLs from sitemap..."),
        );
        self.progress.begin_processing(total, 10, 85, "Processing sitemap");
        // Discovery only hands back URLs on the base host
        for (i, url) in sitemap_urls.iter().enumerate() {
            self.ensure_running()?;
            trie.insert(url);
            self.progress
                .advance(format!("Processing URL {} of {total}...", i + 1));
        }
        tracing::debug!(nodes = trie.len(), "path tree built from sitemap");
        Ok((Structure::Paths(trie), Source::Sitemap))
    }

    async fn crawl_site(&mut self) -> Result<(), ExtractError> {
        self.progress.begin_processing(
            self.config.crawl_estimate,
            15,
            85,
            format!("Crawling {}", self.config.base_url),
        );
        let scheduler = Scheduler::new(self.renderer, &self.config, self.cancel.clone());
        scheduler.traverse(&mut self.crawl, &mut self.progress).await
    }

    fn ensure_running(&self) -> Result<(), ExtractError> {
        if self.cancel.is_cancelled() {
            Err(ExtractError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunRequest;
    use crate::fetch::fake::FakeSite;
    use tokio::sync::mpsc;

    const SITEMAP: &str = r#"<urlset>
        <url><loc>https://example.com/</loc></url>
        <url><loc>https://example.com/products/widgets</loc></url>
        <url><loc>https://example.com/about-us</loc></url>
    </urlset>"#;

    fn config(out: &std::path::Path, depth: usize) -> ExtractConfig {
        RunRequest::new("https://example.com")
            .with_max_depth(depth)
            .validate()
            .unwrap()
            .with_output_dir(out)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_sitemap_skips_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let site = FakeSite::new()
            .page("https://example.com/", "Home", &["/never"])
            .document("https://example.com/sitemap.xml", 200, "application/xml", SITEMAP);

        let summary = ExtractionRun::new(config(tmp.path(), 2), Mode::Structure, &site)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.source, Source::Sitemap);
        assert!(site.rendered().is_empty());
        assert_eq!(summary.total_discovered, 3);
        match &summary.index.structure {
            Structure::Paths(trie) => {
                let urls: Vec<_> = trie.nodes().iter().filter(|n| n.page).map(|n| n.url.as_str()).collect();
                assert_eq!(
                    urls,
                    vec![
                        "https://example.com/",
                        "https://example.com/products/widgets",
                        "https://example.com/about-us",
                    ]
                );
            }
            Structure::Pages(_) => panic!("expected a path trie"),
        }
        assert!(summary.artifacts.document.exists());
        assert!(site.was_closed());
    }

    #[tokio::test]
    async fn test_broken_robots_sitemap_falls_back_to_crawl() {
        let tmp = tempfile::tempdir().unwrap();
        let site = FakeSite::new()
            .document(
                "https://example.com/robots.txt",
                200,
                "text/plain",
                "Sitemap: https://example.com/map.xml",
            )
            .page("https://example.com/", "Home", &["/docs/start"])
            .page("https://example.com/docs/start", "Start", &[]);

        let summary = ExtractionRun::new(config(tmp.path(), 2), Mode::Structure, &site)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.source, Source::Crawl);
        assert_eq!(site.rendered().len(), 2);
        assert_eq!(summary.crawl.recorded, 2);
        // root + /docs/start are pages; /docs is only a path prefix
        assert_eq!(summary.total_discovered, 2);
        match &summary.index.structure {
            Structure::Paths(trie) => assert_eq!(trie.len(), 3),
            Structure::Pages(_) => panic!("expected a path trie"),
        }
    }

    #[tokio::test]
    async fn test_map_mode_depth_zero() {
        let tmp = tempfile::tempdir().unwrap();
        let site = FakeSite::new().page("https://example.com/", "Home", &["/a", "/b"]);

        let summary = ExtractionRun::new(config(tmp.path(), 0), Mode::Map, &site)
            .run()
            .await
            .unwrap();

        match &summary.index.structure {
            Structure::Pages(tree) => {
                assert_eq!(tree.len(), 1);
                assert!(tree.root().unwrap().children.is_empty());
            }
            Structure::Paths(_) => panic!("expected a page tree"),
        }
        assert!(summary.artifacts.index.ends_with("index.json"));
        assert!(summary.artifacts.document.ends_with("sitemap.html"));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_100() {
        let tmp = tempfile::tempdir().unwrap();
        let site = FakeSite::new()
            .page("https://example.com/", "Home", &["/a", "/b"])
            .page("https://example.com/a", "A", &["/b"])
            .page("https://example.com/b", "B", &[]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        ExtractionRun::new(config(tmp.path(), 2), Mode::Structure, &site)
            .with_progress(tx)
            .run()
            .await
            .unwrap();

        let events = drain(&mut rx);
        let pcts: Vec<u8> = events.iter().map(|e| e.percentage).collect();
        assert!(pcts.windows(2).all(|w| w[0] <= w[1]), "{pcts:?}");
        assert_eq!(events.first().unwrap().phase, Phase::Initializing);
        assert_eq!(events.first().unwrap().percentage, 2);
        let last = events.last().unwrap();
        assert_eq!(last.phase, Phase::Completed);
        assert_eq!(last.percentage, 100);
    }

    #[tokio::test]
    async fn test_cancelled_run_publishes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let site = FakeSite::new().page("https://example.com/", "Home", &[]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = ExtractionRun::new(config(tmp.path(), 2), Mode::Map, &site)
            .with_cancel(cancel)
            .with_progress(tx)
            .run()
            .await;

        assert!(matches!(result, Err(ExtractError::Cancelled)));
        assert!(site.rendered().is_empty());
        assert!(site.was_closed());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
        assert_eq!(drain(&mut rx).last().unwrap().phase, Phase::Failed);
    }

    #[tokio::test]
    async fn test_cancel_during_fetch_stops_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let site = FakeSite::new()
            .page("https://example.com/", "Home", &["/slow", "/later"])
            .page("https://example.com/slow", "Slow", &[])
            .page("https://example.com/later", "Later", &[])
            .stall_on("https://example.com/slow");
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let run = ExtractionRun::new(config(tmp.path(), 2), Mode::Map, &site)
            .with_cancel(cancel.clone())
            .with_progress(tx);
        let (result, ()) = tokio::join!(run.run(), async {
            site.stalled().notified().await;
            cancel.cancel();
        });

        assert!(matches!(result, Err(ExtractError::Cancelled)));
        assert_eq!(
            site.rendered(),
            vec!["https://example.com/", "https://example.com/slow"]
        );
        assert!(site.was_closed());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
        assert_eq!(drain(&mut rx).last().unwrap().phase, Phase::Failed);
    }

    #[tokio::test]
    async fn test_off_host_sitemap_falls_back_to_crawl() {
        let tmp = tempfile::tempdir().unwrap();
        let foreign = r#"<urlset>
            <url><loc>https://www.example.com/</loc></url>
            <url><loc>https://www.example.com/a</loc></url>
            <url><loc>https://www.example.com/b</loc></url>
        </urlset>"#;
        let site = FakeSite::new()
            .document("https://example.com/sitemap.xml", 200, "application/xml", foreign)
            .page("https://example.com/", "Home", &["/a"])
            .page("https://example.com/a", "A", &[]);

        let summary = ExtractionRun::new(config(tmp.path(), 2), Mode::Structure, &site)
            .run()
            .await
            .unwrap();

        assert_eq!(summary.source, Source::Crawl);
        assert_eq!(site.rendered().len(), 2);
        assert_eq!(summary.total_discovered, 2);
    }

    #[tokio::test]
    async fn test_renderer_start_failure_reaches_listener() {
        let tmp = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = launch::<FakeSite, _>(
            config(tmp.path(), 2),
            Mode::Map,
            Some(tx),
            CancellationToken::new(),
            |_| Err(ExtractError::RendererInit("invalid user agent".to_string())),
        )
        .await;

        assert!(matches!(result, Err(ExtractError::RendererInit(_))));
        let events = drain(&mut rx);
        let phases: Vec<_> = events.iter().map(|e| (e.phase, e.percentage)).collect();
        assert_eq!(phases, vec![(Phase::Initializing, 2), (Phase::Failed, 2)]);
        assert!(events[1].message.contains("invalid user agent"));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_launch_runs_with_built_renderer() {
        let tmp = tempfile::tempdir().unwrap();
        let summary = launch(
            config(tmp.path(), 1),
            Mode::Map,
            None,
            CancellationToken::new(),
            |_| Ok(FakeSite::new().page("https://example.com/", "Home", &[])),
        )
        .await
        .unwrap();
        assert_eq!(summary.total_discovered, 1);
    }

    #[tokio::test]
    async fn test_unwritable_output_is_a_run_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();
        let site = FakeSite::new().page("https://example.com/", "Home", &[]);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = ExtractionRun::new(config(&blocker, 1), Mode::Map, &site)
            .with_progress(tx)
            .run()
            .await;

        assert!(matches!(result, Err(ExtractError::Io { .. })));
        let last = drain(&mut rx).pop().unwrap();
        assert_eq!(last.phase, Phase::Failed);
        assert_eq!(last.percentage, 2);
    }
}
