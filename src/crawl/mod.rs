// src/crawl/mod.rs
// =============================================================================
// This module handles website traversal.
//
// Features:
// - Depth-first crawling from the base URL with an explicit work stack
// - Same-host restriction (never leaves the target website)
// - Configurable depth limit and per-depth link budget
// - Loop protection for sites that generate endless URL variants
//
// Submodules:
// - normalize: URL -> NormalizedKey, the only identity used for dedup
// - links: which outbound links of a page get crawled
// - queue: the scheduler itself
// =============================================================================

mod links;
mod normalize;
mod queue;

pub use normalize::{normalize, same_host, KeyPolicy, NormalizedKey};
pub use queue::{CrawlContext, CrawlStats, Scheduler};
