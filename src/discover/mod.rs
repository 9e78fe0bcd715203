// src/discover/mod.rs
// =============================================================================
// URL discovery without crawling.
//
// If a site publishes a sitemap, it already lists its pages, and reading one
// XML file is far cheaper than rendering every page. Discovery is always
// best-effort: it never fails, it only comes back empty.
// =============================================================================

mod sitemap;

pub use sitemap::SitemapDiscoverer;
