// src/cli.rs
// =============================================================================
// Command-line interface, parsed with clap's derive API.
//
// Subcommands:
// - structure: URL-path tree (sitemap first, crawl as fallback)
// - map:       page tree built by crawling from the start URL
// - rerender:  rebuild the HTML document from a saved JSON index
//
// The crawl options are shared by `structure` and `map` through a flattened
// `CrawlArgs` struct.
// =============================================================================

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_MAX_DEPTH, DEFAULT_USER_AGENT};

#[derive(Parser, Debug)]
#[command(
    name = "site-mapper",
    version,
    about = "Map the reachable page structure of a website into a collapsible tree",
    long_about = "site-mapper discovers the pages of a website (from its sitemap or by crawling \
                  same-host links) and writes a JSON index plus a self-contained HTML tree."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a URL-path tree, using the site's sitemap when it has one
    ///
    /// Example: site-mapper structure https://example.com --depth 3
    Structure {
        /// Start URL (absolute http/https)
        url: String,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Crawl the site and build a tree of pages by first discovery
    ///
    /// Example: site-mapper map https://example.com --out ./maps
    Map {
        /// Start URL (absolute http/https)
        url: String,

        #[command(flatten)]
        crawl: CrawlArgs,
    },

    /// Re-render the HTML document from a saved index.json / structure.json
    Rerender {
        /// Path to the JSON index written by an earlier run
        index: PathBuf,

        /// Where to write the document (default: next to the index)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

/// Options shared by every crawling subcommand
#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Maximum link depth from the start URL (0 = start page only)
    #[arg(long, short, default_value_t = DEFAULT_MAX_DEPTH)]
    pub depth: usize,

    /// Directory that receives one sub-directory per run
    #[arg(long, env = "SITE_MAPPER_OUT", default_value = "extractions")]
    pub out: PathBuf,

    /// Per-page timeout in seconds
    #[arg(long, default_value_t = 20)]
    pub fetch_timeout: u64,

    /// Timeout in seconds for each sitemap / robots.txt request
    #[arg(long, default_value_t = 10)]
    pub sitemap_timeout: u64,

    /// Extra host to never follow links to (repeatable)
    #[arg(long = "deny-host", value_name = "HOST")]
    pub deny_hosts: Vec<String>,

    /// Treat URLs that differ only in their query string as different pages
    #[arg(long)]
    pub keep_query: bool,

    /// User-Agent header sent with every request
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Print the run summary as JSON instead of text
    #[arg(long)]
    pub json: bool,
}
