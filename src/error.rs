// src/error.rs
// =============================================================================
// Error types shared across the crate.
//
// Two layers:
// - FetchError: a single page or sitemap lookup failed. Always recovered locally
//   (the node is skipped, the next sitemap location is tried).
// - ExtractError: the whole run failed. This is the only error that reaches
//   the caller of an extraction run.
// =============================================================================

use std::path::PathBuf;
use thiserror::Error;

/// Failure while fetching one URL (page render or sitemap lookup)
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request did not finish within its per-fetch timeout
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The server answered with a non-success status
    #[error("HTTP {0}")]
    Status(u16),

    /// Connection, DNS, TLS or redirect failure
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be read or decoded
    #[error("failed to read body: {0}")]
    Body(String),

    /// The URL could not be parsed
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}

/// Failure that aborts an extraction run
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("URL is required")]
    MissingUrl,

    #[error("invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to initialise page renderer: {0}")]
    RendererInit(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize structure index: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("extraction cancelled")]
    Cancelled,
}

impl ExtractError {
    /// Wraps an I/O error with the path it happened at
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }
}
