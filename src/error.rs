//! Error types for wp-oembed-enum

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during username enumeration
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid URL provided
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid proxy URL provided
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),

    /// Invalid extra request header
    #[error("invalid header '{0}' (expected 'Name: value')")]
    InvalidHeader(String),

    /// Concurrency limit must be at least one
    #[error("invalid concurrency limit: {0} (must be at least 1)")]
    InvalidConcurrency(usize),

    /// Failed to create HTTP client
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    /// HTTP response error status
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    /// Document is not well-formed sitemap XML
    #[error("invalid sitemap XML: {0}")]
    InvalidSitemap(String),

    /// Sitemap index missing or unreadable; the crawl cannot start without it
    #[error("sitemap index not found or invalid at {url}: {source}")]
    SitemapIndex {
        url: String,
        #[source]
        source: Box<Error>,
    },

    /// Invalid output format specified
    #[error("invalid output format: '{0}' (valid: txt, json, csv)")]
    InvalidOutputFormat(String),

    /// Output operation failed
    #[error("output failed: {0}")]
    OutputFailed(#[source] std::io::Error),

    /// JSON serialization failed
    #[error("JSON serialization failed")]
    SerializationFailed(#[from] serde_json::Error),
}
