//! Author slug extraction through the oEmbed endpoint

use crate::error::{Error, Result};
use crate::fetch::Transport;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

/// WordPress oEmbed endpoint, relative to the site base URL
const OEMBED_PATH: &str = "/wp-json/oembed/1.0/embed";

/// Author archive path; the first capture is the username
static AUTHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/author/([^/]+)/").expect("author pattern is valid"));

/// Build the oEmbed query URL for a post
///
/// `base_url` must not end with a slash.
pub fn oembed_url(base_url: &str, post_url: &str) -> Result<Url> {
    let mut url = Url::parse(&format!("{}{}", base_url, OEMBED_PATH))
        .map_err(|e| Error::InvalidUrl(e.to_string()))?;
    url.query_pairs_mut().append_pair("url", post_url);
    Ok(url)
}

/// Derive a username from an author profile URL
///
/// Accepts absolute URLs and root-relative paths. Only the path is matched,
/// so a query string or host containing `/author/` does not count. The slug
/// is returned exactly as it appears in the URL, without re-encoding.
pub fn username_from_author_url(author_url: &str) -> Option<String> {
    let path = raw_path(author_url)?;

    AUTHOR_RE
        .captures(path)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// Path component of a URL as written, without query or fragment
fn raw_path(url: &str) -> Option<&str> {
    let rest = if url.starts_with('/') && !url.starts_with("//") {
        url
    } else {
        Url::parse(url).ok()?;
        let (_, after_scheme) = url.split_once("://")?;
        let start = after_scheme
            .find(['/', '?', '#'])
            .unwrap_or(after_scheme.len());
        &after_scheme[start..]
    };

    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Read `author_url` from an oEmbed JSON object and derive the username
pub fn username_from_oembed(body: &[u8]) -> Option<String> {
    let response: Value = serde_json::from_slice(body).ok()?;
    let author_url = response.as_object()?.get("author_url")?.as_str()?;
    username_from_author_url(author_url)
}

/// Looks up the author of individual posts
#[derive(Debug)]
pub struct UsernameExtractor<'a, T> {
    transport: &'a T,
    base_url: &'a str,
}

impl<'a, T: Transport> UsernameExtractor<'a, T> {
    /// Create an extractor for the site at `base_url` (no trailing slash)
    pub fn new(transport: &'a T, base_url: &'a str) -> Self {
        Self {
            transport,
            base_url,
        }
    }

    /// Find the author username of a post
    ///
    /// Never fails: private posts, a disabled REST API, or a response without
    /// an author all just yield `None`.
    pub async fn extract(&self, post_url: &str) -> Option<String> {
        let url = match oembed_url(self.base_url, post_url) {
            Ok(url) => url,
            Err(e) => {
                debug!(post = post_url, error = %e, "Cannot build oEmbed URL");
                return None;
            }
        };

        let body = match self.transport.get(url.as_str()).await {
            Ok(body) => body,
            Err(e) => {
                debug!(post = post_url, error = %e, "oEmbed lookup failed");
                return None;
            }
        };

        let username = username_from_oembed(&body);
        if username.is_none() {
            debug!(post = post_url, "No author in oEmbed response");
        }
        username
    }
}
