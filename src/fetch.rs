//! HTTP fetching
//!
//! Every outbound request goes through a [`Fetcher`], which applies the same
//! timeout, proxy, headers and pre-request delay to all call sites.

use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use url::Url;

/// Default User-Agent sent on all requests
pub const DEFAULT_USER_AGENT: &str = "WPOEnum/1.0";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of concurrent extraction tasks
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default sitemap index location, relative to the base URL
pub const DEFAULT_SITEMAP_PATH: &str = "sitemap_index.xml";

/// Allowed URL schemes
const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Something that can GET a URL and hand back the response body.
///
/// Implemented by [`Fetcher`] for real HTTP; tests substitute their own.
/// Implementations return an error for transport failures and non-2xx
/// responses alike.
pub trait Transport: Send + Sync {
    /// Fetch `url` and return the response body
    fn get(&self, url: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Immutable request configuration shared by every fetch
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Site base URL without trailing slash
    pub base_url: String,
    /// Sitemap index path (relative to the base URL) or absolute URL
    pub sitemap: String,
    /// Proxy URL applied to all requests
    pub proxy: Option<String>,
    /// User-Agent header value
    pub user_agent: String,
    /// Extra headers as (name, value) pairs
    pub headers: Vec<(String, String)>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Sleep before each request
    pub delay: Duration,
    /// Maximum extraction tasks in flight
    pub concurrency: usize,
    /// Skip TLS certificate verification
    pub accept_invalid_certs: bool,
}

impl FetchConfig {
    /// Full URL of the sitemap index
    pub fn sitemap_index_url(&self) -> String {
        if self.sitemap.contains("://") {
            self.sitemap.clone()
        } else {
            format!("{}/{}", self.base_url, self.sitemap.trim_start_matches('/'))
        }
    }
}

/// Builder for configuring a Fetcher with options
#[derive(Debug)]
pub struct FetcherBuilder {
    url: String,
    sitemap: String,
    proxy: Option<String>,
    user_agent: String,
    headers: Vec<String>,
    timeout: Duration,
    delay: Duration,
    concurrency: usize,
    accept_invalid_certs: bool,
}

impl FetcherBuilder {
    /// Create a new builder for the given URL or domain
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            sitemap: DEFAULT_SITEMAP_PATH.to_string(),
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            delay: Duration::ZERO,
            concurrency: DEFAULT_CONCURRENCY,
            accept_invalid_certs: false,
        }
    }

    /// Sitemap index path relative to the base URL, or an absolute URL
    pub fn sitemap(mut self, sitemap: impl Into<String>) -> Self {
        self.sitemap = sitemap.into();
        self
    }

    /// Route all requests through a proxy (http, https or socks5)
    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add an extra header in `Name: value` form
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sleep this long before every request
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Maximum number of extraction tasks running at once
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Accept invalid TLS certificates (self-signed or staging targets)
    ///
    /// Off by default. Only enable this for targets you already trust.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Validate the options and freeze them into a [`FetchConfig`]
    pub fn build_config(self) -> Result<FetchConfig> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConcurrency(self.concurrency));
        }

        let headers = self
            .headers
            .iter()
            .map(|raw| parse_header(raw))
            .collect::<Result<Vec<_>>>()?;

        if let Some(proxy) = &self.proxy {
            Proxy::all(proxy).map_err(|e| Error::InvalidProxy(e.to_string()))?;
        }

        Ok(FetchConfig {
            base_url: normalize_base_url(&self.url)?,
            sitemap: self.sitemap,
            proxy: self.proxy,
            user_agent: self.user_agent,
            headers,
            timeout: self.timeout,
            delay: self.delay,
            concurrency: self.concurrency,
            accept_invalid_certs: self.accept_invalid_certs,
        })
    }

    /// Build the Fetcher with the configured options
    pub fn build(self) -> Result<Fetcher> {
        Fetcher::from_config(self.build_config()?)
    }
}

/// HTTP fetcher bound to one immutable configuration
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    config: Arc<FetchConfig>,
}

impl Fetcher {
    /// Create a fetcher for the given URL or domain with default settings
    ///
    /// For more options, use [`Fetcher::builder()`].
    pub fn new(url: &str) -> Result<Self> {
        FetcherBuilder::new(url).build()
    }

    /// Create a builder for configuring fetcher options
    ///
    /// # Example
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use wp_oembed_enum::Fetcher;
    ///
    /// let fetcher = Fetcher::builder("example.com")
    ///     .delay(Duration::from_millis(250))
    ///     .proxy(Some("socks5://127.0.0.1:9050".to_string()))
    ///     .build()?;
    /// # Ok::<(), wp_oembed_enum::Error>(())
    /// ```
    pub fn builder(url: &str) -> FetcherBuilder {
        FetcherBuilder::new(url)
    }

    /// Build a fetcher from a configuration
    pub fn from_config(config: FetchConfig) -> Result<Self> {
        if config.concurrency == 0 {
            return Err(Error::InvalidConcurrency(config.concurrency));
        }

        let mut default_headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidHeader(name.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader(value.clone()))?;
            default_headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(default_headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(proxy) = &config.proxy {
            let proxy = Proxy::all(proxy).map_err(|e| Error::InvalidProxy(e.to_string()))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    /// The configuration this fetcher was built with
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch a URL and return its body
    ///
    /// Sleeps for the configured delay first. Transport errors, timeouts and
    /// non-2xx statuses are returned as errors; nothing is retried.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if !self.config.delay.is_zero() {
            tokio::time::sleep(self.config.delay).await;
        }

        trace!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::HttpRequest(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::HttpStatus(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::HttpRequest(e.to_string()))?;
        Ok(body.to_vec())
    }
}

impl Transport for Fetcher {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch(url).await
    }
}

/// Normalize a user-supplied site URL
///
/// Adds `https://` when no scheme is given, rejects anything but http(s),
/// and strips trailing slashes.
fn normalize_base_url(url: &str) -> Result<String> {
    let url = url.trim();
    let url_with_scheme = if !url.contains("://") {
        format!("https://{}", url)
    } else {
        url.to_string()
    };

    let parsed = Url::parse(&url_with_scheme).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(Error::InvalidUrl(format!(
            "scheme '{}' not allowed (use http or https)",
            parsed.scheme()
        )));
    }

    if parsed.host_str().is_none() {
        return Err(Error::InvalidUrl("missing host".to_string()));
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

/// Split a `Name: value` header and check both halves are valid HTTP
fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| Error::InvalidHeader(raw.to_string()))?;
    let (name, value) = (name.trim(), value.trim());

    if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err()
    {
        return Err(Error::InvalidHeader(raw.to_string()));
    }

    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_url() {
        let fetcher = Fetcher::new("https://example.com");
        assert!(fetcher.is_ok());
    }

    #[test]
    fn parse_invalid_url() {
        let fetcher = Fetcher::new("not a url");
        assert!(fetcher.is_err());
    }

    #[test]
    fn adds_https_scheme() {
        let config = FetcherBuilder::new("example.com").build_config().unwrap();
        assert_eq!(config.base_url, "https://example.com");
    }

    #[test]
    fn strips_trailing_slashes() {
        let config = FetcherBuilder::new("http://example.com/blog//")
            .build_config()
            .unwrap();
        assert_eq!(config.base_url, "http://example.com/blog");
    }

    #[test]
    fn reject_file_scheme() {
        let result = Fetcher::new("file:///etc/passwd");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("scheme"));
    }

    #[test]
    fn reject_ftp_scheme() {
        let result = Fetcher::new("ftp://example.com");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("scheme"));
    }

    #[test]
    fn defaults() {
        let config = FetcherBuilder::new("example.com").build_config().unwrap();
        assert_eq!(config.user_agent, "WPOEnum/1.0");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.delay, Duration::ZERO);
        assert_eq!(config.concurrency, 20);
        assert!(!config.accept_invalid_certs);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn sitemap_index_url_default() {
        let config = FetcherBuilder::new("https://example.com/")
            .build_config()
            .unwrap();
        assert_eq!(
            config.sitemap_index_url(),
            "https://example.com/sitemap_index.xml"
        );
    }

    #[test]
    fn sitemap_index_url_custom_path() {
        let config = FetcherBuilder::new("https://example.com")
            .sitemap("/wp-sitemap.xml")
            .build_config()
            .unwrap();
        assert_eq!(config.sitemap_index_url(), "https://example.com/wp-sitemap.xml");
    }

    #[test]
    fn sitemap_index_url_absolute() {
        let config = FetcherBuilder::new("https://example.com")
            .sitemap("https://cdn.example.com/sitemap.xml")
            .build_config()
            .unwrap();
        assert_eq!(
            config.sitemap_index_url(),
            "https://cdn.example.com/sitemap.xml"
        );
    }

    #[test]
    fn reject_zero_concurrency() {
        let result = FetcherBuilder::new("example.com").concurrency(0).build();
        assert!(matches!(result, Err(Error::InvalidConcurrency(0))));
    }

    #[test]
    fn from_config_rejects_zero_concurrency() {
        let mut config = FetcherBuilder::new("example.com").build_config().unwrap();
        config.concurrency = 0;
        let result = Fetcher::from_config(config);
        assert!(matches!(result, Err(Error::InvalidConcurrency(0))));
    }

    #[test]
    fn parse_extra_header() {
        assert_eq!(
            parse_header("X-Forwarded-For: 10.0.0.1").unwrap(),
            ("X-Forwarded-For".to_string(), "10.0.0.1".to_string())
        );
    }

    #[test]
    fn reject_malformed_header() {
        assert!(parse_header("no separator").is_err());
        assert!(parse_header("bad name: value").is_err());

        let result = FetcherBuilder::new("example.com")
            .header("missing-colon")
            .build();
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn accepts_socks_proxy() {
        let result = FetcherBuilder::new("example.com")
            .proxy(Some("socks5://127.0.0.1:9050".to_string()))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn reject_invalid_proxy() {
        let result = FetcherBuilder::new("example.com")
            .proxy(Some("::not a proxy::".to_string()))
            .build_config();
        assert!(matches!(result, Err(Error::InvalidProxy(_))));
    }
}
