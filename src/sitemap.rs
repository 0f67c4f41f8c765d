//! Sitemap discovery
//!
//! Resolves a sitemap index into the flat list of post URLs it points at.
//! Only one level of indirection is followed: index → child sitemaps → posts.

use crate::error::{Error, Result};
use crate::fetch::Transport;
use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use tracing::{debug, info, warn};

/// XML namespace of the sitemaps.org protocol
pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// A parsed sitemap document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sitemap {
    /// `<sitemapindex>`: locations of other sitemaps
    Index(Vec<String>),
    /// `<urlset>` (or any other root): locations of content pages
    UrlSet(Vec<String>),
}

impl Sitemap {
    /// The `<loc>` entries regardless of document kind
    pub fn locations(&self) -> &[String] {
        match self {
            Self::Index(locs) | Self::UrlSet(locs) => locs,
        }
    }

    /// Consume the document and return its `<loc>` entries
    pub fn into_locations(self) -> Vec<String> {
        match self {
            Self::Index(locs) | Self::UrlSet(locs) => locs,
        }
    }

    /// Whether this document is a sitemap index
    pub fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }
}

/// Parse a sitemap document
///
/// Collects the text of every `<loc>` element in the sitemaps.org namespace.
/// Anything that is not well-formed XML is an error. Text is decoded with the
/// encoding named in the XML declaration (UTF-8 when there is none).
pub fn parse_sitemap(body: &[u8]) -> Result<Sitemap> {
    let mut reader = NsReader::from_reader(body);

    let mut root: Option<Vec<u8>> = None;
    let mut depth = 0usize;
    let mut current_loc: Option<String> = None;
    let mut locs = Vec::new();

    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|e| Error::InvalidSitemap(e.to_string()))?;
        let in_sitemap_ns =
            matches!(ns, ResolveResult::Bound(Namespace(n)) if n == SITEMAP_NS.as_bytes());

        match event {
            Event::Start(start) => {
                if depth == 0 {
                    if root.is_some() {
                        return Err(Error::InvalidSitemap(
                            "multiple root elements".to_string(),
                        ));
                    }
                    root = Some(start.local_name().as_ref().to_vec());
                }
                depth += 1;
                if in_sitemap_ns && start.local_name().as_ref() == b"loc" {
                    current_loc = Some(String::new());
                }
            }
            Event::Empty(empty) => {
                if depth == 0 {
                    if root.is_some() {
                        return Err(Error::InvalidSitemap(
                            "multiple root elements".to_string(),
                        ));
                    }
                    root = Some(empty.local_name().as_ref().to_vec());
                }
            }
            Event::Text(t) => {
                if depth == 0 && !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(Error::InvalidSitemap(
                        "text outside the root element".to_string(),
                    ));
                }
                if let Some(loc) = current_loc.as_mut() {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| Error::InvalidSitemap(e.to_string()))?;
                    loc.push_str(&unescaped);
                }
            }
            Event::CData(c) => {
                if let Some(loc) = current_loc.as_mut() {
                    let decoded = reader
                        .decoder()
                        .decode(&c)
                        .map_err(|e| Error::InvalidSitemap(e.to_string()))?;
                    loc.push_str(&decoded);
                }
            }
            Event::End(end) => {
                depth = depth.saturating_sub(1);
                if in_sitemap_ns
                    && end.local_name().as_ref() == b"loc"
                    && let Some(loc) = current_loc.take()
                {
                    let loc = loc.trim();
                    if !loc.is_empty() {
                        locs.push(loc.to_string());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(Error::InvalidSitemap(
            "unexpected end of document".to_string(),
        ));
    }

    match root.as_deref() {
        None => Err(Error::InvalidSitemap("no root element".to_string())),
        Some(b"sitemapindex") => Ok(Sitemap::Index(locs)),
        Some(_) => Ok(Sitemap::UrlSet(locs)),
    }
}

/// Resolves sitemap indexes into post URLs
#[derive(Debug)]
pub struct SitemapResolver<'a, T> {
    transport: &'a T,
}

impl<'a, T: Transport> SitemapResolver<'a, T> {
    /// Create a resolver that fetches through `transport`
    pub fn new(transport: &'a T) -> Self {
        Self { transport }
    }

    /// Fetch and parse a single sitemap document
    pub async fn fetch_sitemap(&self, url: &str) -> Result<Sitemap> {
        let body = self.transport.get(url).await?;
        parse_sitemap(&body)
    }

    /// Fetch the sitemap index and validate it
    ///
    /// Failure here is fatal for the whole run.
    pub async fn fetch_index(&self, index_url: &str) -> Result<Sitemap> {
        self.fetch_sitemap(index_url)
            .await
            .map_err(|source| Error::SitemapIndex {
                url: index_url.to_string(),
                source: Box::new(source),
            })
    }

    /// Fetch the sitemap index and return the child sitemap URLs it lists
    pub async fn fetch_index_children(&self, index_url: &str) -> Result<Vec<String>> {
        Ok(self.fetch_index(index_url).await?.into_locations())
    }

    /// Fetch a leaf sitemap and return its post URLs
    ///
    /// Never fails: an unreachable or malformed child, or one that turns out
    /// to be another index, contributes no URLs.
    pub async fn fetch_leaf_post_urls(&self, sitemap_url: &str) -> Vec<String> {
        match self.fetch_sitemap(sitemap_url).await {
            Ok(Sitemap::UrlSet(urls)) => {
                debug!(sitemap = sitemap_url, count = urls.len(), "Parsed sitemap");
                urls
            }
            Ok(Sitemap::Index(children)) => {
                warn!(
                    sitemap = sitemap_url,
                    children = children.len(),
                    "Skipping nested sitemap index"
                );
                Vec::new()
            }
            Err(e) => {
                warn!(sitemap = sitemap_url, error = %e, "Skipping sitemap");
                Vec::new()
            }
        }
    }

    /// Resolve the sitemap index into the flat list of post URLs
    ///
    /// Duplicates are kept. If the index location actually serves a plain
    /// `<urlset>`, its entries are returned as post URLs directly.
    pub async fn resolve_index(&self, index_url: &str) -> Result<Vec<String>> {
        let children = match self.fetch_index(index_url).await? {
            Sitemap::Index(children) => children,
            Sitemap::UrlSet(urls) => {
                info!(
                    count = urls.len(),
                    "Sitemap index is a plain urlset, using its entries as posts"
                );
                return Ok(urls);
            }
        };

        info!("Found {} sitemap files", children.len());

        let mut post_urls = Vec::new();
        for child in &children {
            info!("Processing: {}", child);
            post_urls.extend(self.fetch_leaf_post_urls(child).await);
        }

        info!("Found {} total posts", post_urls.len());
        Ok(post_urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/post-sitemap.xml</loc><lastmod>2024-01-01</lastmod></sitemap>
  <sitemap><loc>https://example.com/page-sitemap.xml</loc></sitemap>
</sitemapindex>"#;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<?xml-stylesheet type="text/xsl" href="//example.com/main-sitemap.xsl"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url>
    <loc>https://example.com/hello-world/</loc>
    <image:image><image:loc>https://example.com/a.png</image:loc></image:image>
  </url>
  <url><loc> https://example.com/?p=2&amp;x=1 </loc></url>
</urlset>"#;

    #[test]
    fn parse_index() {
        let sitemap = parse_sitemap(INDEX.as_bytes()).unwrap();
        assert!(sitemap.is_index());
        assert_eq!(
            sitemap.locations(),
            [
                "https://example.com/post-sitemap.xml",
                "https://example.com/page-sitemap.xml"
            ]
        );
    }

    #[test]
    fn parse_urlset_ignores_foreign_namespaces() {
        let sitemap = parse_sitemap(URLSET.as_bytes()).unwrap();
        assert_eq!(
            sitemap,
            Sitemap::UrlSet(vec![
                "https://example.com/hello-world/".to_string(),
                "https://example.com/?p=2&x=1".to_string(),
            ])
        );
    }

    #[test]
    fn loc_without_namespace_is_ignored() {
        let xml = "<urlset><url><loc>https://example.com/a/</loc></url></urlset>";
        assert_eq!(parse_sitemap(xml.as_bytes()).unwrap(), Sitemap::UrlSet(vec![]));
    }

    #[test]
    fn prefixed_namespace() {
        let xml = format!(
            r#"<sm:sitemapindex xmlns:sm="{SITEMAP_NS}"><sm:sitemap><sm:loc>https://example.com/s.xml</sm:loc></sm:sitemap></sm:sitemapindex>"#
        );
        assert_eq!(
            parse_sitemap(xml.as_bytes()).unwrap(),
            Sitemap::Index(vec!["https://example.com/s.xml".to_string()])
        );
    }

    #[test]
    fn cdata_loc() {
        let xml = format!(
            r#"<urlset xmlns="{SITEMAP_NS}"><url><loc><![CDATA[https://example.com/c/]]></loc></url></urlset>"#
        );
        assert_eq!(
            parse_sitemap(xml.as_bytes()).unwrap().into_locations(),
            vec!["https://example.com/c/".to_string()]
        );
    }

    #[test]
    fn empty_loc_dropped() {
        let xml = format!(r#"<urlset xmlns="{SITEMAP_NS}"><url><loc>  </loc></url></urlset>"#);
        assert!(parse_sitemap(xml.as_bytes()).unwrap().locations().is_empty());
    }

    #[test]
    fn reject_empty_document() {
        assert!(parse_sitemap(b"").is_err());
        assert!(parse_sitemap(b"   \n").is_err());
    }

    #[test]
    fn reject_mismatched_tags() {
        assert!(parse_sitemap(b"<urlset><url></urlset>").is_err());
    }

    #[test]
    fn reject_truncated_document() {
        assert!(parse_sitemap(b"<urlset><url><loc>https://example.com/").is_err());
    }

    #[test]
    fn reject_html_page() {
        let html = b"<html><head><title>Not found</title></head><body><p>Oops<br></body></html>";
        assert!(parse_sitemap(html).is_err());
    }

    #[test]
    fn reject_invalid_utf8() {
        let mut xml = format!(r#"<urlset xmlns="{SITEMAP_NS}"><url><loc>https://example.com/"#)
            .into_bytes();
        xml.push(0xff);
        xml.extend_from_slice(b"</loc></url></urlset>");
        assert!(parse_sitemap(&xml).is_err());
    }

    #[test]
    fn latin1_declared_encoding() {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="ISO-8859-1"?><urlset xmlns="{SITEMAP_NS}"><url><loc>https://example.com/caf"#
        )
        .into_bytes();
        xml.push(0xe9);
        xml.extend_from_slice(b"/</loc></url></urlset>");

        assert_eq!(
            parse_sitemap(&xml).unwrap(),
            Sitemap::UrlSet(vec!["https://example.com/caf\u{e9}/".to_string()])
        );
    }

    #[test]
    fn reject_trailing_text() {
        let xml = format!(
            r#"<urlset xmlns="{SITEMAP_NS}"><url><loc>https://example.com/a/</loc></url></urlset>garbage"#
        );
        assert!(parse_sitemap(xml.as_bytes()).is_err());
    }

    #[test]
    fn trailing_whitespace_allowed() {
        let xml = format!(r#"<urlset xmlns="{SITEMAP_NS}"></urlset>

"#);
        assert!(parse_sitemap(xml.as_bytes()).is_ok());
    }
}
