//! WP oEmbed Enum - WordPress username enumeration via oEmbed
//!
//! Walks a site's sitemap index, asks the oEmbed endpoint about every post it
//! lists, and collects the author slugs found in the responses.
//!
//! # Example
//!
//! ```no_run
//! use wp_oembed_enum::{Crawler, Fetcher, OutputFormat, SitemapResolver, save_usernames};
//!
//! #[tokio::main]
//! async fn main() -> wp_oembed_enum::Result<()> {
//!     let fetcher = Fetcher::new("https://example.com")?;
//!     let index_url = fetcher.config().sitemap_index_url();
//!     let posts = SitemapResolver::new(&fetcher).resolve_index(&index_url).await?;
//!     let usernames = Crawler::from_fetcher(fetcher).crawl(posts).await;
//!     save_usernames(&usernames, OutputFormat::Json, ".")?;
//!     Ok(())
//! }
//! ```

pub mod crawl;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod sitemap;

pub use crawl::{CrawlObserver, Crawler, NoopObserver, UsernameSet};
pub use error::{Error, Result};
pub use extract::{UsernameExtractor, oembed_url, username_from_author_url};
pub use fetch::{FetchConfig, Fetcher, FetcherBuilder, Transport};
pub use output::{OutputFormat, print_summary, save_usernames, write_usernames};
pub use sitemap::{Sitemap, SitemapResolver, parse_sitemap};
