//! Concurrent username crawl
//!
//! Runs the oEmbed lookup for every post URL with a bounded number of tasks
//! in flight and folds the results into a deduplicated, sorted set.

use crate::error::{Error, Result};
use crate::extract::UsernameExtractor;
use crate::fetch::{Fetcher, Transport};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

/// Deduplicated usernames, kept in lexicographic order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UsernameSet(BTreeSet<String>);

impl UsernameSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a username; returns `true` if it was not already present
    pub fn insert(&mut self, username: impl Into<String>) -> bool {
        self.0.insert(username.into())
    }

    /// Whether the username has been found
    pub fn contains(&self, username: &str) -> bool {
        self.0.contains(username)
    }

    /// Number of unique usernames
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no usernames were found
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in sorted order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Consume the set into a sorted vector
    pub fn into_sorted_vec(self) -> Vec<String> {
        self.0.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for UsernameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl IntoIterator for UsernameSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Live feedback from a running crawl
///
/// Both hooks are called from the task driving the crawl, never concurrently.
pub trait CrawlObserver: Send + Sync {
    /// A username was seen for the first time
    fn on_new_username(&self, _username: &str) {}

    /// Another post finished, successfully or not
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl CrawlObserver for NoopObserver {}

/// Runs username extraction across many posts
#[derive(Debug)]
pub struct Crawler<T> {
    transport: Arc<T>,
    base_url: Arc<str>,
    concurrency: usize,
}

impl Crawler<Fetcher> {
    /// Crawl with a fetcher, taking base URL and concurrency from its config
    pub fn from_fetcher(fetcher: Fetcher) -> Self {
        let base_url = Arc::from(fetcher.config().base_url.as_str());
        let concurrency = fetcher.config().concurrency;
        Self {
            transport: Arc::new(fetcher),
            base_url,
            concurrency,
        }
    }
}

impl<T: Transport + 'static> Crawler<T> {
    /// Create a crawler for the site at `base_url` (no trailing slash)
    pub fn new(transport: Arc<T>, base_url: &str, concurrency: usize) -> Result<Self> {
        if concurrency == 0 {
            return Err(Error::InvalidConcurrency(concurrency));
        }
        Ok(Self {
            transport,
            base_url: Arc::from(base_url),
            concurrency,
        })
    }

    /// Look up the author of every post and return the unique usernames
    pub async fn crawl(&self, post_urls: Vec<String>) -> UsernameSet {
        self.crawl_with_observer(post_urls, &NoopObserver).await
    }

    /// Like [`Crawler::crawl`], reporting new usernames and progress as they happen
    ///
    /// Runs until every post has been tried; there is no early exit.
    pub async fn crawl_with_observer(
        &self,
        post_urls: Vec<String>,
        observer: &dyn CrawlObserver,
    ) -> UsernameSet {
        let dispatched = post_urls.len();
        let mut seen = HashSet::with_capacity(dispatched);
        let post_urls: Vec<String> = post_urls
            .into_iter()
            .filter(|url| seen.insert(url.clone()))
            .collect();
        if post_urls.len() < dispatched {
            debug!(
                skipped = dispatched - post_urls.len(),
                "Skipping duplicate post URLs"
            );
        }

        info!(
            "Starting username enumeration using {} threads...",
            self.concurrency
        );

        let mut collector = Collector {
            usernames: UsernameSet::new(),
            completed: 0,
            total: post_urls.len(),
            observer,
        };
        let mut tasks = JoinSet::new();

        for url in post_urls {
            // Keep at most `concurrency` tasks alive
            while tasks.len() >= self.concurrency {
                if let Some(joined) = tasks.join_next().await {
                    collector.record(joined);
                }
            }

            let transport = Arc::clone(&self.transport);
            let base_url = Arc::clone(&self.base_url);
            tasks.spawn(async move {
                UsernameExtractor::new(&*transport, &base_url)
                    .extract(&url)
                    .await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            collector.record(joined);
        }

        info!(
            "Found {} unique usernames across {} posts",
            collector.usernames.len(),
            collector.total
        );
        collector.usernames
    }
}

/// Single owner of the username set while tasks are running
struct Collector<'a> {
    usernames: UsernameSet,
    completed: usize,
    total: usize,
    observer: &'a dyn CrawlObserver,
}

impl Collector<'_> {
    fn record(&mut self, joined: std::result::Result<Option<String>, JoinError>) {
        self.completed += 1;

        match joined {
            Ok(Some(username)) => {
                if !self.usernames.contains(&username) {
                    debug!(username = %username, "New username found");
                    self.observer.on_new_username(&username);
                    self.usernames.insert(username);
                }
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "Extraction task failed"),
        }

        self.observer.on_progress(self.completed, self.total);
    }
}
