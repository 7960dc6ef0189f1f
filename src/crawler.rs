use colored::*;
use scraper::Html;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};
use url::Url;

use crate::fetcher::Fetcher;
use crate::links::{extract_links, Scope};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_crawled: usize,
    pub pages_failed: usize,
    /// In-scope links found on crawled pages, repeats included.
    pub links_discovered: usize,
}

/// Breadth-first crawl bounded by a [`Scope`].
///
/// Each page is fetched at most once. Fetch failures are logged and the crawl
/// continues with the rest of the queue.
pub struct Crawler<'a> {
    fetcher: &'a dyn Fetcher,
    scope: Scope,
    to_visit: VecDeque<String>,
    visited: HashSet<String>,
    seen: HashSet<String>,
    discovered: Vec<String>,
    stats: CrawlStats,
}

impl<'a> Crawler<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, scope: Scope) -> Self {
        Self {
            fetcher,
            scope,
            to_visit: VecDeque::new(),
            visited: HashSet::new(),
            seen: HashSet::new(),
            discovered: Vec::new(),
            stats: CrawlStats::default(),
        }
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Crawls from `seed` and returns every document URL linked from a visited page,
    /// in order of first discovery. The seed itself is only included if some page links to it.
    pub async fn crawl(&mut self, seed: &str) -> Vec<String> {
        self.to_visit.push_back(seed.to_string());

        while let Some(current) = self.to_visit.pop_front() {
            if self.visited.contains(&current) {
                debug!("Skipping already visited URL: {}", current);
                continue;
            }

            info!("Crawling \"{}\"", current.green());
            self.visit(&current).await;
            self.visited.insert(current);
        }

        info!(
            "Crawl finished: {} pages crawled, {} failed, {} links seen, {} unique URLs",
            self.stats.pages_crawled,
            self.stats.pages_failed,
            self.stats.links_discovered,
            self.discovered.len()
        );

        std::mem::take(&mut self.discovered)
    }

    async fn visit(&mut self, url: &str) {
        let base = match Url::parse(url) {
            Ok(base) => base,
            Err(e) => {
                warn!("Skipping unparsable URL {}: {}", url, e);
                self.stats.pages_failed += 1;
                return;
            }
        };

        let markup = match self.fetcher.fetch(url).await {
            Ok(markup) => markup,
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                self.stats.pages_failed += 1;
                return;
            }
        };

        let links = extract_links(&Html::parse_document(&markup), &base, &self.scope);
        self.stats.pages_crawled += 1;
        self.stats.links_discovered += links.len();

        for link in links {
            if self.seen.insert(link.clone()) {
                self.discovered.push(link.clone());
                self.to_visit.push_back(link);
            }
        }
    }
}

/// Convenience wrapper for a one-off crawl.
pub async fn crawl(fetcher: &dyn Fetcher, scope: &Scope, seed: &str) -> Vec<String> {
    Crawler::new(fetcher, scope.clone()).crawl(seed).await
}
