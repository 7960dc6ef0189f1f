use anyhow::{anyhow, Context, Result};
use colored::*;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::config::SiteConfig;
use crate::crawler::crawl;
use crate::fetcher::Fetcher;
use crate::navigation::NavigationExtractor;
use crate::normalizer::Normalizer;
use crate::pdf_merger::{cleanup, merge};
use crate::renderer::Renderer;
use crate::sorter::{apply_reference_order, order};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub urls_found: usize,
    pub pages_rendered: usize,
    pub pages_skipped: usize,
    pub output: PathBuf,
}

/// Crawl, order, normalize, render and merge, one page at a time.
pub struct Pipeline<'a> {
    config: &'a SiteConfig,
    fetcher: &'a dyn Fetcher,
    renderer: &'a dyn Renderer,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a SiteConfig, fetcher: &'a dyn Fetcher, renderer: &'a dyn Renderer) -> Self {
        Self {
            config,
            fetcher,
            renderer,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        info!("Visiting \"{}\"", self.config.seed_url.green());

        let urls = discover_and_order(self.config, self.fetcher).await;
        info!("URLs found: {}", urls.len());
        if urls.is_empty() {
            return Err(anyhow!("No URLs found from {}", self.config.seed_url));
        }

        let temp_dir = &self.config.temp_dir;
        fs::create_dir_all(temp_dir)
            .await
            .with_context(|| format!("Failed to create temp directory {}", temp_dir.display()))?;

        let pdf_paths = self.render_pages(&urls).await;
        info!("Pages rendered: {}/{}", pdf_paths.len(), urls.len());

        if pdf_paths.is_empty() {
            cleanup(&[], temp_dir).await;
            return Err(anyhow!("No content could be produced"));
        }

        let output = self.config.output_path();
        let merged = merge(&pdf_paths, &output).await;
        match &merged {
            Ok(pages) => info!(
                "Merge succeeded: {} pages written to {}",
                pages,
                output.display().to_string().green()
            ),
            Err(e) => warn!("Merge failed: {}", e),
        }

        if self.config.preserve_pages {
            info!("Keeping page PDFs in {}", temp_dir.display().to_string().blue());
        } else {
            info!("Cleaning up individual page files...");
            cleanup(&pdf_paths, temp_dir).await;
        }

        merged.with_context(|| format!("Failed to write {}", output.display()))?;

        Ok(RunSummary {
            urls_found: urls.len(),
            pages_rendered: pdf_paths.len(),
            pages_skipped: urls.len() - pdf_paths.len(),
            output,
        })
    }

    /// Renders every URL to `temp_dir/page_<n>.pdf`, `n` being its 1-based position.
    /// Pages that fail to fetch or render are skipped.
    async fn render_pages(&self, urls: &[String]) -> Vec<PathBuf> {
        let normalizer = Normalizer::new(&self.config.normalizer);
        let mut pdf_paths = Vec::new();

        for (index, url) in urls.iter().enumerate() {
            let position = index + 1;
            info!("Processing ({}/{}): {}", position, urls.len(), url.green());

            let Some(markup) = normalizer.fetch_and_normalize(self.fetcher, url).await else {
                continue;
            };

            let path = self.config.temp_dir.join(format!("page_{}.pdf", position));
            match self.renderer.render(&markup, &path, &self.config.page).await {
                Ok(()) => pdf_paths.push(path),
                Err(e) => warn!("Skipping {}: {}", url, e),
            }
        }

        pdf_paths
    }
}

/// Discovers the site's documents and puts them in final reading order.
pub async fn discover_and_order(config: &SiteConfig, fetcher: &dyn Fetcher) -> Vec<String> {
    let discovered = if config.crawl_only {
        crawl(fetcher, &config.scope(), &config.seed_url).await
    } else {
        NavigationExtractor::new(fetcher, config).extract_ordered().await
    };

    let ordered = if config.keep_discovery_order {
        discovered
    } else {
        order(&discovered, &config.catalog)
    };

    apply_reference_order(ordered, &config.reference_order)
}
