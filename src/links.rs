use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// The crawl boundary: a URL prefix plus the suffix that marks a document.
///
/// Matching is plain string comparison on the resolved URL. Query strings,
/// fragments and trailing slashes are not normalized, so `a.html#x` is not a
/// document and `a.html?v=1` is a different page from `a.html`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    base_domain: String,
    doc_suffix: String,
}

impl Scope {
    pub fn new(base_domain: impl Into<String>, doc_suffix: impl Into<String>) -> Self {
        Self {
            base_domain: base_domain.into(),
            doc_suffix: doc_suffix.into(),
        }
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    pub fn contains(&self, url: &str) -> bool {
        url.starts_with(&self.base_domain) && url.ends_with(&self.doc_suffix)
    }

    /// Resolves `href` against `base` and keeps it only if it is an in-scope document.
    pub fn resolve(&self, base: &Url, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let resolved = match base.join(href) {
            Ok(url) => url,
            Err(e) => {
                debug!("Skipping href '{}' on {}: {}", href, base, e);
                return None;
            }
        };

        if !matches!(resolved.scheme(), "http" | "https") {
            return None;
        }

        let resolved = String::from(resolved);
        self.contains(&resolved).then_some(resolved)
    }
}

/// Resolves the `href` of each element, keeping in-scope documents in first-seen order.
pub fn collect_links<'a>(
    anchors: impl IntoIterator<Item = ElementRef<'a>>,
    base_url: &Url,
    scope: &Scope,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in anchors {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if let Some(url) = scope.resolve(base_url, href) {
            if seen.insert(url.clone()) {
                links.push(url);
            }
        }
    }

    links
}

/// Every in-scope document linked from `document`, deduplicated.
pub fn extract_links(document: &Html, base_url: &Url, scope: &Scope) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let links = collect_links(document.select(&selector), base_url, scope);
    debug!("Extracted {} document links from {}", links.len(), base_url);
    links
}
