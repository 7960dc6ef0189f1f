use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::SiteConfig;
use crate::crawler::crawl;
use crate::fetcher::Fetcher;
use crate::links::{collect_links, Scope};

/// Regions that usually hold the site menu, most specific first.
/// When none matches, the whole page is used.
pub const MENU_REGIONS: &[&str] = &[
    "nav, [role=\"navigation\"]",
    ".menu, #menu",
    "aside, .sidebar, #sidebar",
];

/// How links are read out of the menu region, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOrder {
    /// Anchors inside list items, which keeps nested menus in visual order.
    ListItems,
    /// Every anchor in document order.
    Anchors,
}

impl LinkOrder {
    pub const RANKED: [LinkOrder; 2] = [LinkOrder::ListItems, LinkOrder::Anchors];

    fn selector(self) -> &'static str {
        match self {
            LinkOrder::ListItems => "li a[href]",
            LinkOrder::Anchors => "a[href]",
        }
    }

    /// The in-scope links this strategy finds, or `None` if it finds nothing.
    pub fn extract(self, region: ElementRef<'_>, base: &Url, scope: &Scope) -> Option<Vec<String>> {
        let selector = Selector::parse(self.selector()).ok()?;
        let links = collect_links(region.select(&selector), base, scope);
        (!links.is_empty()).then_some(links)
    }
}

/// The first matching menu region, or the document root.
pub fn locate_menu(document: &Html) -> ElementRef<'_> {
    for region in MENU_REGIONS {
        if let Ok(selector) = Selector::parse(region) {
            if let Some(element) = document.select(&selector).next() {
                debug!("Menu region found with selector: {}", region);
                return element;
            }
        }
    }

    debug!("No menu region found, using the whole page");
    document.root_element()
}

/// Links of the menu region in reading order.
pub fn menu_order(document: &Html, base: &Url, scope: &Scope) -> Vec<String> {
    let region = locate_menu(document);

    LinkOrder::RANKED
        .iter()
        .find_map(|strategy| {
            let links = strategy.extract(region, base, scope)?;
            debug!("{:?} strategy yielded {} links", strategy, links.len());
            Some(links)
        })
        .unwrap_or_default()
}

/// Recovers the site's intended reading order from the seed page's menu.
pub struct NavigationExtractor<'a> {
    fetcher: &'a dyn Fetcher,
    config: &'a SiteConfig,
}

impl<'a> NavigationExtractor<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, config: &'a SiteConfig) -> Self {
        Self { fetcher, config }
    }

    /// Menu links of the seed page. When the menu yields fewer than
    /// `min_nav_links` entries, crawl results not already present are appended.
    /// If the seed cannot be fetched, the crawl result is returned as is.
    pub async fn extract_ordered(&self) -> Vec<String> {
        let scope = self.config.scope();
        let seed = self.config.seed_url.as_str();

        let ordered = match self.read_menu(seed, &scope).await {
            Some(ordered) => ordered,
            None => {
                info!("Falling back to crawling from {}", seed);
                return crawl(self.fetcher, &scope, seed).await;
            }
        };

        info!("Navigation menu yielded {} links", ordered.len());
        if ordered.len() >= self.config.min_nav_links {
            return ordered;
        }

        info!(
            "Fewer than {} menu links, back-filling from crawl",
            self.config.min_nav_links
        );
        let crawled = crawl(self.fetcher, &scope, seed).await;
        merge_preserving_order(ordered, crawled)
    }

    async fn read_menu(&self, seed: &str, scope: &Scope) -> Option<Vec<String>> {
        let base = match Url::parse(seed) {
            Ok(base) => base,
            Err(e) => {
                warn!("Invalid seed URL {}: {}", seed, e);
                return None;
            }
        };

        let markup = match self.fetcher.fetch(seed).await {
            Ok(markup) => markup,
            Err(e) => {
                warn!("Failed to fetch seed page {}: {}", seed, e);
                return None;
            }
        };

        let document = Html::parse_document(&markup);
        Some(menu_order(&document, &base, scope))
    }
}

/// `prefix` followed by every entry of `rest` not already in it.
fn merge_preserving_order(prefix: Vec<String>, rest: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = prefix.iter().cloned().collect();
    let mut merged = prefix;
    for url in rest {
        if seen.insert(url.clone()) {
            merged.push(url);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new("https://x.com/doc/", ".html")
    }

    fn base() -> Url {
        Url::parse("https://x.com/doc/index.html").unwrap()
    }

    #[test]
    fn test_menu_order_prefers_nav_over_other_regions() {
        let html = r#"
            <aside><a href="aside.html">aside</a></aside>
            <nav><ul><li><a href="b.html">b</a></li><li><a href="a.html">a</a></li></ul></nav>
            <div class="menu"><a href="menu.html">menu</a></div>
        "#;
        let links = menu_order(&Html::parse_document(html), &base(), &scope());
        assert_eq!(links, vec!["https://x.com/doc/b.html", "https://x.com/doc/a.html"]);
    }

    #[test]
    fn test_menu_order_falls_back_to_menu_then_sidebar() {
        let menu = r#"<aside><a href="s.html">s</a></aside><div class="menu"><a href="m.html">m</a></div>"#;
        assert_eq!(
            menu_order(&Html::parse_document(menu), &base(), &scope()),
            vec!["https://x.com/doc/m.html"]
        );

        let sidebar = r#"<p><a href="p.html">p</a></p><aside><a href="s.html">s</a></aside>"#;
        assert_eq!(
            menu_order(&Html::parse_document(sidebar), &base(), &scope()),
            vec!["https://x.com/doc/s.html"]
        );
    }

    #[test]
    fn test_menu_order_uses_whole_page_without_landmarks() {
        let html = r#"<p><a href="z.html">z</a> <a href="y.html">y</a></p>"#;
        let links = menu_order(&Html::parse_document(html), &base(), &scope());
        assert_eq!(links, vec!["https://x.com/doc/z.html", "https://x.com/doc/y.html"]);
    }

    #[test]
    fn test_list_items_win_over_loose_anchors() {
        let html = r#"
            <nav>
                <a href="loose.html">loose</a>
                <ul>
                    <li><a href="one.html">one</a>
                        <ul><li><a href="one-a.html">one a</a></li></ul>
                    </li>
                    <li><a href="two.html">two</a></li>
                </ul>
            </nav>
        "#;
        let links = menu_order(&Html::parse_document(html), &base(), &scope());
        assert_eq!(
            links,
            vec![
                "https://x.com/doc/one.html",
                "https://x.com/doc/one-a.html",
                "https://x.com/doc/two.html"
            ]
        );
    }

    #[test]
    fn test_anchor_strategy_when_no_list_structure() {
        let html = r#"<nav><a href="b.html">b</a><a href="a.html">a</a><a href="b.html">again</a></nav>"#;
        let document = Html::parse_document(html);
        let region = locate_menu(&document);

        assert_eq!(LinkOrder::ListItems.extract(region, &base(), &scope()), None);
        assert_eq!(
            LinkOrder::Anchors.extract(region, &base(), &scope()),
            Some(vec![
                "https://x.com/doc/b.html".to_string(),
                "https://x.com/doc/a.html".to_string()
            ])
        );
    }

    #[test]
    fn test_merge_preserving_order() {
        let merged = merge_preserving_order(
            vec!["b".to_string(), "a".to_string()],
            vec!["a".to_string(), "c".to_string(), "b".to_string(), "d".to_string()],
        );
        assert_eq!(merged, vec!["b", "a", "c", "d"]);
    }
}
