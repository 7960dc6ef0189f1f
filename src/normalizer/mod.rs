//! Print-oriented cleanup of a single documentation page.
//!
//! The page is parsed once, edited in place and serialized back with
//! html5ever. Edits are planned in a single walk over the tree, applying in
//! order of precedence:
//!
//! - noise elements (`strip_tags`) are dropped with their subtree
//! - table regions become a labelled plain-text block
//! - code regions become a `<pre>` block holding their text
//! - `img[src]` and `link[href]` are made absolute against the page URL
//! - a print stylesheet is appended to `<head>`
//!
//! Table regions are checked before code regions on every element, so code
//! samples inside a table are left to the table rendering. Blocks produced here
//! carry a `data-normalized` attribute and are left alone on later passes,
//! which makes normalization idempotent.

mod matchers;

pub use matchers::{default_code_matchers, default_table_matchers, matches_any, ElementMatcher};

use ego_tree::NodeId;
use html5ever::{Attribute, LocalName, Namespace, QualName};
use scraper::node::{Element, Text};
use scraper::{ElementRef, Html, Node, StrTendril};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::ParseError;
use crate::fetcher::Fetcher;

pub const PRINT_STYLESHEET: &str = "\
table { border-collapse: collapse; width: 100%; margin: 1em 0; }\
th, td { border: 1px solid #999; padding: 4px 6px; text-align: left; }\
pre, code { font-family: 'Courier New', Courier, monospace; font-size: 9pt; }\
pre { white-space: pre-wrap; word-wrap: break-word; background: #f5f5f5; border: 1px solid #ddd; padding: 8px; }\
h1, h2, h3, h4, h5, h6 { margin-top: 1.2em; margin-bottom: 0.5em; page-break-after: avoid; }\
img { max-width: 100%; }";

const NORMALIZED_ATTR: &str = "data-normalized";


const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NormalizerConfig {
    pub strip_tags: Vec<String>,
    pub code_matchers: Vec<ElementMatcher>,
    pub table_matchers: Vec<ElementMatcher>,
    /// Code regions with less text than this are left untouched.
    pub min_code_len: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            strip_tags: ["header", "footer", "nav", "script", "style"]
                .iter()
                .map(|tag| tag.to_string())
                .collect(),
            code_matchers: default_code_matchers(),
            table_matchers: default_table_matchers(),
            min_code_len: 10,
        }
    }
}

pub struct Normalizer<'a> {
    config: &'a NormalizerConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a NormalizerConfig) -> Self {
        Self { config }
    }

    /// Fetches `url` and normalizes it. Failures are logged and yield `None`.
    pub async fn fetch_and_normalize(&self, fetcher: &dyn Fetcher, url: &str) -> Option<String> {
        let page_url = match Url::parse(url) {
            Ok(page_url) => page_url,
            Err(source) => {
                let err = ParseError::InvalidUrl {
                    url: url.to_string(),
                    source,
                };
                warn!("Skipping page: {}", err);
                return None;
            }
        };

        match fetcher.fetch(url).await {
            Ok(markup) => Some(self.normalize(&markup, &page_url)),
            Err(e) => {
                warn!("Skipping page: {}", e);
                None
            }
        }
    }

    pub fn normalize(&self, markup: &str, page_url: &Url) -> String {
        let mut document = Html::parse_document(markup);

        let mut planner = Planner {
            config: self.config,
            page_url,
            edits: Vec::new(),
            head: None,
        };
        for child in document.tree.root().children().filter_map(ElementRef::wrap) {
            planner.visit(child);
        }
        let Planner { edits, head, .. } = planner;

        debug!("Applying {} edits to {}", edits.len(), page_url);
        for edit in edits {
            edit.apply(&mut document);
        }

        let parent = head.unwrap_or_else(|| {
            debug!("No <head> in {}, appending stylesheet to the document", page_url);
            document.tree.root().id()
        });
        if let Some(mut parent) = document.tree.get_mut(parent) {
            let mut style = parent.append(html_element("style", &[]));
            style.append(text_node(PRINT_STYLESHEET));
        }

        document.html()
    }
}

enum Edit {
    Remove(NodeId),
    Replace { id: NodeId, block: Block },
    Resolve { id: NodeId, attr: &'static str, value: String },
}

enum Block {
    Code(String),
    Tables {
        label: Option<String>,
        /// Rendered tables, each with the label found right before it.
        tables: Vec<(Option<String>, String)>,
    },
}

impl Edit {
    fn apply(self, document: &mut Html) {
        match self {
            Edit::Remove(id) => {
                if let Some(mut node) = document.tree.get_mut(id) {
                    node.detach();
                }
            }
            Edit::Replace { id, block } => {
                if let Some(mut node) = document.tree.get_mut(id) {
                    block.insert_before(&mut node);
                    node.detach();
                }
            }
            Edit::Resolve { id, attr, value } => {
                if let Some(mut node) = document.tree.get_mut(id) {
                    if let Node::Element(element) = node.value() {
                        set_attr(element, attr, &value);
                    }
                }
            }
        }
    }
}

impl Block {
    fn insert_before(self, node: &mut ego_tree::NodeMut<'_, Node>) {
        match self {
            Block::Code(text) => {
                let mut pre = node.insert_before(html_element("pre", &[(NORMALIZED_ATTR, "code")]));
                pre.append(text_node(&text));
            }
            Block::Tables { label, tables } => {
                let mut container =
                    node.insert_before(html_element("div", &[(NORMALIZED_ATTR, "table")]));
                if let Some(label) = label {
                    append_label(&mut container, &label);
                }
                for (label, text) in tables {
                    if let Some(label) = label {
                        append_label(&mut container, &label);
                    }
                    let mut pre = container.append(html_element("pre", &[]));
                    pre.append(text_node(&text));
                }
            }
        }
    }
}

struct Planner<'a> {
    config: &'a NormalizerConfig,
    page_url: &'a Url,
    edits: Vec<Edit>,
    head: Option<NodeId>,
}

impl Planner<'_> {
    fn visit(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();

        if self.config.strip_tags.iter().any(|tag| tag.eq_ignore_ascii_case(name)) {
            self.edits.push(Edit::Remove(element.id()));
            return;
        }

        if element.value().attr(NORMALIZED_ATTR).is_some() {
            return;
        }

        if let Some(block) = self.table_block(element) {
            self.edits.push(Edit::Replace {
                id: element.id(),
                block,
            });
            return;
        }

        if matches_any(&self.config.code_matchers, element.value()) {
            let text = code_text(element);
            if text.trim().chars().count() >= self.config.min_code_len {
                self.edits.push(Edit::Replace {
                    id: element.id(),
                    block: Block::Code(text),
                });
                return;
            }
        }

        if self.is_label(element)
            && next_element(element).is_some_and(|next| self.table_block(next).is_some())
        {
            self.edits.push(Edit::Remove(element.id()));
            return;
        }

        if let Some(attr) = asset_attribute(name) {
            if let Some(value) = element.value().attr(attr) {
                self.edits.push(Edit::Resolve {
                    id: element.id(),
                    attr,
                    value: self.absolute(value),
                });
            }
        }

        if name == "head" && self.head.is_none() {
            self.head = Some(element.id());
        }

        for child in element.child_elements() {
            self.visit(child);
        }
    }

    /// The block replacing `element`, when it is a table region with at least
    /// one non-empty table.
    fn table_block(&self, element: ElementRef<'_>) -> Option<Block> {
        if !self.is_table_region(element) {
            return None;
        }

        let nested: Vec<ElementRef<'_>> = if element.value().name() == "table" {
            vec![element]
        } else {
            element
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().name() == "table" && owning_table(*e, element).is_none())
                .collect()
        };

        let tables: Vec<(Option<String>, String)> = nested
            .into_iter()
            .filter_map(|table| {
                let text = render_table(table)?;
                let label = if table != element {
                    self.label_before(table)
                } else {
                    None
                };
                Some((label, text))
            })
            .collect();

        if tables.is_empty() {
            return None;
        }

        Some(Block::Tables {
            label: self.label_before(element),
            tables,
        })
    }

    fn is_table_region(&self, element: ElementRef<'_>) -> bool {
        if element.value().attr(NORMALIZED_ATTR).is_some() {
            return false;
        }
        if element.value().name() == "table" {
            return true;
        }

        matches_any(&self.config.table_matchers, element.value())
            && element
                .descendants()
                .filter_map(ElementRef::wrap)
                .any(|e| e.value().name() == "table")
    }

    fn is_label(&self, element: ElementRef<'_>) -> bool {
        let value = element.value();
        HEADINGS.contains(&value.name()) || value.classes().any(|class| class.contains("title"))
    }

    fn label_before(&self, element: ElementRef<'_>) -> Option<String> {
        let previous = element.prev_siblings().find_map(ElementRef::wrap)?;
        if !self.is_label(previous) {
            return None;
        }
        let text = collapse_whitespace(&previous.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    }

    fn absolute(&self, value: &str) -> String {
        match self.page_url.join(value) {
            Ok(url) => url.into(),
            Err(e) => {
                debug!("Keeping unresolvable asset reference '{}': {}", value, e);
                value.to_string()
            }
        }
    }
}

/// Plain-text rendering: header row, divider, then data rows. Rows without
/// cells are ignored and a table with no cells at all renders to `None`.
pub fn render_table(table: ElementRef<'_>) -> Option<String> {
    let rows: Vec<String> = table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "tr" && owning_table(*e, table) == Some(table))
        .filter_map(|row| {
            let cells: Vec<String> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|cell| matches!(cell.value().name(), "th" | "td"))
                .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
                .collect();
            (!cells.is_empty()).then(|| cells.join(" | "))
        })
        .collect();

    let (header, data) = rows.split_first()?;

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(header.clone());
    lines.push("-".repeat(header.chars().count().max(3)));
    lines.extend(data.iter().cloned());
    Some(lines.join("\n"))
}

/// Nearest `table` ancestor of `element`, not looking above `stop`.
fn owning_table<'a>(element: ElementRef<'a>, stop: ElementRef<'a>) -> Option<ElementRef<'a>> {
    for ancestor in element.ancestors().filter_map(ElementRef::wrap) {
        if ancestor.value().name() == "table" {
            return Some(ancestor);
        }
        if ancestor == stop {
            return None;
        }
    }
    None
}

fn next_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

// a leading newline inside <pre> is dropped by the parser
fn code_text(element: ElementRef<'_>) -> String {
    let text: String = element.text().collect();
    text.trim_start_matches(&['\n', '\r'][..]).trim_end().to_string()
}

fn asset_attribute(tag: &str) -> Option<&'static str> {
    match tag {
        "img" => Some("src"),
        "link" => Some("href"),
        _ => None,
    }
}

fn set_attr(element: &mut Element, attr: &str, value: &str) {
    if let Some((_, current)) = element.attrs.iter_mut().find(|(name, _)| &*name.local == attr) {
        *current = StrTendril::from(value);
    }
}

fn html_element(name: &str, attrs: &[(&str, &str)]) -> Node {
    let attrs = attrs
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(*name)),
            value: (*value).into(),
        })
        .collect();
    let name = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(name));
    Node::Element(Element::new(name, attrs))
}

fn text_node(text: &str) -> Node {
    Node::Text(Text {
        text: StrTendril::from(text),
    })
}

fn append_label(container: &mut ego_tree::NodeMut<'_, Node>, label: &str) {
    let mut paragraph = container.append(html_element("p", &[]));
    let mut strong = paragraph.append(html_element("strong", &[]));
    strong.append(text_node(label));
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
