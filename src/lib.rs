//! # site2pdf
//!
//! Turns a static documentation website into a single PDF.
//!
//! ## Pipeline
//!
//! - discover pages from the seed's navigation menu, back-filled by a crawl
//! - order them with a declarative section catalog
//! - strip each page down to printable content
//! - print every page with headless Chromium and merge the results
//!
//! ## Usage
//!
//! ```bash
//! site2pdf build https://openapidoc.bitunix.com/doc/common/introduction.html \
//!     --config catalogs/bitunix.json
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod links;
pub mod navigation;
pub mod normalizer;
pub mod pdf_merger;
pub mod pipeline;
pub mod renderer;
pub mod sorter;

pub use config::{SectionCatalog, SiteConfig};
pub use crawler::{crawl, Crawler};
pub use fetcher::{Fetcher, HttpFetcher};
pub use links::{extract_links, Scope};
pub use navigation::NavigationExtractor;
pub use normalizer::{Normalizer, NormalizerConfig};
pub use pdf_merger::PdfMerger;
pub use pipeline::{discover_and_order, Pipeline, RunSummary};
pub use renderer::{ChromiumRenderer, PageOptions, Renderer};
pub use sorter::{apply_reference_order, order};
