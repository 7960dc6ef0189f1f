use serde::Deserialize;
use slug::slugify;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use crate::error::ConfigError;
use crate::links::Scope;
use crate::normalizer::NormalizerConfig;
use crate::renderer::PageOptions;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Declarative reading order for a documentation site.
///
/// Keys of `file_order` are either a section name (`"common"`) or a
/// section/subsection pair (`"market/spot"`).
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SectionCatalog {
    pub sections: Vec<String>,
    pub subsections: HashMap<String, Vec<String>>,
    pub file_order: HashMap<String, Vec<String>>,
}

impl SectionCatalog {
    pub fn subsections_of(&self, section: &str) -> &[String] {
        self.subsections
            .get(section)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn file_order_for(&self, key: &str) -> Option<&[String]> {
        self.file_order.get(key).map(Vec::as_slice)
    }
}

/// Everything a run needs to know about the target site.
///
/// Built once (from a JSON file, CLI flags, or both) and passed by reference
/// to the crawler, the navigation extractor and the sorter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub seed_url: String,
    /// URL prefix bounding the crawl. Defaults to the seed's directory.
    pub base_domain: String,
    pub doc_suffix: String,
    pub user_agent: String,
    pub timeout_secs: f64,
    pub min_nav_links: usize,
    /// URLs that must open the document, in this order, when discovered.
    pub reference_order: Vec<String>,
    pub catalog: SectionCatalog,
    pub normalizer: NormalizerConfig,
    pub page: PageOptions,
    pub output: Option<PathBuf>,
    pub temp_dir: PathBuf,
    pub preserve_pages: bool,
    pub crawl_only: bool,
    pub keep_discovery_order: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            seed_url: String::new(),
            base_domain: String::new(),
            doc_suffix: ".html".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10.0,
            min_nav_links: 5,
            reference_order: Vec::new(),
            catalog: SectionCatalog::default(),
            normalizer: NormalizerConfig::default(),
            page: PageOptions::default(),
            output: None,
            temp_dir: PathBuf::from("temp_pdfs"),
            preserve_pages: false,
            crawl_only: false,
            keep_discovery_order: false,
        }
    }
}

impl SiteConfig {
    pub fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            ..Default::default()
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        debug!(
            "Catalog has {} sections and {} file-order lists",
            config.catalog.sections.len(),
            config.catalog.file_order.len()
        );
        Ok(config)
    }

    /// Checks the seed and fills in the base domain when it was left empty.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let seed = Url::parse(&self.seed_url)
            .map_err(|e| ConfigError::Invalid(format!("seed URL '{}': {}", self.seed_url, e)))?;

        if !matches!(seed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "seed URL '{}' is not http(s)",
                self.seed_url
            )));
        }

        if self.base_domain.is_empty() {
            self.base_domain = match seed.as_str().rsplit_once('/') {
                Some((dir, _)) => format!("{}/", dir),
                None => seed.to_string(),
            };
        }

        if !seed.as_str().starts_with(&self.base_domain) {
            return Err(ConfigError::Invalid(format!(
                "seed URL '{}' is outside base domain '{}'",
                seed, self.base_domain
            )));
        }

        if self.doc_suffix.is_empty() {
            return Err(ConfigError::Invalid("document suffix must not be empty".to_string()));
        }

        if !self.timeout_secs.is_finite() || self.timeout_secs <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "timeout must be a positive number of seconds, got {}",
                self.timeout_secs
            )));
        }

        Ok(self)
    }

    pub fn scope(&self) -> Scope {
        Scope::new(&self.base_domain, &self.doc_suffix)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    /// The configured output path, or `<host>-documentation.pdf`.
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }

        let host = Url::parse(&self.seed_url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.replace('.', "-")))
            .unwrap_or_else(|| "site".to_string());
        PathBuf::from(format!("{}-documentation.pdf", slugify(host)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_validate_derives_base_domain_from_seed() {
        let config = SiteConfig::new("https://openapidoc.example.com/doc/common/introduction.html")
            .validate()
            .unwrap();
        assert_eq!(config.base_domain, "https://openapidoc.example.com/doc/common/");
    }

    #[test]
    fn test_validate_rejects_seed_outside_base() {
        let config = SiteConfig {
            base_domain: "https://x.com/doc/".to_string(),
            ..SiteConfig::new("https://x.com/blog/a.html")
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_non_http_seed() {
        let result = SiteConfig::new("ftp://x.com/doc/a.html").validate();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[rstest]
    #[case(0.0)]
    #[case(-1.5)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn test_validate_rejects_unusable_timeouts(#[case] timeout_secs: f64) {
        let config = SiteConfig {
            timeout_secs,
            ..SiteConfig::new("https://x.com/doc/a.html")
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_output_path_defaults_to_host_slug() {
        let config = SiteConfig::new("https://docs.example.com/doc/a.html");
        assert_eq!(config.output_path(), PathBuf::from("docs-example-com-documentation.pdf"));
    }

    #[test]
    fn test_load_reads_catalog_and_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "seed_url": "https://x.com/doc/common/introduction.html",
                "base_domain": "https://x.com/doc/",
                "catalog": {{
                    "sections": ["common", "market"],
                    "subsections": {{ "market": ["spot"] }},
                    "file_order": {{ "common": ["introduction.html"] }}
                }}
            }}"#
        )
        .unwrap();

        let config = SiteConfig::load(file.path()).unwrap();
        assert_eq!(config.catalog.sections, vec!["common", "market"]);
        assert_eq!(config.catalog.subsections_of("market"), ["spot".to_string()]);
        assert!(config.catalog.subsections_of("common").is_empty());
        assert_eq!(
            config.catalog.file_order_for("common"),
            Some(&["introduction.html".to_string()][..])
        );
        assert_eq!(config.doc_suffix, ".html");
        assert_eq!(config.min_nav_links, 5);
        assert_eq!(config.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(SiteConfig::load(file.path()), Err(ConfigError::Parse { .. })));
    }
}
