#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::{dictionary, Document, Object, Stream};
use site2pdf::error::{FetchError, RenderError};
use site2pdf::{Fetcher, PageOptions, Renderer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const BASE: &str = "https://docs.example.com/doc/";

pub fn url(path: &str) -> String {
    format!("{}{}", BASE, path)
}

pub fn page(body: &str) -> String {
    format!("<!DOCTYPE html><html><head><title>t</title></head><body>{}</body></html>", body)
}

/// In-memory website. Unknown URLs answer 404.
#[derive(Default)]
pub struct StaticSite {
    pages: HashMap<String, String>,
    failures: Mutex<HashMap<String, usize>>,
    log: Mutex<Vec<String>>,
}

impl StaticSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, path: &str, body: &str) -> Self {
        self.pages.insert(url(path), page(body));
        self
    }

    /// Makes the next `times` fetches of `path` fail.
    pub fn failing(self, path: &str, times: usize) -> Self {
        self.failures.lock().unwrap().insert(url(path), times);
        self
    }

    pub fn fetches(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, path: &str) -> usize {
        let target = url(path);
        self.fetches().iter().filter(|u| **u == target).count()
    }
}

#[async_trait]
impl Fetcher for StaticSite {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.log.lock().unwrap().push(url.to_string());

        if let Some(remaining) = self.failures.lock().unwrap().get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::Timeout { url: url.to_string() });
            }
        }

        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Writes a one-page PDF per call and records what it was given.
/// Markup containing `RENDER_FAIL` is rejected.
#[derive(Default)]
pub struct StubRenderer {
    rendered: Mutex<Vec<(PathBuf, String)>>,
    corrupt: bool,
}

impl StubRenderer {
    /// A renderer whose files are not valid PDFs.
    pub fn corrupt() -> Self {
        Self {
            corrupt: true,
            ..Self::default()
        }
    }

    pub fn rendered(&self) -> Vec<(PathBuf, String)> {
        self.rendered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn render(
        &self,
        markup: &str,
        destination: &Path,
        _options: &PageOptions,
    ) -> Result<(), RenderError> {
        if markup.contains("RENDER_FAIL") {
            return Err(RenderError::Pdf {
                url: destination.display().to_string(),
                message: "stub failure".to_string(),
            });
        }

        let bytes = if self.corrupt {
            b"%PDF-1.5 truncated".to_vec()
        } else {
            sample_pdf()
        };
        std::fs::write(destination, bytes).map_err(|source| RenderError::Io {
            path: destination.to_path_buf(),
            source,
        })?;
        self.rendered
            .lock()
            .unwrap()
            .push((destination.to_path_buf(), markup.to_string()));
        Ok(())
    }
}

pub fn sample_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut data = Vec::new();
    doc.save_to(&mut data).unwrap();
    data
}
