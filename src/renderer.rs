use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, BrowserConfig};
use colored::*;
use futures_util::StreamExt;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::RenderError;

const MM_PER_INCH: f64 = 25.4;

/// Page geometry and decorations for one printed page. Lengths are in inches.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PageOptions {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub scale: f64,
    pub print_background: bool,
    pub header_text: Option<String>,
    pub footer_text: Option<String>,
    /// Lets the page load `file://` assets while printing.
    pub allow_local_files: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            paper_width: 210.0 / MM_PER_INCH,
            paper_height: 297.0 / MM_PER_INCH,
            margin_top: 15.0 / MM_PER_INCH,
            margin_right: 10.0 / MM_PER_INCH,
            margin_bottom: 15.0 / MM_PER_INCH,
            margin_left: 10.0 / MM_PER_INCH,
            scale: 1.0,
            print_background: true,
            header_text: None,
            footer_text: None,
            allow_local_files: true,
        }
    }
}

impl PageOptions {
    pub fn print_params(&self) -> PrintToPdfParams {
        let decorated = self.header_text.is_some() || self.footer_text.is_some();

        PrintToPdfParams {
            scale: Some(self.scale),
            paper_width: Some(self.paper_width),
            paper_height: Some(self.paper_height),
            margin_top: Some(self.margin_top),
            margin_right: Some(self.margin_right),
            margin_bottom: Some(self.margin_bottom),
            margin_left: Some(self.margin_left),
            print_background: Some(self.print_background),
            display_header_footer: Some(decorated),
            header_template: decorated.then(|| header_template(self.header_text.as_deref())),
            footer_template: decorated.then(|| footer_template(self.footer_text.as_deref())),
            ..Default::default()
        }
    }
}

fn header_template(text: Option<&str>) -> String {
    match text {
        Some(text) => format!(
            r#"<div style="font-size: 8px; width: 100%; text-align: center; color: #666;">{}</div>"#,
            text
        ),
        None => "<span></span>".to_string(),
    }
}

fn footer_template(text: Option<&str>) -> String {
    format!(
        r#"<div style="font-size: 8px; width: 100%; text-align: center; color: #666;">{}<span class="pageNumber"></span> / <span class="totalPages"></span></div>"#,
        text.map(|t| format!("{} &middot; ", t)).unwrap_or_default()
    )
}

/// Prints normalized markup to a PDF file.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        markup: &str,
        destination: &Path,
        options: &PageOptions,
    ) -> Result<(), RenderError>;
}

/// Headless Chromium shared by every page of a run.
pub struct ChromiumRenderer {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumRenderer {
    pub async fn launch(options: &PageOptions) -> Result<Self, RenderError> {
        let mut builder = BrowserConfig::builder().window_size(1920, 1080);
        if options.allow_local_files {
            builder = builder.arg("--allow-file-access-from-files");
        }

        let config = builder
            .build()
            .map_err(|e| RenderError::Browser(format!("failed to create browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Browser(format!("failed to launch browser: {}", e)))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if let Err(err) = h {
                    // Only log if it's not a common websocket deserialization error
                    let err_str = err.to_string();
                    if !err_str.contains("data did not match any variant")
                        && !err_str.contains("untagged enum Message")
                    {
                        error!("Browser handler error: {}", err);
                    } else {
                        debug!("Chrome protocol message ignored: {}", err);
                    }
                }
            }
        });

        info!("Chromium launched for rendering");
        Ok(Self { browser, handler })
    }

    pub async fn close(mut self) {
        self.browser.close().await.ok();
        self.handler.abort();
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn render(
        &self,
        markup: &str,
        destination: &Path,
        options: &PageOptions,
    ) -> Result<(), RenderError> {
        let target = destination.display().to_string();
        info!("Rendering into \"{}\"", target.blue());

        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Browser(format!("failed to create new page: {}", e)))?;

        page.set_content(markup).await.map_err(|e| RenderError::Pdf {
            url: target.clone(),
            message: format!("failed to set content: {}", e),
        })?;

        // Give images and stylesheets a moment to load
        tokio::time::sleep(Duration::from_millis(500)).await;

        let pdf_data = page.pdf(options.print_params()).await.map_err(|e| RenderError::Pdf {
            url: target.clone(),
            message: e.to_string(),
        })?;
        page.close().await.ok();

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await.map_err(|source| RenderError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(destination, pdf_data)
            .await
            .map_err(|source| RenderError::Io {
                path: destination.to_path_buf(),
                source,
            })
    }
}
