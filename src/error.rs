//! Error types for each stage of a run.
//!
//! Fetch, parse and render errors are recoverable per URL: callers log them and
//! move on to the next page. A merge error fails the run. Cleanup errors are only
//! ever logged.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("browser error: {0}")]
    Browser(String),

    #[error("failed to print {url} to PDF: {message}")]
    Pdf { url: String, message: String },

    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no PDFs to merge")]
    NoInputs,

    #[error("failed to load PDF {}: {message}", .path.display())]
    Load { path: PathBuf, message: String },

    #[error("failed to serialize merged PDF: {0}")]
    Serialize(String),

    #[error("failed to write merged PDF to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
#[error("failed to remove {}: {source}", .path.display())]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
