//! Rasterizer types

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// File name prefix shared by every backend (`page-<n>.png`)
pub const PAGE_PREFIX: &str = "page";

/// A rasterized page owned by one processing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Page number (1-indexed, contiguous)
    pub page_number: u32,
    pub path: PathBuf,
}

/// File name a backend must use for page `page_number`
pub fn page_file_name(page_number: u32) -> String {
    format!("{}-{}.png", PAGE_PREFIX, page_number)
}

/// Parse the page index out of a backend output file name
///
/// Accepts zero-padded indices (`page-007.png`), which pdftoppm emits for
/// documents with many pages.
pub fn parse_page_index(file_name: &str) -> Option<u32> {
    let digits = file_name
        .strip_prefix(PAGE_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(".png")?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Failure of a single backend attempt
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("backend not available: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("no page images produced")]
    NoPages,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<mupdf::Error> for RasterError {
    fn from(err: mupdf::Error) -> Self {
        RasterError::Failed(format!("MuPDF error: {}", err))
    }
}

/// Recorded failure of one backend
#[derive(Debug, Clone, Serialize)]
pub struct BackendFailure {
    pub backend: String,
    pub message: String,
}

/// Every configured backend failed
#[derive(Debug, thiserror::Error)]
#[error("Failed to convert PDF to images ({})", summarize(.failures))]
pub struct RasterizationError {
    pub failures: Vec<BackendFailure>,
}

impl RasterizationError {
    /// Backend name to error message, for error bodies
    pub fn details(&self) -> serde_json::Value {
        let map = self
            .failures
            .iter()
            .map(|f| (f.backend.clone(), serde_json::Value::String(f.message.clone())))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

fn summarize(failures: &[BackendFailure]) -> String {
    if failures.is_empty() {
        return "no rasterizer backends configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.backend, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}
