//! OCR Types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Unit of work submitted to the worker pool: one rasterized page
#[derive(Debug, Clone)]
pub struct OcrJob {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Rasterized page image
    pub image: PathBuf,
}

/// OCR outcome for one page
///
/// Failed pages keep their slot with empty text so page positions stay
/// contiguous downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    pub page_number: u32,
    pub text: String,
    pub succeeded: bool,
}

impl PageResult {
    pub fn succeeded(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
            succeeded: true,
        }
    }

    pub fn failed(page_number: u32) -> Self {
        Self {
            page_number,
            text: String::new(),
            succeeded: false,
        }
    }
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    EngineNotAvailable(String),

    #[error("Failed to read page image: {0}")]
    ImageRead(#[from] std::io::Error),

    #[error("OCR processing failed: {0}")]
    ProcessingError(String),

    #[error("API error: {0}")]
    ApiError(String),
}
