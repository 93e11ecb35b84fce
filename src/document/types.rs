//! Document types

use serde::Serialize;

use crate::ocr::PageResult;

/// A user-submitted PDF and its extraction state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Store-local row id
    pub internal_id: i64,
    /// Stable external identifier used in URLs
    pub document_id: String,
    pub title: String,
    /// Attached file, if any
    pub file_id: Option<i64>,
    pub processed: bool,
    pub page_count: u32,
    pub extracted_text: Option<String>,
    pub pages: Option<Vec<PageResult>>,
}

impl Document {
    /// Length of the extracted text in characters
    pub fn text_length(&self) -> usize {
        self.extracted_text
            .as_deref()
            .map(|t| t.chars().count())
            .unwrap_or(0)
    }
}

/// Uploaded file entry backing a document
#[derive(Debug, Clone, Serialize)]
pub struct StoredFile {
    pub id: i64,
    pub name: String,
    /// Public URL relative to the storage root (e.g. `/uploads/report_3f2a.pdf`)
    pub url: String,
    pub hash: Option<String>,
    pub mime: Option<String>,
    pub size: Option<i64>,
}

/// Outcome of one OCR run, written over the document in a single update
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub processed: bool,
    pub page_count: u32,
    pub extracted_text: String,
    pub pages: Vec<PageResult>,
}
