//! DocScan Server
//!
//! Extracts the text of user-submitted PDFs: pages are rasterized with a
//! fallback chain of backends, run through OCR on a bounded worker pool and
//! stored back on the document with page markers.

pub mod config;
pub mod db;
pub mod document;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod raster;
pub mod routes;
pub mod state;
