//! OCR Module
//!
//! Runs page images through OCR engines on a bounded worker pool.
//!
//! Supports multiple engines:
//! - Tesseract (local CLI, requires installation)
//! - Ollama vision models (local LLM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docscan_server::ocr::{OcrJob, OcrWorkerPool, TesseractFactory};
//!
//! let factory = TesseractFactory::new("tesseract", "eng");
//! let mut pool = OcrWorkerPool::initialize(4, &factory, Duration::from_secs(60));
//!
//! let results = pool.submit_all(jobs).await;
//! pool.shutdown().await;
//! ```

mod engine;
mod pool;
mod types;

pub use engine::{
    engine_factory, OcrEngine, OcrEngineFactory, OllamaEngine, OllamaFactory, TesseractEngine,
    TesseractFactory,
};
pub use pool::OcrWorkerPool;
pub use types::{OcrError, OcrJob, PageResult};

#[cfg(test)]
pub(crate) use engine::testing;
