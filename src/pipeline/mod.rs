//! Document processing pipeline
//!
//! Resolves a document's PDF, rasterizes it, runs OCR over every page on a
//! bounded worker pool, assembles the text and persists it.

mod assembler;
mod error;
mod orchestrator;
mod workspace;

pub use assembler::{assemble, page_marker, Assembly};
pub use error::{FailureKind, ProcessError};
pub use orchestrator::{PageOrchestrator, PipelineSettings, ProcessingOutcome, RunState};
pub use workspace::RunWorkspace;
