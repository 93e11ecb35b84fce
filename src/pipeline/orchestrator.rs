//! Page orchestrator
//!
//! Drives one document through the pipeline:
//!
//! ```text
//! Started -> FileResolved -> Rasterized -> OcrDispatched -> Assembled
//!         -> Persisted -> CleanedUp
//! ```
//!
//! Any step may end the run in `Failed(kind)`. Nothing is retried here;
//! a successful run overwrites the previous extraction, so callers retry by
//! running the document again. Two concurrent runs for the same document
//! are not serialized: the last write wins.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::assembler::assemble;
use super::error::{FailureKind, ProcessError};
use super::workspace::RunWorkspace;
use crate::config::Config;
use crate::document::{Document, DocumentStore, Extraction};
use crate::ocr::{engine_factory, OcrEngineFactory, OcrJob, OcrWorkerPool, PageResult};
use crate::raster::{PageImage, RasterizerChain};

/// Characters of extracted text echoed back to callers
const PREVIEW_CHARS: usize = 100;

/// Run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Started,
    FileResolved,
    Rasterized,
    OcrDispatched,
    Assembled,
    Persisted,
    CleanedUp,
    Failed(FailureKind),
}

/// Result of a successful run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOutcome {
    pub document_id: String,
    pub processed: bool,
    /// Pages with successful OCR
    pub page_count: u32,
    pub pages_rasterized: usize,
    pub text_length: usize,
    pub text_preview: String,
    pub state: RunState,
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root that file URLs resolve against
    pub public_dir: PathBuf,
    /// Root for per-run work directories
    pub temp_dir: PathBuf,
    pub ocr_workers: usize,
    pub ocr_job_timeout: Duration,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            public_dir: config.storage.public_dir.clone(),
            temp_dir: config.storage.temp_dir.clone(),
            ocr_workers: config.ocr.workers,
            ocr_job_timeout: config.ocr.job_timeout(),
        }
    }
}

/// Tracks and logs state transitions of one run
struct RunTracker<'a> {
    document_id: &'a str,
    state: RunState,
    started: Instant,
}

impl<'a> RunTracker<'a> {
    fn new(document_id: &'a str) -> Self {
        tracing::info!("Processing PDF with document_id: {}", document_id);
        Self {
            document_id,
            state: RunState::Started,
            started: Instant::now(),
        }
    }

    fn advance(&mut self, next: RunState) {
        tracing::debug!(
            "Document {}: {:?} -> {:?} ({:?} elapsed)",
            self.document_id,
            self.state,
            next,
            self.started.elapsed()
        );
        self.state = next;
    }

    fn fail(&mut self, error: &ProcessError) {
        tracing::error!(
            "Processing of {} failed in state {:?}: {}",
            self.document_id,
            self.state,
            error
        );
        self.state = RunState::Failed(error.kind());
    }
}

/// Runs the OCR pipeline for documents
///
/// Collaborators are injected at construction; the orchestrator holds no
/// per-run state, so one instance serves concurrent runs.
#[derive(Clone)]
pub struct PageOrchestrator {
    store: Arc<dyn DocumentStore>,
    rasterizer: RasterizerChain,
    engines: Arc<dyn OcrEngineFactory>,
    settings: PipelineSettings,
}

impl PageOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        rasterizer: RasterizerChain,
        engines: Arc<dyn OcrEngineFactory>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            rasterizer,
            engines,
            settings,
        }
    }

    /// Orchestrator with the backends selected by configuration
    pub fn from_config(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        Self::new(
            store,
            RasterizerChain::from_config(&config.rasterizer),
            engine_factory(&config.ocr),
            PipelineSettings::from(config),
        )
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Extract the text of one document and store it
    pub async fn process(&self, document_id: &str) -> Result<ProcessingOutcome, ProcessError> {
        let mut tracker = RunTracker::new(document_id);
        let result = self.run(document_id, &mut tracker).await;
        match &result {
            Ok(outcome) => tracing::info!(
                "Processed {}: {}/{} pages recognized in {:?}",
                document_id,
                outcome.page_count,
                outcome.pages_rasterized,
                tracker.started.elapsed()
            ),
            Err(e) => tracker.fail(e),
        }
        result
    }

    async fn run(
        &self,
        document_id: &str,
        tracker: &mut RunTracker<'_>,
    ) -> Result<ProcessingOutcome, ProcessError> {
        let document = self
            .store
            .find_document(document_id)
            .await
            .map_err(ProcessError::Storage)?
            .ok_or_else(|| ProcessError::NotFound(document_id.to_string()))?;

        let pdf_path = self.resolve_file(&document).await?;
        tracker.advance(RunState::FileResolved);

        // Removed on every exit path from here on, but never while an OCR
        // worker may still read from it
        let workspace = Arc::new(RunWorkspace::create(&self.settings.temp_dir).await?);

        let pages = match self.rasterizer.rasterize(&pdf_path, workspace.path()).await {
            Ok(pages) => pages,
            Err(e) => {
                release(workspace).await;
                return Err(e.into());
            }
        };
        let pages_rasterized = pages.len();
        tracker.advance(RunState::Rasterized);

        tracker.advance(RunState::OcrDispatched);
        let results = self.recognize(&pages, &workspace).await;

        let assembly = assemble(results);
        tracker.advance(RunState::Assembled);

        let extraction = Extraction {
            processed: assembly.page_count > 0,
            page_count: assembly.page_count,
            extracted_text: assembly.full_text,
            pages: assembly.pages,
        };

        let saved = self
            .store
            .save_extraction(document.internal_id, &extraction)
            .await;
        // Page images go regardless of the write outcome
        release(workspace).await;
        saved.map_err(ProcessError::Persistence)?;
        tracker.advance(RunState::Persisted);
        tracker.advance(RunState::CleanedUp);

        Ok(ProcessingOutcome {
            document_id: document.document_id,
            processed: extraction.processed,
            page_count: extraction.page_count,
            pages_rasterized,
            text_length: extraction.extracted_text.chars().count(),
            text_preview: extraction.extracted_text.chars().take(PREVIEW_CHARS).collect(),
            state: tracker.state,
        })
    }

    /// Locate the PDF bytes backing `document`
    async fn resolve_file(&self, document: &Document) -> Result<PathBuf, ProcessError> {
        let file_id = document
            .file_id
            .ok_or_else(|| ProcessError::MissingFile(document.document_id.clone()))?;

        let file = self
            .store
            .find_file(file_id)
            .await
            .map_err(ProcessError::Storage)?
            .ok_or_else(|| {
                ProcessError::FileNotFound(format!("file entry {} does not exist", file_id))
            })?;

        let path = public_path(&self.settings.public_dir, &file.url).ok_or_else(|| {
            ProcessError::FileNotFound(format!("invalid file URL {:?}", file.url))
        })?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                tracing::debug!("Document {} backed by {}", document.document_id, path.display());
                Ok(path)
            }
            _ => Err(ProcessError::FileNotFound(path.display().to_string())),
        }
    }

    /// OCR every page on a pool owned by this call
    ///
    /// The pool keeps `workspace` alive until its last worker retires, so a
    /// cancelled run leaves the page images in place for jobs still running.
    async fn recognize(&self, pages: &[PageImage], workspace: &Arc<RunWorkspace>) -> Vec<PageResult> {
        let jobs: Vec<OcrJob> = pages
            .iter()
            .map(|page| OcrJob {
                page_number: page.page_number,
                image: page.path.clone(),
            })
            .collect();

        let workers = self.settings.ocr_workers.min(jobs.len()).max(1);
        let mut pool =
            OcrWorkerPool::initialize(workers, self.engines.as_ref(), self.settings.ocr_job_timeout);
        pool.retain_until_retired(workspace.clone());

        tracing::debug!(
            "Dispatching {} OCR jobs to {} workers",
            jobs.len(),
            pool.worker_count()
        );
        let results = pool.submit_all(jobs).await;
        pool.shutdown().await;

        results
    }
}

/// Remove the run's page images once no worker holds them
async fn release(workspace: Arc<RunWorkspace>) {
    match Arc::try_unwrap(workspace) {
        Ok(workspace) => {
            workspace.cleanup().await;
        }
        // Last holder removes it on drop
        Err(shared) => drop(shared),
    }
}

/// Resolve a public file URL (e.g. `/uploads/a.pdf`) below `root`
///
/// Returns `None` for empty URLs and URLs escaping the root.
fn public_path(root: &Path, url: &str) -> Option<PathBuf> {
    let relative = Path::new(url.trim().trim_start_matches('/'));
    if relative.as_os_str().is_empty() {
        return None;
    }
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}
