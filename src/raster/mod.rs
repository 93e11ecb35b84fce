//! Page rasterization
//!
//! Turns a PDF into an ordered list of page images. Backends are tried one
//! after another; the next backend starts only after the previous attempt
//! has definitively failed (error, missing binary, timeout or empty output).
//!
//! Each attempt renders into its own fresh directory and a failed attempt's
//! directory is removed before falling back, so page discovery only ever
//! sees the output of the successful backend.

mod mupdf_render;
mod pdftoppm;
mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

pub use mupdf_render::{MupdfRasterizer, RenderOptions};
pub use pdftoppm::PdftoppmRasterizer;
pub use types::{
    page_file_name, parse_page_index, BackendFailure, PageImage, RasterError,
    RasterizationError, PAGE_PREFIX,
};

use crate::config::RasterizerConfig;

/// A page rasterization backend
///
/// Implementations write one PNG per page into `out_dir`, named with
/// [`page_file_name`] (zero-padded indices are tolerated).
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Backend name, used in logs and error details
    fn name(&self) -> &str;

    /// Render every page of `pdf` into `out_dir`
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<(), RasterError>;
}

/// Ordered backends with sequential fallback
#[derive(Clone)]
pub struct RasterizerChain {
    backends: Vec<Arc<dyn PageRasterizer>>,
    attempt_timeout: Duration,
}

impl RasterizerChain {
    /// Chain trying `backends` in order, each bounded by `attempt_timeout`
    ///
    /// A timed-out external process is killed before the next backend
    /// starts. An in-process backend such as [`MupdfRasterizer`] only stops
    /// at its next page boundary, so it may still be writing its own
    /// directory when the next attempt begins. Put in-process backends last.
    pub fn new(backends: Vec<Arc<dyn PageRasterizer>>, attempt_timeout: Duration) -> Self {
        Self {
            backends,
            attempt_timeout,
        }
    }

    /// pdftoppm first, MuPDF as fallback
    pub fn from_config(config: &RasterizerConfig) -> Self {
        Self::new(
            vec![
                Arc::new(PdftoppmRasterizer::new(&config.pdftoppm_bin, config.density)),
                Arc::new(MupdfRasterizer::new(RenderOptions::from(config))),
            ],
            config.timeout(),
        )
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Rasterize `pdf` below `work_dir`
    ///
    /// Fails only when every backend has failed; the error carries each
    /// backend's message.
    pub async fn rasterize(
        &self,
        pdf: &Path,
        work_dir: &Path,
    ) -> Result<Vec<PageImage>, RasterizationError> {
        let mut failures = Vec::new();

        for (index, backend) in self.backends.iter().enumerate() {
            let out_dir = work_dir.join(format!("{}-{}", index + 1, backend.name()));

            match self.attempt(backend.as_ref(), pdf, &out_dir).await {
                Ok(pages) => {
                    tracing::info!("{} rasterized {} pages", backend.name(), pages.len());
                    return Ok(pages);
                }
                Err(e) => {
                    tracing::warn!("Rasterizer {} failed: {}", backend.name(), e);
                    if let Err(cleanup) = tokio::fs::remove_dir_all(&out_dir).await {
                        if cleanup.kind() != std::io::ErrorKind::NotFound {
                            tracing::warn!(
                                "Failed to remove output of {} at {}: {}",
                                backend.name(),
                                out_dir.display(),
                                cleanup
                            );
                        }
                    }
                    failures.push(BackendFailure {
                        backend: backend.name().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(RasterizationError { failures })
    }

    async fn attempt(
        &self,
        backend: &dyn PageRasterizer,
        pdf: &Path,
        out_dir: &Path,
    ) -> Result<Vec<PageImage>, RasterError> {
        tokio::fs::create_dir_all(out_dir).await?;

        match timeout(self.attempt_timeout, backend.rasterize(pdf, out_dir)).await {
            Ok(result) => result?,
            Err(_) => return Err(RasterError::TimedOut(self.attempt_timeout)),
        }

        let pages = discover_pages(out_dir).await?;
        if pages.is_empty() {
            return Err(RasterError::NoPages);
        }
        Ok(pages)
    }
}

/// Collect page images in `dir`, ordered by their numeric page index
///
/// The result is renumbered as a contiguous 1-based sequence.
pub async fn discover_pages(dir: &Path) -> std::io::Result<Vec<PageImage>> {
    let mut indexed: Vec<(u32, PathBuf)> = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(index) = file_name.to_str().and_then(parse_page_index) else {
            continue;
        };
        indexed.push((index, entry.path()));
    }

    indexed.sort_by_key(|(index, _)| *index);

    Ok(indexed
        .into_iter()
        .enumerate()
        .map(|(position, (_, path))| PageImage {
            page_number: position as u32 + 1,
            path,
        })
        .collect())
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedRasterizer;
    use super::*;
    use tempfile::TempDir;

    fn chain(backends: Vec<Arc<dyn PageRasterizer>>) -> RasterizerChain {
        RasterizerChain::new(backends, Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_discover_pages_sorts_numerically() {
        let dir = TempDir::new().unwrap();
        for n in [10, 2, 1, 11, 3] {
            std::fs::write(dir.path().join(page_file_name(n)), format!("{}", n)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let pages = discover_pages(dir.path()).await.unwrap();
        let order: Vec<String> = pages
            .iter()
            .map(|p| std::fs::read_to_string(&p.path).unwrap())
            .collect();

        assert_eq!(order, vec!["1", "2", "3", "10", "11"]);
        let numbers: Vec<u32> = pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_discover_pages_zero_padded() {
        let dir = TempDir::new().unwrap();
        for name in ["page-010.png", "page-002.png", "page-001.png"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }

        let pages = discover_pages(dir.path()).await.unwrap();
        let names: Vec<String> = pages
            .iter()
            .map(|p| p.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["page-001.png", "page-002.png", "page-010.png"]);
    }

    #[tokio::test]
    async fn test_primary_backend_wins() {
        let work = TempDir::new().unwrap();
        let primary = Arc::new(ScriptedRasterizer::pages("primary", &["a", "b"]));
        let fallback = Arc::new(ScriptedRasterizer::pages("fallback", &["x"]));

        let pages = chain(vec![primary.clone(), fallback.clone()])
            .rasterize(Path::new("in.pdf"), work.path())
            .await
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
    }

    #[tokio::test]
    async fn test_fallback_leaves_no_primary_artifacts() {
        let work = TempDir::new().unwrap();
        let primary = Arc::new(ScriptedRasterizer::failing_after("primary", "boom", 3));
        let fallback = Arc::new(ScriptedRasterizer::pages("fallback", &["one", "two"]));

        let pages = chain(vec![primary, fallback])
            .rasterize(Path::new("in.pdf"), work.path())
            .await
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(std::fs::read_to_string(&pages[0].path).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(&pages[1].path).unwrap(), "two");

        // Only the fallback's directory remains
        let remaining: Vec<String> = std::fs::read_dir(work.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining, vec!["2-fallback"]);
    }

    #[tokio::test]
    async fn test_timeout_advances_to_fallback() {
        let work = TempDir::new().unwrap();
        let primary = Arc::new(ScriptedRasterizer::slow("primary", Duration::from_secs(30), &["late"]));
        let fallback = Arc::new(ScriptedRasterizer::pages("fallback", &["fast"]));

        let pages = chain(vec![primary, fallback.clone()])
            .rasterize(Path::new("in.pdf"), work.path())
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(fallback.calls(), 1);
        assert_eq!(std::fs::read_to_string(&pages[0].path).unwrap(), "fast");
    }

    #[tokio::test]
    async fn test_empty_output_counts_as_failure() {
        let work = TempDir::new().unwrap();
        let empty = Arc::new(ScriptedRasterizer::pages("empty", &[]));
        let fallback = Arc::new(ScriptedRasterizer::pages("fallback", &["p1"]));

        let pages = chain(vec![empty, fallback])
            .rasterize(Path::new("in.pdf"), work.path())
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn test_all_backends_fail() {
        let work = TempDir::new().unwrap();
        let missing = Arc::new(PdftoppmRasterizer::new("/nonexistent/bin/pdftoppm", 150));
        let broken = Arc::new(ScriptedRasterizer::failing("mupdf", "cannot open document"));

        let err = chain(vec![missing, broken])
            .rasterize(Path::new("in.pdf"), work.path())
            .await
            .unwrap_err();

        assert_eq!(err.failures.len(), 2);
        assert_eq!(err.failures[0].backend, "pdftoppm");
        assert!(err.failures[0].message.contains("not found"));
        assert_eq!(err.failures[1].backend, "mupdf");
        assert_eq!(err.failures[1].message, "cannot open document");
        assert_eq!(std::fs::read_dir(work.path()).unwrap().count(), 0);
    }

    /// The in-process renderer must stay last
    #[test]
    fn test_from_config_order() {
        let config = crate::config::Config::default().rasterizer;
        let chain = RasterizerChain::from_config(&config);
        assert_eq!(chain.backend_names(), vec!["pdftoppm", "mupdf"]);
    }
}
