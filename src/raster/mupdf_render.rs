//! MuPDF backend
//!
//! Library-based fallback used when the external tool is missing or fails.
//! Pages are rendered at the configured density, shrunk to fit within the
//! maximum image size, and written as PNG.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use mupdf::{Colorspace, Document, Matrix};

use super::types::{page_file_name, RasterError};
use super::PageRasterizer;
use crate::config::RasterizerConfig;

/// Density and size bounds for library rendering
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub density: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl From<&RasterizerConfig> for RenderOptions {
    fn from(config: &RasterizerConfig) -> Self {
        Self {
            density: config.density,
            max_width: config.max_width,
            max_height: config.max_height,
        }
    }
}

/// Renders pages in-process with MuPDF
///
/// An abandoned render finishes its current page before stopping; see
/// [`super::RasterizerChain::new`] for where this backend belongs.
pub struct MupdfRasterizer {
    options: RenderOptions,
}

impl MupdfRasterizer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

/// Flags the blocking render loop to stop once the awaiting future is gone
struct AbandonOnDrop(Arc<AtomicBool>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl PageRasterizer for MupdfRasterizer {
    fn name(&self) -> &str {
        "mupdf"
    }

    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<(), RasterError> {
        let abandoned = Arc::new(AtomicBool::new(false));
        let _guard = AbandonOnDrop(abandoned.clone());

        let pdf: PathBuf = pdf.to_path_buf();
        let out_dir: PathBuf = out_dir.to_path_buf();
        let options = self.options;

        let rendered = tokio::task::spawn_blocking(move || {
            render_pages(&pdf, &out_dir, options, &abandoned)
        })
        .await
        .map_err(|e| RasterError::Failed(format!("Render task join error: {}", e)))??;

        tracing::debug!("MuPDF rendered {} pages", rendered);
        Ok(())
    }
}

fn render_pages(
    pdf: &Path,
    out_dir: &Path,
    options: RenderOptions,
    abandoned: &AtomicBool,
) -> Result<usize, RasterError> {
    let path_str = pdf.to_string_lossy();
    let doc = Document::open(&*path_str)?;
    let page_count = doc.page_count()?;

    for index in 0..page_count {
        if abandoned.load(Ordering::Relaxed) {
            return Err(RasterError::Failed("render abandoned".to_string()));
        }

        let page = doc.load_page(index)?;
        let bounds = page.bounds()?;
        let scale = fit_scale(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0, options);

        let matrix = Matrix::new_scale(scale, scale);
        let colorspace = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&matrix, &colorspace, false, true)?;

        let png = encode_png(&pixmap)?;
        std::fs::write(out_dir.join(page_file_name(index as u32 + 1)), png)?;
    }

    Ok(page_count.max(0) as usize)
}

/// Scale for a page of `width` x `height` points
///
/// Starts from `density / 72` and shrinks so the image fits the size bounds.
fn fit_scale(width: f32, height: f32, options: RenderOptions) -> f32 {
    let scale = options.density as f32 / 72.0;
    if width <= 0.0 || height <= 0.0 {
        return scale;
    }

    let fit_width = options.max_width as f32 / width;
    let fit_height = options.max_height as f32 / height;
    scale.min(fit_width).min(fit_height)
}

/// Bytes needed for an RGB buffer, `None` if it does not fit in memory
fn rgb_capacity(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)
}

fn encode_png(pixmap: &mupdf::Pixmap) -> Result<Vec<u8>, RasterError> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let capacity = rgb_capacity(width, height)
        .ok_or_else(|| RasterError::Failed(format!("Page image too large: {}x{}", width, height)))?;
    let mut rgb_buffer = Vec::with_capacity(capacity);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(255);
            // Grayscale pixmaps carry a single channel
            let (g, b) = if n >= 3 {
                (
                    samples.get(offset + 1).copied().unwrap_or(255),
                    samples.get(offset + 2).copied().unwrap_or(255),
                )
            } else {
                (r, r)
            };
            rgb_buffer.extend_from_slice(&[r, g, b]);
        }
    }

    let img = image::RgbImage::from_raw(width, height, rgb_buffer)
        .ok_or_else(|| RasterError::Failed("Failed to create image buffer".to_string()))?;

    let mut output = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| RasterError::Failed(format!("PNG encoding failed: {}", e)))?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RenderOptions {
        RenderOptions {
            density: 144,
            max_width: 800,
            max_height: 800,
        }
    }

    #[test]
    fn test_fit_scale_uses_density_when_page_fits() {
        // 2x scale keeps a 300x300pt page at 600x600px
        assert_eq!(fit_scale(300.0, 300.0, options()), 2.0);
    }

    #[test]
    fn test_fit_scale_shrinks_to_bounds() {
        // A4 portrait at 2x would be 1190x1684px
        let scale = fit_scale(595.0, 842.0, options());
        assert!((842.0 * scale - 800.0).abs() < 0.01);
        assert!(595.0 * scale <= 800.0);
    }

    #[test]
    fn test_rgb_capacity_does_not_wrap() {
        assert_eq!(rgb_capacity(2480, 3508), Some(2480 * 3508 * 3));
        // 40000 x 40000 x 3 overflows u32
        assert_eq!(rgb_capacity(40_000, 40_000), Some(4_800_000_000));
    }

    #[test]
    fn test_fit_scale_degenerate_bounds() {
        assert_eq!(fit_scale(0.0, 100.0, options()), 2.0);
    }

    #[tokio::test]
    async fn test_unreadable_document_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let backend = MupdfRasterizer::new(options());

        let result = backend
            .rasterize(&dir.path().join("missing.pdf"), dir.path())
            .await;

        assert!(matches!(result, Err(RasterError::Failed(_))));
    }
}
