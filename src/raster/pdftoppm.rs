//! pdftoppm backend (poppler-utils)

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use super::types::{RasterError, PAGE_PREFIX};
use super::PageRasterizer;

/// Renders pages by shelling out to `pdftoppm -png`
pub struct PdftoppmRasterizer {
    binary: String,
    density: u32,
}

impl PdftoppmRasterizer {
    pub fn new(binary: &str, density: u32) -> Self {
        Self {
            binary: binary.to_string(),
            density,
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    fn name(&self) -> &str {
        "pdftoppm"
    }

    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<(), RasterError> {
        let output = Command::new(&self.binary)
            .arg("-png")
            .arg("-r")
            .arg(self.density.to_string())
            .arg(pdf)
            .arg(out_dir.join(PAGE_PREFIX))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    RasterError::Unavailable(format!("{} not found", self.binary))
                }
                _ => RasterError::Failed(format!("Failed to run pdftoppm: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RasterError::Failed(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}
