//! OCR Engines
//!
//! Defines the engine trait and implementations for different OCR backends.
//! The worker pool asks an [`OcrEngineFactory`] for one engine per worker.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use super::types::OcrError;
use crate::config::{OcrConfig, OcrEngineKind};

/// OCR engine trait
///
/// An engine instance is owned by a single worker and processes one image
/// at a time.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Extract text from a page image
    async fn recognize(&self, image: &Path) -> Result<String, OcrError>;

    /// Release engine resources; called once when the owning worker retires
    async fn terminate(&self) {}
}

/// Creates engine instances for the worker pool
pub trait OcrEngineFactory: Send + Sync {
    fn create(&self, worker_id: usize) -> Box<dyn OcrEngine>;
}

/// Build the engine factory selected by configuration
pub fn engine_factory(config: &OcrConfig) -> Arc<dyn OcrEngineFactory> {
    match config.engine {
        OcrEngineKind::Tesseract => Arc::new(TesseractFactory::new(
            &config.tesseract_bin,
            &config.language,
        )),
        OcrEngineKind::Ollama => Arc::new(OllamaFactory::new(
            &config.ollama_url,
            &config.ollama_model,
            &config.language,
        )),
    }
}

/// Tesseract OCR engine (CLI)
pub struct TesseractEngine {
    binary: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(binary: &str, language: &str) -> Self {
        Self {
            binary: binary.to_string(),
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        // Killed if the job times out and this future is dropped
        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--oem")
            .arg("3")
            .arg("--psm")
            .arg("3")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => OcrError::EngineNotAvailable(format!(
                    "{} not found: {}",
                    self.binary, e
                )),
                _ => OcrError::ProcessingError(format!("Failed to run tesseract: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Factory for [`TesseractEngine`]
pub struct TesseractFactory {
    binary: String,
    language: String,
}

impl TesseractFactory {
    pub fn new(binary: &str, language: &str) -> Self {
        Self {
            binary: binary.to_string(),
            language: language.to_string(),
        }
    }
}

impl OcrEngineFactory for TesseractFactory {
    fn create(&self, _worker_id: usize) -> Box<dyn OcrEngine> {
        Box::new(TesseractEngine::new(&self.binary, &self.language))
    }
}

/// Ollama vision model engine
pub struct OllamaEngine {
    client: reqwest::Client,
    /// Ollama API URL
    base_url: String,
    /// Model name (e.g., "llava", "bakllava")
    model: String,
    language: String,
}

impl OllamaEngine {
    pub fn new(base_url: &str, model: &str, language: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl OcrEngine for OllamaEngine {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        use base64::Engine;

        let image_data = tokio::fs::read(image).await?;
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&image_data);

        let prompt = format!(
            "Extract all text from this image exactly as written. The text is in {}. Return only the extracted text, nothing else.",
            self.language
        );

        let request = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "images": [image_base64],
            "stream": false
        });

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    OcrError::EngineNotAvailable(format!("Ollama unreachable at {}: {}", self.base_url, e))
                } else {
                    OcrError::ApiError(format!("Failed to call Ollama: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::ApiError(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OcrError::ApiError(format!("Failed to parse response: {}", e)))?;

        Ok(result["response"].as_str().unwrap_or("").trim().to_string())
    }
}

/// Factory for [`OllamaEngine`]
pub struct OllamaFactory {
    base_url: String,
    model: String,
    language: String,
}

impl OllamaFactory {
    pub fn new(base_url: &str, model: &str, language: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            model: model.to_string(),
            language: language.to_string(),
        }
    }
}

impl OcrEngineFactory for OllamaFactory {
    fn create(&self, _worker_id: usize) -> Box<dyn OcrEngine> {
        Box::new(OllamaEngine::new(&self.base_url, &self.model, &self.language))
    }
}
