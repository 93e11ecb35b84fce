//! Configuration management for DocScan Server

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

/// Upper bound on OCR workers per run
const MAX_OCR_WORKERS: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub rasterizer: RasterizerConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root that stored file URLs (e.g. `/uploads/x.pdf`) are resolved against
    pub public_dir: PathBuf,
    /// Root for per-run page image directories
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RasterizerConfig {
    /// Render density in dots per inch
    pub density: u32,
    /// Maximum page image width in pixels (library backend)
    pub max_width: u32,
    /// Maximum page image height in pixels (library backend)
    pub max_height: u32,
    /// Timeout for a single backend attempt
    pub timeout_secs: u64,
    /// Path or name of the pdftoppm executable
    pub pdftoppm_bin: String,
}

impl RasterizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngineKind {
    Tesseract,
    Ollama,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub engine: OcrEngineKind,
    pub workers: usize,
    pub language: String,
    pub job_timeout_secs: u64,
    pub tesseract_bin: String,
    pub ollama_url: String,
    pub ollama_model: String,
}

impl OcrConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Default OCR worker count: one less than the host's parallelism, between 1 and 4
pub fn default_worker_count() -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    parallelism.saturating_sub(1).clamp(1, 4)
}

impl Default for Config {
    fn default() -> Self {
        let public_dir = PathBuf::from("./public");
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 1337,
            },
            database: DatabaseConfig {
                url: "sqlite:./docscan.db".to_string(),
            },
            storage: StorageConfig {
                temp_dir: public_dir.join("uploads").join("temp"),
                public_dir,
            },
            rasterizer: RasterizerConfig {
                density: 150,
                max_width: 2480,
                max_height: 3508,
                timeout_secs: 120,
                pdftoppm_bin: "pdftoppm".to_string(),
            },
            ocr: OcrConfig {
                engine: OcrEngineKind::Tesseract,
                workers: default_worker_count(),
                language: "eng".to_string(),
                job_timeout_secs: 60,
                tesseract_bin: "tesseract".to_string(),
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "llava".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let public_dir = env::var("PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.public_dir);
        let temp_dir = env::var("TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| public_dir.join("uploads").join("temp"));

        let engine = match env::var("OCR_ENGINE") {
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "tesseract" => OcrEngineKind::Tesseract,
                "ollama" => OcrEngineKind::Ollama,
                _ => return Err(ConfigError::Invalid { key: "OCR_ENGINE", value }),
            },
            Err(_) => defaults.ocr.engine,
        };

        let workers: usize = parse_var("OCR_WORKERS", defaults.ocr.workers)?;

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_var("SERVER_PORT", defaults.server.port)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
            },
            storage: StorageConfig {
                public_dir,
                temp_dir,
            },
            rasterizer: RasterizerConfig {
                density: parse_nonzero("RASTER_DENSITY", defaults.rasterizer.density)?,
                max_width: parse_nonzero("RASTER_MAX_WIDTH", defaults.rasterizer.max_width)?,
                max_height: parse_nonzero("RASTER_MAX_HEIGHT", defaults.rasterizer.max_height)?,
                timeout_secs: parse_var("RASTER_TIMEOUT_SECS", defaults.rasterizer.timeout_secs)?,
                pdftoppm_bin: env::var("PDFTOPPM_BIN").unwrap_or(defaults.rasterizer.pdftoppm_bin),
            },
            ocr: OcrConfig {
                engine,
                workers: workers.clamp(1, MAX_OCR_WORKERS),
                language: env::var("OCR_LANGUAGE").unwrap_or(defaults.ocr.language),
                job_timeout_secs: parse_var("OCR_JOB_TIMEOUT_SECS", defaults.ocr.job_timeout_secs)?,
                tesseract_bin: env::var("TESSERACT_BIN").unwrap_or(defaults.ocr.tesseract_bin),
                ollama_url: env::var("OLLAMA_URL").unwrap_or(defaults.ocr.ollama_url),
                ollama_model: env::var("OLLAMA_MODEL").unwrap_or(defaults.ocr.ollama_model),
            },
        })
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// Like [`parse_var`], rejecting zero
fn parse_nonzero(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match parse_var(key, default)? {
        0 => Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        }),
        value => Ok(value),
    }
}
