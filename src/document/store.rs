//! Document store trait

use async_trait::async_trait;

use super::types::{Document, Extraction, StoredFile};

/// Errors raised by a document store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document row {0} no longer exists")]
    RowMissing(i64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence seam used by the page orchestrator
///
/// Implementations must make `save_extraction` a whole-row overwrite so that
/// re-running a document replaces the previous extraction.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Look up a document by its external identifier
    async fn find_document(&self, document_id: &str) -> StoreResult<Option<Document>>;

    /// Look up an uploaded file entry
    async fn find_file(&self, file_id: i64) -> StoreResult<Option<StoredFile>>;

    /// Overwrite the extraction fields of a document
    async fn save_extraction(&self, internal_id: i64, extraction: &Extraction) -> StoreResult<()>;
}
