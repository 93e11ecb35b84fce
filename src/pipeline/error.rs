//! Processing error types

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::document::StoreError;
use crate::raster::RasterizationError;

/// Terminal failure of a processing run
#[derive(Debug, Error)]
pub enum ProcessError {
    /// No document with this id
    #[error("PDF entry not found: {0}")]
    NotFound(String),

    /// Document exists but has no attached file
    #[error("No PDF file attached to document {0}")]
    MissingFile(String),

    /// Attached file reference does not resolve to bytes on disk
    #[error("PDF file not found: {0}")]
    FileNotFound(String),

    /// Every rasterizer backend failed
    #[error(transparent)]
    Rasterization(#[from] RasterizationError),

    /// Writing the extraction failed; OCR work is discarded
    #[error("Failed to save extraction: {0}")]
    Persistence(#[source] StoreError),

    /// Reading the document or file entry failed
    #[error("Failed to load document: {0}")]
    Storage(#[source] StoreError),

    /// Per-run work directory could not be created
    #[error("Failed to prepare work directory: {0}")]
    Workspace(#[from] std::io::Error),
}

/// Stable failure kind, used in logs and error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    MissingFile,
    FileNotFound,
    RasterizationFailed,
    PersistenceFailed,
    StorageError,
    WorkspaceError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::MissingFile => "missing_file",
            Self::FileNotFound => "file_not_found",
            Self::RasterizationFailed => "rasterization_failed",
            Self::PersistenceFailed => "persistence_failed",
            Self::StorageError => "storage_error",
            Self::WorkspaceError => "workspace_error",
        }
    }
}

impl Serialize for FailureKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl ProcessError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) => FailureKind::NotFound,
            Self::MissingFile(_) => FailureKind::MissingFile,
            Self::FileNotFound(_) => FailureKind::FileNotFound,
            Self::Rasterization(_) => FailureKind::RasterizationFailed,
            Self::Persistence(_) => FailureKind::PersistenceFailed,
            Self::Storage(_) => FailureKind::StorageError,
            Self::Workspace(_) => FailureKind::WorkspaceError,
        }
    }

    /// Diagnostic details for error bodies
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Rasterization(e) => Some(e.details()),
            Self::Persistence(e) | Self::Storage(e) => {
                Some(serde_json::json!({ "cause": e.to_string() }))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::BackendFailure;

    #[test]
    fn test_kinds_and_details() {
        let err = ProcessError::MissingFile("doc-1".to_string());
        assert_eq!(err.kind().as_str(), "missing_file");
        assert!(err.details().is_none());

        let err = ProcessError::from(RasterizationError {
            failures: vec![BackendFailure {
                backend: "pdftoppm".to_string(),
                message: "exit status 1".to_string(),
            }],
        });
        assert_eq!(err.kind(), FailureKind::RasterizationFailed);
        assert_eq!(err.details().unwrap()["pdftoppm"], "exit status 1");

        let err = ProcessError::Persistence(StoreError::RowMissing(7));
        assert_eq!(err.kind().as_str(), "persistence_failed");
        assert!(err.details().unwrap()["cause"]
            .as_str()
            .unwrap()
            .contains("7"));
    }

    #[test]
    fn test_kind_serializes_as_its_name() {
        for kind in [
            FailureKind::NotFound,
            FailureKind::FileNotFound,
            FailureKind::RasterizationFailed,
            FailureKind::WorkspaceError,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }
}
