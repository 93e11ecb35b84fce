//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::SqliteDocumentStore;
use crate::document::DocumentStore;
use crate::pipeline::PageOrchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn DocumentStore>,
    orchestrator: PageOrchestrator,
}

impl AppState {
    /// Create state backed by the SQLite pool and configured backends
    pub fn new(config: &Config, db: SqlitePool) -> Self {
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(db));
        Self::with_orchestrator(PageOrchestrator::from_config(config, store))
    }

    /// Create state around a prepared orchestrator, sharing its store
    pub fn with_orchestrator(orchestrator: PageOrchestrator) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                store: orchestrator.store().clone(),
                orchestrator,
            }),
        }
    }

    /// Get the document store
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    pub fn orchestrator(&self) -> &PageOrchestrator {
        &self.inner.orchestrator
    }
}
