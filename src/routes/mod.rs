//! Route modules for DocScan Server

pub mod health;
pub mod pdfs;

use axum::{routing::get, Router};

use crate::state::AppState;

/// Full application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .nest("/pdfs", pdfs::router())
        .with_state(state)
}
