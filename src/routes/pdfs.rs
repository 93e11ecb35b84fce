//! PDF API endpoints
//!
//! - Run OCR over a document
//! - Get a document's extraction status
//! - Query a processed document (mocked analysis)

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::document::DocumentStore;
use crate::error::{AppError, Result};
use crate::ocr::PageResult;
use crate::state::AppState;

/// Response for a completed OCR run
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub document_id: String,
    pub page_count: u32,
    pub pages_rasterized: usize,
    pub text_length: usize,
    pub text_preview: String,
}

/// Extraction status of a document
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub document_id: String,
    pub title: String,
    pub processed: bool,
    pub page_count: u32,
    pub text_length: usize,
    pub pages: Vec<PageResult>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub success: bool,
    pub document_id: String,
    pub query: String,
    pub result: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id", get(get_status))
        .route("/:id/process", post(process_pdf))
        .route("/:id/analyze", post(analyze_pdf))
}

/// Rasterize, OCR and store the text of a document
async fn process_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessResponse>> {
    let outcome = state.orchestrator().process(&id).await?;

    Ok(Json(ProcessResponse {
        success: true,
        message: "PDF processed successfully".to_string(),
        document_id: outcome.document_id,
        page_count: outcome.page_count,
        pages_rasterized: outcome.pages_rasterized,
        text_length: outcome.text_length,
        text_preview: outcome.text_preview,
    }))
}

async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>> {
    let document = state
        .store()
        .find_document(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("PDF not found".to_string()))?;

    let text_length = document.text_length();
    Ok(Json(StatusResponse {
        document_id: document.document_id,
        title: document.title,
        processed: document.processed,
        page_count: document.page_count,
        text_length,
        pages: document.pages.unwrap_or_default(),
    }))
}

/// Mocked analysis of a processed document
///
/// No language processing happens here; the answer is canned text.
async fn analyze_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<AnalyzeRequest>>,
) -> Result<Json<AnalyzeResponse>> {
    let query = body
        .and_then(|Json(request)| request.query)
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("Query parameter is required".to_string()))?;

    tracing::info!("Analyzing PDF {} with query: {}", id, query);

    let document = state
        .store()
        .find_document(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("PDF not found".to_string()))?;

    let has_text = document
        .extracted_text
        .as_deref()
        .is_some_and(|text| !text.is_empty());
    if !document.processed || !has_text {
        return Err(AppError::BadRequest(
            "PDF has not been processed yet. Please process it first.".to_string(),
        ));
    }

    let result = format!(
        "Based on my analysis of the document \"{}\" regarding \"{}\":\n\n\
         The document contains several sections related to your query.\n\n\
         Key points:\n\
         1. The document sets out conditions related to your query\n\
         2. Exceptions may apply under the relevant sections\n\n\
         This analysis is based on the text extracted from {} pages.",
        document.title, query, document.page_count
    );

    Ok(Json(AnalyzeResponse {
        success: true,
        document_id: document.document_id,
        query,
        result,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tempfile::TempDir;
    use tower::ServiceExt;

    use crate::db::{create_memory_pool, NewFile, SqliteDocumentStore};
    use crate::document::DocumentStore;
    use crate::ocr::testing::ScriptedFactory;
    use crate::pipeline::{PageOrchestrator, PipelineSettings};
    use crate::raster::testing::ScriptedRasterizer;
    use crate::raster::RasterizerChain;
    use crate::routes::app;
    use crate::state::AppState;

    struct Harness {
        _public: TempDir,
        _temp: TempDir,
        store: SqliteDocumentStore,
        state: AppState,
    }

    async fn harness(pages: &[&str]) -> Harness {
        let public = TempDir::new().unwrap();
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(public.path().join("uploads")).unwrap();
        std::fs::write(public.path().join("uploads/report.pdf"), b"%PDF-1.4").unwrap();

        let store = SqliteDocumentStore::new(create_memory_pool().await.unwrap());
        let file_id = store
            .create_file(&NewFile::pdf("report.pdf", "/uploads/report.pdf"))
            .await
            .unwrap();
        store
            .create_document("doc-1", "Quarterly Report", Some(file_id))
            .await
            .unwrap();

        let orchestrator = PageOrchestrator::new(
            Arc::new(store.clone()),
            RasterizerChain::new(
                vec![Arc::new(ScriptedRasterizer::pages("pdftoppm", pages))],
                Duration::from_secs(5),
            ),
            Arc::new(ScriptedFactory::new()),
            PipelineSettings {
                public_dir: public.path().to_path_buf(),
                temp_dir: temp.path().to_path_buf(),
                ocr_workers: 2,
                ocr_job_timeout: Duration::from_millis(300),
            },
        );

        Harness {
            state: AppState::with_orchestrator(orchestrator),
            store,
            _public: public,
            _temp: temp,
        }
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(&[]).await;
        let (status, body) = send(&h.state, Request::get("/health").body(Body::empty()).unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_process_then_status() {
        let h = harness(&["Revenue grew", "Costs fell"]).await;

        let (status, body) = send(
            &h.state,
            Request::post("/pdfs/doc-1/process").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["documentId"], "doc-1");
        assert_eq!(body["pageCount"], 2);
        assert_eq!(body["pagesRasterized"], 2);
        assert!(body["textPreview"]
            .as_str()
            .unwrap()
            .starts_with("--- Page 1 ---\nRevenue grew"));

        let (status, body) = send(&h.state, Request::get("/pdfs/doc-1").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processed"], true);
        assert_eq!(body["title"], "Quarterly Report");
        assert_eq!(body["pages"].as_array().unwrap().len(), 2);
        assert_eq!(body["pages"][1]["text"], "Costs fell");
    }

    #[tokio::test]
    async fn test_process_unknown_document() {
        let h = harness(&["x"]).await;
        let (status, body) = send(
            &h.state,
            Request::post("/pdfs/missing/process").body(Body::empty()).unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_status_unknown_document() {
        let h = harness(&[]).await;
        let (status, _) = send(&h.state, Request::get("/pdfs/missing").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_analyze_requires_query() {
        let h = harness(&[]).await;

        let (status, body) = send(&h.state, post_json("/pdfs/doc-1/analyze", serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Query parameter is required");

        let (status, _) = send(
            &h.state,
            post_json("/pdfs/doc-1/analyze", serde_json::json!({ "query": "  " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &h.state,
            Request::post("/pdfs/doc-1/analyze").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_unprocessed_and_unknown() {
        let h = harness(&["text"]).await;

        let (status, body) = send(
            &h.state,
            post_json("/pdfs/doc-1/analyze", serde_json::json!({ "query": "termination" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["message"],
            "PDF has not been processed yet. Please process it first."
        );

        let (status, _) = send(
            &h.state,
            post_json("/pdfs/nope/analyze", serde_json::json!({ "query": "termination" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_analyze_after_processing() {
        let h = harness(&["Termination requires notice"]).await;
        let (status, _) = send(
            &h.state,
            Request::post("/pdfs/doc-1/process").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(
            &h.state,
            post_json("/pdfs/doc-1/analyze", serde_json::json!({ "query": "termination" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["query"], "termination");
        let result = body["result"].as_str().unwrap();
        assert!(result.contains("Quarterly Report"));
        assert!(result.contains("termination"));

        assert!(h.store.find_document("doc-1").await.unwrap().unwrap().processed);
    }
}
