//! Database schema initialization

use sqlx::SqlitePool;

use crate::document::StoreResult;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Uploaded files (written by the upload flow)
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    -- Public URL relative to the storage root, e.g. /uploads/report_3f2a.pdf
    url TEXT NOT NULL,
    hash TEXT,
    mime TEXT,
    size INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Documents and their OCR extraction
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    file_id INTEGER REFERENCES files(id) ON DELETE SET NULL,
    processed INTEGER NOT NULL DEFAULT 0,
    page_count INTEGER NOT NULL DEFAULT 0,
    extracted_text TEXT,
    -- Per-page results (JSON array of {page_number, text, succeeded})
    pages_json TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_documents_file_id ON documents(file_id);
CREATE INDEX IF NOT EXISTS idx_documents_processed ON documents(processed);
"#;
