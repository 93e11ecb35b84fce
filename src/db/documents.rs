//! Document and file database operations

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::document::{Document, DocumentStore, Extraction, StoreError, StoreResult, StoredFile};
use crate::ocr::PageResult;

/// Document row as stored
#[derive(Debug, Clone, sqlx::FromRow)]
struct DocumentRow {
    id: i64,
    document_id: String,
    title: String,
    file_id: Option<i64>,
    processed: bool,
    page_count: i64,
    extracted_text: Option<String>,
    pages_json: Option<String>,
}

impl DocumentRow {
    fn into_document(self) -> StoreResult<Document> {
        let pages = match self.pages_json.as_deref() {
            Some(json) => Some(serde_json::from_str::<Vec<PageResult>>(json)?),
            None => None,
        };

        Ok(Document {
            internal_id: self.id,
            document_id: self.document_id,
            title: self.title,
            file_id: self.file_id,
            processed: self.processed,
            page_count: self.page_count.max(0) as u32,
            extracted_text: self.extracted_text,
            pages,
        })
    }
}

/// File row as stored
#[derive(Debug, Clone, sqlx::FromRow)]
struct FileRow {
    id: i64,
    name: String,
    url: String,
    hash: Option<String>,
    mime: Option<String>,
    size: Option<i64>,
}

impl From<FileRow> for StoredFile {
    fn from(row: FileRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            url: row.url,
            hash: row.hash,
            mime: row.mime,
            size: row.size,
        }
    }
}

/// New file entry
#[derive(Debug, Clone)]
pub struct NewFile {
    pub name: String,
    pub url: String,
    pub hash: Option<String>,
    pub mime: Option<String>,
    pub size: Option<i64>,
}

impl NewFile {
    /// PDF entry with just a name and public URL
    pub fn pdf(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            hash: None,
            mime: Some("application/pdf".to_string()),
            size: None,
        }
    }
}

/// SQLite-backed document store
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a file entry, returning its id
    pub async fn create_file(&self, file: &NewFile) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO files (name, url, hash, mime, size)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file.name)
        .bind(&file.url)
        .bind(&file.hash)
        .bind(&file.mime)
        .bind(file.size)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert an unprocessed document, returning its internal id
    pub async fn create_document(
        &self,
        document_id: &str,
        title: &str,
        file_id: Option<i64>,
    ) -> StoreResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (document_id, title, file_id)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(document_id)
        .bind(title)
        .bind(file_id)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Attach (or replace) the file backing a document
    pub async fn attach_file(&self, internal_id: i64, file_id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents SET file_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(file_id)
        .bind(Utc::now().to_rfc3339())
        .bind(internal_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowMissing(internal_id));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find_document(&self, document_id: &str) -> StoreResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, document_id, title, file_id, processed, page_count,
                   extracted_text, pages_json
            FROM documents
            WHERE document_id = ?
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DocumentRow::into_document).transpose()
    }

    async fn find_file(&self, file_id: i64) -> StoreResult<Option<StoredFile>> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT id, name, url, hash, mime, size
            FROM files
            WHERE id = ?
            "#,
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn save_extraction(&self, internal_id: i64, extraction: &Extraction) -> StoreResult<()> {
        let pages_json = serde_json::to_string(&extraction.pages)?;

        let result = sqlx::query(
            r#"
            UPDATE documents SET
                processed = ?,
                page_count = ?,
                extracted_text = ?,
                pages_json = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(extraction.processed)
        .bind(extraction.page_count as i64)
        .bind(&extraction.extracted_text)
        .bind(&pages_json)
        .bind(Utc::now().to_rfc3339())
        .bind(internal_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowMissing(internal_id));
        }
        Ok(())
    }
}
