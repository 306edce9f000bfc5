use crate::heuristics::ParseResult;
use rusqlite::{Connection, OptionalExtension, Result as SqliteResult, Row, params};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

pub struct DocumentStore {
    conn: Connection,
}

/// One processed PDF and the line items we produced for it.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: Option<i64>,
    pub filename: String,
    pub sha256: String,
    pub result: ParseResult,
    pub created_at: Option<String>,
}

/// History row without the line items, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: i64,
    pub filename: String,
    pub page_count: usize,
    pub entities: usize,
    pub line_item_count: usize,
    pub created_at: String,
}

impl DocumentStore {
    /// Open (or create) the history database.
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        Self::init(Connection::open(db_path)?)
    }

    pub fn in_memory() -> SqliteResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> SqliteResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                filename TEXT NOT NULL,
                sha256 TEXT NOT NULL,
                page_count INTEGER NOT NULL DEFAULT 0,
                entity_count INTEGER NOT NULL DEFAULT 0,
                line_item_count INTEGER NOT NULL DEFAULT 0,
                result_json TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_sha256 ON documents(sha256)",
            [],
        )?;

        info!("Document store initialized");
        Ok(Self { conn })
    }

    /// Hex SHA-256 of the uploaded bytes; identical uploads share it.
    pub fn content_hash(pdf_bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(pdf_bytes);
        format!("{:x}", hasher.finalize())
    }

    pub fn insert_document(&self, doc: &StoredDocument) -> SqliteResult<i64> {
        let result_json = serde_json::to_string(&doc.result)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        let meta = doc.result.document_metadata;
        self.conn.execute(
            "INSERT INTO documents
                (filename, sha256, page_count, entity_count, line_item_count, result_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                doc.filename,
                doc.sha256,
                meta.page_count as i64,
                meta.entities as i64,
                doc.result.line_items.len() as i64,
                result_json,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(document_id = id, filename = %doc.filename, "Document stored");
        Ok(id)
    }

    pub fn get_document(&self, id: i64) -> SqliteResult<Option<StoredDocument>> {
        self.conn
            .query_row(
                "SELECT id, filename, sha256, result_json, created_at
                 FROM documents
                 WHERE id = ?1",
                params![id],
                Self::row_to_document,
            )
            .optional()
    }

    /// Most recent stored document with the same content hash.
    pub fn find_by_hash(&self, sha256: &str) -> SqliteResult<Option<StoredDocument>> {
        self.conn
            .query_row(
                "SELECT id, filename, sha256, result_json, created_at
                 FROM documents
                 WHERE sha256 = ?1
                 ORDER BY id DESC
                 LIMIT 1",
                params![sha256],
                Self::row_to_document,
            )
            .optional()
    }

    /// Newest first.
    pub fn list_documents(&self) -> SqliteResult<Vec<DocumentSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, filename, page_count, entity_count, line_item_count, created_at
             FROM documents
             ORDER BY id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DocumentSummary {
                id: row.get(0)?,
                filename: row.get(1)?,
                page_count: row.get::<_, i64>(2)? as usize,
                entities: row.get::<_, i64>(3)? as usize,
                line_item_count: row.get::<_, i64>(4)? as usize,
                created_at: row.get(5)?,
            })
        })?;
        rows.collect()
    }

    pub fn count(&self) -> SqliteResult<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
    }

    /// Map the 5-column document projection to `StoredDocument`.
    fn row_to_document(row: &Row<'_>) -> SqliteResult<StoredDocument> {
        let result_json: String = row.get(3)?;
        let result = serde_json::from_str(&result_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(StoredDocument {
            id: Some(row.get(0)?),
            filename: row.get(1)?,
            sha256: row.get(2)?,
            result,
            created_at: row.get(4)?,
        })
    }
}
