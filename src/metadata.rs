//! Document metadata storage.
//!
//! Tracks per-document bookkeeping (`chunk_count`, `indexed_at`, content
//! hash) separately from the vector collections. Two backends:
//! [`MemoryMetadataStore`] for development and tests, and
//! [`SqliteMetadataStore`] for production. Both implement the same trait,
//! so the engines are identical in either mode.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::error::Result;
use crate::models::DocumentRecord;
use crate::scope::Scope;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or replace the metadata row for `(scope, doc.file_name)`.
    async fn upsert_document(&self, scope: &Scope, doc: &DocumentRecord) -> Result<()>;

    /// Record a successful indexing run for a document.
    async fn mark_indexed(
        &self,
        scope: &Scope,
        file_name: &str,
        chunk_count: i64,
        indexed_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Remove the metadata row, if any.
    async fn delete_document(&self, scope: &Scope, file_name: &str) -> Result<()>;

    async fn get_document(&self, scope: &Scope, file_name: &str)
        -> Result<Option<DocumentRecord>>;

    async fn list_documents(&self, scope: &Scope) -> Result<Vec<DocumentRecord>>;
}

// ============ In-memory backend ============

/// In-memory metadata store for development and tests.
pub struct MemoryMetadataStore {
    docs: RwLock<HashMap<(String, String), DocumentRecord>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    fn key(scope: &Scope, file_name: &str) -> (String, String) {
        (scope.collection_name(), file_name.to_string())
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn upsert_document(&self, scope: &Scope, doc: &DocumentRecord) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        docs.insert(Self::key(scope, &doc.file_name), doc.clone());
        Ok(())
    }

    async fn mark_indexed(
        &self,
        scope: &Scope,
        file_name: &str,
        chunk_count: i64,
        indexed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        if let Some(doc) = docs.get_mut(&Self::key(scope, file_name)) {
            doc.chunk_count = chunk_count;
            doc.indexed_at = Some(indexed_at);
        }
        Ok(())
    }

    async fn delete_document(&self, scope: &Scope, file_name: &str) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        docs.remove(&Self::key(scope, file_name));
        Ok(())
    }

    async fn get_document(
        &self,
        scope: &Scope,
        file_name: &str,
    ) -> Result<Option<DocumentRecord>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(&Self::key(scope, file_name)).cloned())
    }

    async fn list_documents(&self, scope: &Scope) -> Result<Vec<DocumentRecord>> {
        let docs = self.docs.read().unwrap();
        let prefix = scope.collection_name();
        let mut out: Vec<DocumentRecord> = docs
            .iter()
            .filter(|((s, _), _)| *s == prefix)
            .map(|(_, doc)| doc.clone())
            .collect();
        out.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(out)
    }
}

// ============ SQLite backend ============

/// SQLite-backed metadata store (single database for all scopes).
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                scope TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                uploaded_at INTEGER NOT NULL,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                indexed_at INTEGER,
                PRIMARY KEY (scope, file_name)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }
}

fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn row_to_doc(row: &sqlx::sqlite::SqliteRow) -> DocumentRecord {
    let uploaded_at: i64 = row.get("uploaded_at");
    let indexed_at: Option<i64> = row.get("indexed_at");
    DocumentRecord {
        file_name: row.get("file_name"),
        file_size: row.get::<i64, _>("file_size") as u64,
        content_hash: row.get("content_hash"),
        uploaded_at: ts_to_datetime(uploaded_at),
        chunk_count: row.get("chunk_count"),
        indexed_at: indexed_at.map(ts_to_datetime),
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn upsert_document(&self, scope: &Scope, doc: &DocumentRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO documents
                (scope, file_name, file_size, content_hash, uploaded_at, chunk_count, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(scope.collection_name())
        .bind(&doc.file_name)
        .bind(doc.file_size as i64)
        .bind(&doc.content_hash)
        .bind(doc.uploaded_at.timestamp())
        .bind(doc.chunk_count)
        .bind(doc.indexed_at.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_indexed(
        &self,
        scope: &Scope,
        file_name: &str,
        chunk_count: i64,
        indexed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE documents SET chunk_count = ?, indexed_at = ? WHERE scope = ? AND file_name = ?",
        )
        .bind(chunk_count)
        .bind(indexed_at.timestamp())
        .bind(scope.collection_name())
        .bind(file_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_document(&self, scope: &Scope, file_name: &str) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE scope = ? AND file_name = ?")
            .bind(scope.collection_name())
            .bind(file_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_document(
        &self,
        scope: &Scope,
        file_name: &str,
    ) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query("SELECT * FROM documents WHERE scope = ? AND file_name = ?")
            .bind(scope.collection_name())
            .bind(file_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_doc))
    }

    async fn list_documents(&self, scope: &Scope) -> Result<Vec<DocumentRecord>> {
        let rows = sqlx::query("SELECT * FROM documents WHERE scope = ? ORDER BY file_name")
            .bind(scope.collection_name())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_doc).collect())
    }
}
