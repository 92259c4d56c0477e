//! Vector collection storage.
//!
//! The [`VectorIndex`] trait is the narrow interface the indexing,
//! reconciliation, and retrieval engines need from a collection backend:
//! counting, per-file lookup, batched deletes, batched upserts, and
//! nearest-neighbor scan. The shipped backend is [`SqliteCollection`],
//! one SQLite file per scope with embeddings stored as little-endian
//! `f32` BLOBs and brute-force cosine scoring in Rust.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::Result;
use crate::models::ChunkRecord;

/// Chunk ids are deleted in batches of this size.
pub(crate) const DELETE_BATCH: usize = 100;

/// Operations a vector collection backend must support.
///
/// Distances returned by [`nearest`](VectorIndex::nearest) are cosine
/// distances (`1 - cosine similarity`), smaller is closer.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Total chunks in the collection.
    async fn count(&self) -> Result<u64>;

    /// Chunks stored for one file.
    async fn count_by_file_name(&self, file_name: &str) -> Result<u64>;

    /// Ids of all chunks stored for one file.
    async fn ids_by_file_name(&self, file_name: &str) -> Result<Vec<String>>;

    /// Distinct file names present in the collection.
    async fn file_names(&self) -> Result<Vec<String>>;

    /// Delete chunks by id, returning the number actually removed.
    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64>;

    /// Insert or replace a batch of chunks atomically.
    async fn upsert_batch(&self, chunks: &[ChunkRecord]) -> Result<()>;

    /// The `k` chunks closest to `query`, as `(chunk, distance)` pairs
    /// ordered by ascending distance. An empty collection returns an
    /// empty vector.
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkRecord, f32)>>;
}

/// SQLite-backed vector collection (one database file per scope).
pub struct SqliteCollection {
    pool: SqlitePool,
}

impl SqliteCollection {
    /// Open (or create) the collection database at `path` and ensure the
    /// schema exists.
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
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                file_name TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                total_chunks INTEGER NOT NULL,
                chunk_size INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_file_name ON chunks(file_name)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> ChunkRecord {
    let blob: Vec<u8> = row.get("embedding");
    ChunkRecord {
        id: row.get("id"),
        file_name: row.get("file_name"),
        chunk_index: row.get("chunk_index"),
        total_chunks: row.get("total_chunks"),
        chunk_size: row.get("chunk_size"),
        text: row.get("text"),
        embedding: blob_to_vec(&blob),
    }
}

#[async_trait]
impl VectorIndex for SqliteCollection {
    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_by_file_name(&self, file_name: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE file_name = ?")
            .bind(file_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn ids_by_file_name(&self, file_name: &str) -> Result<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT id FROM chunks WHERE file_name = ? ORDER BY chunk_index")
                .bind(file_name)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }

    async fn file_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT file_name FROM chunks ORDER BY file_name")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    async fn delete_by_ids(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut deleted = 0u64;
        for batch in ids.chunks(DELETE_BATCH) {
            let mut builder = sqlx::QueryBuilder::new("DELETE FROM chunks WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in batch {
                separated.push_bind(id);
            }
            separated.push_unseparated(")");
            let result = builder.build().execute(&self.pool).await?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    async fn upsert_batch(&self, chunks: &[ChunkRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO chunks
                    (id, file_name, chunk_index, total_chunks, chunk_size, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.file_name)
            .bind(chunk.chunk_index)
            .bind(chunk.total_chunks)
            .bind(chunk.chunk_size)
            .bind(&chunk.text)
            .bind(vec_to_blob(&chunk.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(ChunkRecord, f32)>> {
        let rows = sqlx::query(
            "SELECT id, file_name, chunk_index, total_chunks, chunk_size, text, embedding FROM chunks",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut scored: Vec<(ChunkRecord, f32)> = rows
            .iter()
            .map(|row| {
                let chunk = row_to_chunk(row);
                let distance = 1.0 - cosine_similarity(query, &chunk.embedding);
                (chunk, distance)
            })
            .collect();

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}
