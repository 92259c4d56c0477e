//! Indexing engine: upload, index, remove, and list documents.
//!
//! Indexing is idempotent per `(scope, file_name)`: a document whose chunks
//! are already present is never re-embedded. Embed-and-upsert runs in
//! batches; each batch gets a bounded number of attempts with exponential
//! backoff before the document is abandoned. Batches already written stay
//! in place — the collection is left partially indexed and a later
//! reindex pass completes it.

use std::time::Duration;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::chunker::Chunker;
use crate::error::{RagError, Result};
use crate::files::validate_file_name;
use crate::loader;
use crate::models::{
    ChunkRecord, DocumentListing, DocumentRecord, IndexOutcome, UploadReport,
};
use crate::scope::Scope;
use crate::service::RagService;
use crate::store::VectorIndex;

/// Hex-encoded SHA-256 of raw file bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

impl RagService {
    /// Chunk, embed, and store one document from the file store.
    ///
    /// Concurrent calls for the same `(scope, file_name)` serialize on a
    /// per-file lock, so the idempotency check and the writes behind it
    /// never interleave.
    pub async fn index_document(&self, scope: &Scope, file_name: &str) -> Result<IndexOutcome> {
        let lock = self.file_lock(scope, file_name).await;
        let _guard = lock.lock().await;

        let bytes = self.files.read_file(scope, file_name).await?;
        let loaded = loader::load_document(file_name, &bytes)?;

        let collection = self.collection(scope).await?;
        let existing = collection.count_by_file_name(file_name).await?;
        if existing > 0 {
            info!(scope = %scope, file = file_name, chunks = existing, "already indexed");
            return Ok(IndexOutcome::AlreadyIndexed {
                chunk_count: existing as usize,
            });
        }

        let chunker = Chunker::new(
            self.config.chunking.chunk_size,
            self.config.chunking.overlap,
        );
        let texts = chunker.split(&loaded.text);
        if texts.is_empty() {
            return Err(RagError::EmptyDocument(file_name.to_string()));
        }

        let total = texts.len();
        let batch_size = self.config.embedding.batch_size;
        let max_attempts = self.config.embedding.max_attempts;

        let mut next_index = 0i64;
        for batch in texts.chunks(batch_size) {
            let start_index = next_index;
            next_index += batch.len() as i64;
            // Ids are fixed before the attempt loop so a retry after a
            // partially applied transaction replaces rather than duplicates.
            let ids: Vec<String> = batch.iter().map(|_| Uuid::new_v4().to_string()).collect();

            let mut last_err = String::new();
            let mut stored = false;
            for attempt in 0..max_attempts {
                if attempt > 0 {
                    let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                    warn!(
                        scope = %scope,
                        file = file_name,
                        attempt,
                        error = %last_err,
                        "batch failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                match self
                    .embed_and_store(
                        collection.as_ref(),
                        file_name,
                        batch,
                        &ids,
                        start_index,
                        total as i64,
                    )
                    .await
                {
                    Ok(()) => {
                        stored = true;
                        break;
                    }
                    Err(e) => last_err = e.to_string(),
                }
            }
            if !stored {
                return Err(RagError::Transient {
                    attempts: max_attempts,
                    message: last_err,
                });
            }
        }

        self.record_indexed(scope, file_name, &bytes, total as i64)
            .await?;

        info!(scope = %scope, file = file_name, chunks = total, "indexed");
        Ok(IndexOutcome::Indexed { chunk_count: total })
    }

    async fn embed_and_store(
        &self,
        collection: &dyn VectorIndex,
        file_name: &str,
        batch: &[String],
        ids: &[String],
        start_index: i64,
        total: i64,
    ) -> anyhow::Result<()> {
        let vectors = self.embedder.embed(batch).await?;
        if vectors.len() != batch.len() {
            anyhow::bail!(
                "embedding count mismatch: {} texts, {} vectors",
                batch.len(),
                vectors.len()
            );
        }

        let records: Vec<ChunkRecord> = batch
            .iter()
            .zip(vectors)
            .zip(ids)
            .enumerate()
            .map(|(offset, ((text, embedding), id))| ChunkRecord {
                id: id.clone(),
                file_name: file_name.to_string(),
                chunk_index: start_index + offset as i64,
                total_chunks: total,
                chunk_size: text.chars().count() as i64,
                text: text.clone(),
                embedding,
            })
            .collect();

        collection.upsert_batch(&records).await?;
        Ok(())
    }

    /// Update document metadata after a successful indexing run, creating
    /// the row when the file was placed without going through upload.
    async fn record_indexed(
        &self,
        scope: &Scope,
        file_name: &str,
        bytes: &[u8],
        chunk_count: i64,
    ) -> Result<()> {
        let now = Utc::now();
        match self.metadata.get_document(scope, file_name).await? {
            Some(_) => {
                self.metadata
                    .mark_indexed(scope, file_name, chunk_count, now)
                    .await
            }
            None => {
                self.metadata
                    .upsert_document(
                        scope,
                        &DocumentRecord {
                            file_name: file_name.to_string(),
                            file_size: bytes.len() as u64,
                            content_hash: content_hash(bytes),
                            uploaded_at: now,
                            chunk_count,
                            indexed_at: Some(now),
                        },
                    )
                    .await
            }
        }
    }

    /// Validate and store an uploaded document, then index it.
    ///
    /// A failure after the file is saved (for example the embedding
    /// provider being down) is reported through
    /// [`UploadReport::warning`] rather than raised: the file is stored,
    /// listed as pending, and picked up by a later reindex pass.
    pub async fn upload_document(
        &self,
        scope: &Scope,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<UploadReport> {
        validate_file_name(file_name)?;
        if !loader::is_supported(file_name) {
            return Err(RagError::UnsupportedFormat(file_name.to_string()));
        }
        if bytes.is_empty() {
            return Err(RagError::InvalidUpload(format!("{} is empty", file_name)));
        }
        let max_bytes = self.config.limits.max_file_size_bytes();
        if bytes.len() as u64 > max_bytes {
            return Err(RagError::InvalidUpload(format!(
                "{} is {} bytes, above the {} MB limit",
                file_name,
                bytes.len(),
                self.config.limits.max_file_size_mb
            )));
        }

        let hash = content_hash(bytes);
        if self.files.exists(scope, file_name).await? {
            let existing_hash = match self.metadata.get_document(scope, file_name).await? {
                Some(doc) => doc.content_hash,
                None => content_hash(&self.files.read_file(scope, file_name).await?),
            };
            if existing_hash == hash {
                return Err(RagError::InvalidUpload(format!(
                    "{} already exists with identical content",
                    file_name
                )));
            }
            return Err(RagError::InvalidUpload(format!(
                "{} already exists with different content; delete it first or rename the upload",
                file_name
            )));
        }

        // Validate extractability before anything is stored, so scanned
        // PDFs and corrupt files are rejected rather than parked as
        // permanently pending.
        loader::load_document(file_name, bytes)?;

        self.files.save_file(scope, file_name, bytes).await?;
        self.metadata
            .upsert_document(
                scope,
                &DocumentRecord {
                    file_name: file_name.to_string(),
                    file_size: bytes.len() as u64,
                    content_hash: hash,
                    uploaded_at: Utc::now(),
                    chunk_count: 0,
                    indexed_at: None,
                },
            )
            .await?;

        match self.index_document(scope, file_name).await {
            Ok(outcome) => Ok(UploadReport {
                file_name: file_name.to_string(),
                indexed: true,
                chunk_count: outcome.chunk_count(),
                warning: None,
            }),
            Err(e) => {
                warn!(scope = %scope, file = file_name, error = %e, "uploaded but not indexed");
                Ok(UploadReport {
                    file_name: file_name.to_string(),
                    indexed: false,
                    chunk_count: 0,
                    warning: Some(e.to_string()),
                })
            }
        }
    }

    /// Delete a document's chunks, stored file, and metadata row.
    ///
    /// Returns the number of chunks removed. Fails with
    /// [`RagError::NotFound`] only when neither a stored file nor any
    /// chunks exist.
    pub async fn remove_document(&self, scope: &Scope, file_name: &str) -> Result<u64> {
        let lock = self.file_lock(scope, file_name).await;
        let _guard = lock.lock().await;

        let collection = self.collection(scope).await?;
        let ids = collection.ids_by_file_name(file_name).await?;
        let deleted = collection.delete_by_ids(&ids).await?;

        let had_file = match self.files.delete_file(scope, file_name).await {
            Ok(()) => true,
            Err(RagError::NotFound(_)) => false,
            Err(e) => return Err(e),
        };

        self.metadata.delete_document(scope, file_name).await?;

        if !had_file && deleted == 0 {
            return Err(RagError::NotFound(file_name.to_string()));
        }

        info!(scope = %scope, file = file_name, chunks = deleted, "removed");
        Ok(deleted)
    }

    /// List stored documents with their indexing status, merging the file
    /// store, the metadata store, and (for files missing metadata) the
    /// collection itself.
    pub async fn list_documents(&self, scope: &Scope) -> Result<Vec<DocumentListing>> {
        let mut files = self.files.list_files(scope).await?;
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        let collection = self.collection(scope).await?;
        let mut out = Vec::with_capacity(files.len());
        for file in files {
            let listing = match self.metadata.get_document(scope, &file.file_name).await? {
                Some(meta) => DocumentListing {
                    file_name: file.file_name,
                    file_size: file.file_size,
                    chunk_count: meta.chunk_count,
                    indexed: meta.indexed_at.is_some(),
                    uploaded_at: Some(meta.uploaded_at),
                },
                None => {
                    let chunks = collection.count_by_file_name(&file.file_name).await?;
                    DocumentListing {
                        file_name: file.file_name,
                        file_size: file.file_size,
                        chunk_count: chunks as i64,
                        indexed: chunks > 0,
                        uploaded_at: None,
                    }
                }
            };
            out.push(listing);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_hex() {
        let a = content_hash(b"hello");
        let b = content_hash(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, content_hash(b"hello!"));
    }
}
