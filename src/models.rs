//! Core data types shared across the indexing, reconciliation, and
//! retrieval engines.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Metadata row for an uploaded document, keyed by `(scope, file_name)`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub file_name: String,
    pub file_size: u64,
    /// SHA-256 of the raw file bytes, hex-encoded.
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
    /// 0 until the document has been indexed.
    pub chunk_count: i64,
    /// None until the document has been indexed.
    pub indexed_at: Option<DateTime<Utc>>,
}

/// A single embedded chunk as stored in a vector collection.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// UUID v4, unique within the collection.
    pub id: String,
    pub file_name: String,
    /// 0-based position within the source document.
    pub chunk_index: i64,
    pub total_chunks: i64,
    /// Character length of `text`.
    pub chunk_size: i64,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Plain-text extraction result from the document loader.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    /// Originating file name, carried into chunk provenance.
    pub source: String,
    pub text: String,
    pub file_size: u64,
    /// Character count of the extracted text.
    pub content_length: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Relationship between a scope's file store and its vector collection.
///
/// Always derived from ground truth at call time, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No files and no vectors.
    Empty,
    /// Every stored file is indexed and nothing else is.
    Synced,
    /// Some stored files have no chunks yet.
    NeedsIndexing,
    /// Some indexed files no longer exist on disk.
    NeedsCleanup,
    /// Both un-indexed files and orphaned chunks are present.
    Partial,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncState::Empty => "empty",
            SyncState::Synced => "synced",
            SyncState::NeedsIndexing => "needs_indexing",
            SyncState::NeedsCleanup => "needs_cleanup",
            SyncState::Partial => "partial",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot returned by [`sync_stats`](crate::service::RagService::sync_stats).
#[derive(Debug, Clone, Serialize)]
pub struct SyncStats {
    pub vector_entries: u64,
    pub filesystem_files: u64,
    pub state: SyncState,
    pub message: String,
}

/// Result of an orphan cleanup pass.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    /// Total chunks deleted from the collection.
    pub cleaned_chunks: u64,
    /// File names whose chunks were removed.
    pub orphaned_files: Vec<String>,
}

/// Result of a reindex-pending pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReindexReport {
    /// Files that were successfully indexed in this pass.
    pub reindexed: u64,
    /// Files that were pending when the pass started.
    pub pending: u64,
    /// `(file_name, error)` for files that failed; the pass continues
    /// past individual failures.
    pub errors: Vec<(String, String)>,
}

/// Outcome of an index request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The document was chunked, embedded, and stored.
    Indexed { chunk_count: usize },
    /// The collection already held chunks for this file; nothing was done.
    AlreadyIndexed { chunk_count: usize },
}

impl IndexOutcome {
    pub fn chunk_count(&self) -> usize {
        match self {
            IndexOutcome::Indexed { chunk_count } => *chunk_count,
            IndexOutcome::AlreadyIndexed { chunk_count } => *chunk_count,
        }
    }
}

/// Outcome of an upload. Indexing failure after a successful save is
/// reported through `warning` rather than raised, so the caller knows the
/// file is stored but pending.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub file_name: String,
    pub indexed: bool,
    pub chunk_count: usize,
    pub warning: Option<String>,
}

/// One entry in a document listing, merging file-store and metadata views.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentListing {
    pub file_name: String,
    pub file_size: u64,
    pub chunk_count: i64,
    pub indexed: bool,
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// A single retrieval result with provenance for citation building.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub file_name: String,
    /// Mapped similarity in `[0, 1]`, higher is closer.
    pub similarity: f32,
    pub chunk_index: i64,
    pub total_chunks: i64,
    /// True when the hit came from the shared `common` scope.
    pub is_common: bool,
}
