//! End-to-end tests for the indexing, reconciliation, and retrieval
//! engines, driven through the library API with a deterministic in-test
//! embedding provider.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use ragcell::config::{
    ChunkingConfig, Config, EmbeddingConfig, IndexConfig, LimitsConfig, MetadataConfig,
    RetrievalConfig, StorageConfig,
};
use ragcell::embedding::EmbeddingProvider;
use ragcell::files::LocalFileStore;
use ragcell::metadata::MemoryMetadataStore;
use ragcell::models::{IndexOutcome, SyncState};
use ragcell::{RagError, RagService, Scope};
use tempfile::TempDir;

/// Deterministic embedder: a byte histogram over 8 buckets. Identical
/// texts get identical vectors, so a query equal to a stored chunk is
/// always its nearest neighbor.
struct FakeEmbedder;

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-histogram"
    }
    fn dims(&self) -> usize {
        8
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = [0.0f32; 8];
                for b in t.bytes() {
                    v[(b as usize) % 8] += 1.0;
                }
                v.to_vec()
            })
            .collect())
    }
}

/// Embedder that always fails, for exercising the transient-failure path.
struct FailingEmbedder {
    calls: AtomicUsize,
}

impl FailingEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        8
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("embedding backend unavailable")
    }
}

fn test_config(root: &Path) -> Config {
    Config {
        storage: StorageConfig {
            root: root.join("files"),
        },
        index: IndexConfig {
            root: root.join("index"),
        },
        metadata: MetadataConfig::default(),
        chunking: ChunkingConfig {
            chunk_size: 80,
            overlap: 20,
        },
        embedding: EmbeddingConfig {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: 4,
            max_attempts: 1,
            timeout_secs: 5,
        },
        retrieval: RetrievalConfig { top_k: 8 },
        limits: LimitsConfig {
            max_file_size_mb: 1,
        },
    }
}

fn make_service(root: &Path, embedder: Arc<dyn EmbeddingProvider>) -> RagService {
    let config = test_config(root);
    RagService::new(
        config.clone(),
        Arc::new(LocalFileStore::new(config.storage.root.clone())),
        Arc::new(MemoryMetadataStore::new()),
        embedder,
    )
}

fn long_text(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| format!("Paragraph number {} talks about topic {}.", i, i % 5))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[tokio::test]
async fn upload_indexes_and_reports_chunk_count() {
    let tmp = TempDir::new().unwrap();
    let service = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let scope = Scope::Common;

    let report = service
        .upload_document(&scope, "guide.txt", long_text(12).as_bytes())
        .await
        .unwrap();

    assert!(report.indexed);
    assert!(report.chunk_count >= 2, "expected multiple chunks");
    assert!(report.warning.is_none());

    let docs = service.list_documents(&scope).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].indexed);
    assert_eq!(docs[0].chunk_count as usize, report.chunk_count);

    // Stored chunk count and metadata chunk count agree.
    let stats = service.sync_stats(&scope).await.unwrap();
    assert_eq!(stats.vector_entries as usize, report.chunk_count);
    assert_eq!(stats.state, SyncState::Synced);
}

#[tokio::test]
async fn indexing_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let service = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let scope = Scope::Common;

    let report = service
        .upload_document(&scope, "doc.txt", long_text(8).as_bytes())
        .await
        .unwrap();
    let first_count = report.chunk_count;

    let outcome = service.index_document(&scope, "doc.txt").await.unwrap();
    assert_eq!(
        outcome,
        IndexOutcome::AlreadyIndexed {
            chunk_count: first_count
        }
    );

    let stats = service.sync_stats(&scope).await.unwrap();
    assert_eq!(stats.vector_entries as usize, first_count);
}

#[tokio::test]
async fn scopes_are_isolated() {
    let tmp = TempDir::new().unwrap();
    let service = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let alice = Scope::User("alice@example.com".to_string());
    let bob = Scope::User("bob@example.com".to_string());

    service
        .upload_document(&alice, "hers.txt", b"Alice owns this private document about sailing.")
        .await
        .unwrap();

    // Bob's collection is empty: searching it is valid and returns nothing.
    let hits = service.search(&bob, "sailing", None).await.unwrap();
    assert!(hits.is_empty());
    assert!(service.list_documents(&bob).await.unwrap().is_empty());

    let hits = service.search(&alice, "sailing", None).await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| !h.is_common));
    assert!(hits.iter().all(|h| h.file_name == "hers.txt"));

    // Removing Alice's document never touches Bob or common.
    service.remove_document(&alice, "hers.txt").await.unwrap();
    let stats = service.sync_stats(&bob).await.unwrap();
    assert_eq!(stats.state, SyncState::Empty);
}

#[tokio::test]
async fn search_orders_by_similarity_and_dedups() {
    let tmp = TempDir::new().unwrap();
    let service = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let scope = Scope::Common;

    let text = "The quick brown fox jumps over the lazy dog.\n\n\
                Completely different content about databases.\n\n\
                The quick brown fox jumps over the lazy dog.";
    service
        .upload_document(&scope, "mixed.txt", text.as_bytes())
        .await
        .unwrap();

    let hits = service
        .search(&scope, "The quick brown fox jumps over the lazy dog.", None)
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert!(hits.len() <= 8);
    for pair in hits.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
    for hit in &hits {
        assert!((0.0..=1.0).contains(&hit.similarity));
        assert!(hit.is_common);
        assert!(hit.chunk_index < hit.total_chunks);
    }
    // Identical chunk texts collapse to one hit.
    let mut texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
    texts.sort();
    texts.dedup();
    assert_eq!(texts.len(), hits.len());

    // The exact-match chunk is the best hit.
    assert!(hits[0].text.contains("quick brown fox"));

    // Explicit top_k truncates.
    let hits = service
        .search(&scope, "quick brown fox", Some(1))
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn cleanup_removes_orphaned_chunks_completely() {
    let tmp = TempDir::new().unwrap();
    let service = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let scope = Scope::Common;

    let kept = service
        .upload_document(&scope, "kept.txt", long_text(6).as_bytes())
        .await
        .unwrap();
    let doomed = service
        .upload_document(&scope, "doomed.txt", long_text(9).as_bytes())
        .await
        .unwrap();

    // Remove the backing file out from under the index.
    std::fs::remove_file(tmp.path().join("files").join("common").join("doomed.txt")).unwrap();

    let stats = service.sync_stats(&scope).await.unwrap();
    assert_eq!(stats.state, SyncState::NeedsCleanup);

    let report = service.cleanup_orphans(&scope).await.unwrap();
    assert_eq!(report.orphaned_files, vec!["doomed.txt".to_string()]);
    assert_eq!(report.cleaned_chunks as usize, doomed.chunk_count);

    let stats = service.sync_stats(&scope).await.unwrap();
    assert_eq!(stats.state, SyncState::Synced);
    assert_eq!(stats.vector_entries as usize, kept.chunk_count);

    // No hit can reference the cleaned file any more.
    let hits = service.search(&scope, "Paragraph number 1", None).await.unwrap();
    assert!(hits.iter().all(|h| h.file_name == "kept.txt"));
}

#[tokio::test]
async fn reindex_pending_converges() {
    let tmp = TempDir::new().unwrap();
    let service = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let scope = Scope::Common;

    // Two documents go through the full upload path.
    service
        .upload_document(&scope, "one.txt", long_text(4).as_bytes())
        .await
        .unwrap();
    service
        .upload_document(&scope, "two.txt", long_text(4).as_bytes())
        .await
        .unwrap();

    // Three more appear in storage without being indexed.
    let dir = tmp.path().join("files").join("common");
    for name in ["three.txt", "four.txt", "five.txt"] {
        std::fs::write(dir.join(name), long_text(3)).unwrap();
    }

    let stats = service.sync_stats(&scope).await.unwrap();
    assert_eq!(stats.state, SyncState::NeedsIndexing);
    assert_eq!(stats.filesystem_files, 5);

    let report = service.reindex_pending(&scope).await.unwrap();
    assert_eq!(report.pending, 3);
    assert_eq!(report.reindexed, 3);
    assert!(report.errors.is_empty());

    let stats = service.sync_stats(&scope).await.unwrap();
    assert_eq!(stats.state, SyncState::Synced);

    // A second pass has nothing to do.
    let report = service.reindex_pending(&scope).await.unwrap();
    assert_eq!(report.pending, 0);
    assert_eq!(report.reindexed, 0);
}

#[tokio::test]
async fn upload_validation_rejects_bad_input() {
    let tmp = TempDir::new().unwrap();
    let service = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let scope = Scope::Common;

    let err = service
        .upload_document(&scope, "image.png", b"\x89PNG")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::UnsupportedFormat(_)));

    let err = service
        .upload_document(&scope, "empty.txt", b"")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::InvalidUpload(_)));

    let big = vec![b'a'; 2 * 1024 * 1024];
    let err = service
        .upload_document(&scope, "big.txt", &big)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::InvalidUpload(_)));

    let err = service
        .upload_document(&scope, "../sneaky.txt", b"content")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::InvalidUpload(_)));
}

#[tokio::test]
async fn duplicate_uploads_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let service = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let scope = Scope::Common;

    service
        .upload_document(&scope, "dup.txt", b"original content here")
        .await
        .unwrap();

    let err = service
        .upload_document(&scope, "dup.txt", b"original content here")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("identical content"));

    let err = service
        .upload_document(&scope, "dup.txt", b"changed content here!")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("delete it first"));
}

#[tokio::test]
async fn missing_documents_are_not_found() {
    let tmp = TempDir::new().unwrap();
    let service = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let scope = Scope::Common;

    let err = service.index_document(&scope, "ghost.txt").await.unwrap_err();
    assert!(matches!(err, RagError::NotFound(_)));

    let err = service
        .remove_document(&scope, "ghost.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::NotFound(_)));
}

#[tokio::test]
async fn embedding_failure_leaves_file_pending() {
    let tmp = TempDir::new().unwrap();
    let failing = Arc::new(FailingEmbedder::new());
    let service = make_service(tmp.path(), failing.clone());
    let scope = Scope::Common;

    let report = service
        .upload_document(&scope, "stuck.txt", long_text(4).as_bytes())
        .await
        .unwrap();
    assert!(!report.indexed);
    assert!(report.warning.is_some());
    assert!(failing.calls.load(Ordering::SeqCst) >= 1);

    // The file is stored and listed as pending.
    let docs = service.list_documents(&scope).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert!(!docs[0].indexed);

    let stats = service.sync_stats(&scope).await.unwrap();
    assert_eq!(stats.state, SyncState::NeedsIndexing);

    // Direct indexing surfaces the transient failure with the attempt count.
    let err = service.index_document(&scope, "stuck.txt").await.unwrap_err();
    match err {
        RagError::Transient { attempts, .. } => assert_eq!(attempts, 1),
        other => panic!("expected Transient, got {:?}", other),
    }

    // A healthy service over the same storage converges via reindex.
    let recovered = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let report = recovered.reindex_pending(&scope).await.unwrap();
    assert_eq!(report.pending, 1);
    assert_eq!(report.reindexed, 1);
    assert!(report.errors.is_empty());

    let stats = recovered.sync_stats(&scope).await.unwrap();
    assert_eq!(stats.state, SyncState::Synced);
}

#[tokio::test]
async fn remove_document_deletes_chunks_file_and_metadata() {
    let tmp = TempDir::new().unwrap();
    let service = make_service(tmp.path(), Arc::new(FakeEmbedder));
    let scope = Scope::Common;

    let report = service
        .upload_document(&scope, "gone.txt", long_text(6).as_bytes())
        .await
        .unwrap();

    let deleted = service.remove_document(&scope, "gone.txt").await.unwrap();
    assert_eq!(deleted as usize, report.chunk_count);

    assert!(service.list_documents(&scope).await.unwrap().is_empty());
    let stats = service.sync_stats(&scope).await.unwrap();
    assert_eq!(stats.state, SyncState::Empty);
    assert!(service.search(&scope, "Paragraph", None).await.unwrap().is_empty());
}
