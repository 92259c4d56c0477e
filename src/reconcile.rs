//! Reconciliation between the file store and the vector collections.
//!
//! The file store is authoritative. These operations derive the drift
//! state from ground truth on every call, delete chunks whose backing
//! file is gone, and index stored files the collection is missing.
//! None of them is transactional with concurrent uploads or deletes;
//! callers converge by re-running them.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::error::Result;
use crate::models::{CleanupReport, ReindexReport, SyncState, SyncStats};
use crate::scope::Scope;
use crate::service::RagService;

impl RagService {
    /// Snapshot of how the scope's collection relates to its file store.
    pub async fn sync_stats(&self, scope: &Scope) -> Result<SyncStats> {
        let collection = self.collection(scope).await?;
        let vector_entries = collection.count().await?;
        let indexed: BTreeSet<String> = collection.file_names().await?.into_iter().collect();
        let stored: BTreeSet<String> = self
            .files
            .list_files(scope)
            .await?
            .into_iter()
            .map(|f| f.file_name)
            .collect();

        let missing = stored.difference(&indexed).count();
        let orphaned = indexed.difference(&stored).count();

        let (state, message) = match (stored.is_empty() && indexed.is_empty(), missing, orphaned) {
            (true, _, _) => (SyncState::Empty, "no files and no vectors".to_string()),
            (false, 0, 0) => (
                SyncState::Synced,
                format!("{} files indexed", stored.len()),
            ),
            (false, m, 0) => (
                SyncState::NeedsIndexing,
                format!("{} stored files have no chunks", m),
            ),
            (false, 0, o) => (
                SyncState::NeedsCleanup,
                format!("{} indexed files no longer exist on disk", o),
            ),
            (false, m, o) => (
                SyncState::Partial,
                format!("{} files unindexed, {} files orphaned", m, o),
            ),
        };

        Ok(SyncStats {
            vector_entries,
            filesystem_files: stored.len() as u64,
            state,
            message,
        })
    }

    /// Delete every chunk whose file no longer exists in the file store,
    /// along with its metadata row.
    pub async fn cleanup_orphans(&self, scope: &Scope) -> Result<CleanupReport> {
        let collection = self.collection(scope).await?;
        let indexed: BTreeSet<String> = collection.file_names().await?.into_iter().collect();
        let stored: BTreeSet<String> = self
            .files
            .list_files(scope)
            .await?
            .into_iter()
            .map(|f| f.file_name)
            .collect();

        let mut cleaned_chunks = 0u64;
        let mut orphaned_files = Vec::new();

        for file_name in indexed.difference(&stored) {
            let ids = collection.ids_by_file_name(file_name).await?;
            cleaned_chunks += collection.delete_by_ids(&ids).await?;
            self.metadata.delete_document(scope, file_name).await?;
            orphaned_files.push(file_name.clone());
        }

        if !orphaned_files.is_empty() {
            info!(
                scope = %scope,
                files = orphaned_files.len(),
                chunks = cleaned_chunks,
                "cleaned orphaned chunks"
            );
        }

        Ok(CleanupReport {
            cleaned_chunks,
            orphaned_files,
        })
    }

    /// Index every stored file that has no chunks in the collection.
    ///
    /// Individual failures are collected per file; the pass continues to
    /// the next file rather than aborting.
    pub async fn reindex_pending(&self, scope: &Scope) -> Result<ReindexReport> {
        let collection = self.collection(scope).await?;
        let indexed: BTreeSet<String> = collection.file_names().await?.into_iter().collect();
        let mut stored: Vec<String> = self
            .files
            .list_files(scope)
            .await?
            .into_iter()
            .map(|f| f.file_name)
            .collect();
        stored.sort();

        let pending: Vec<String> = stored
            .into_iter()
            .filter(|name| !indexed.contains(name))
            .collect();

        let mut reindexed = 0u64;
        let mut errors = Vec::new();
        for file_name in &pending {
            match self.index_document(scope, file_name).await {
                Ok(_) => reindexed += 1,
                Err(e) => {
                    warn!(scope = %scope, file = %file_name, error = %e, "reindex failed");
                    errors.push((file_name.clone(), e.to_string()));
                }
            }
        }

        Ok(ReindexReport {
            reindexed,
            pending: pending.len() as u64,
            errors,
        })
    }
}
