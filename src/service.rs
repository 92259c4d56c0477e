//! Service wiring.
//!
//! [`RagService`] owns every collaborator the engines need: configuration,
//! the collection registry, the file store, the metadata store, and the
//! embedding provider. The engine operations themselves live in
//! [`indexer`](crate::indexer), [`reconcile`](crate::reconcile), and
//! [`retrieval`](crate::retrieval) as `impl RagService` blocks.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::Result;
use crate::files::{FileStore, LocalFileStore};
use crate::metadata::{MemoryMetadataStore, MetadataStore, SqliteMetadataStore};
use crate::registry::CollectionRegistry;
use crate::scope::Scope;
use crate::store::VectorIndex;

pub struct RagService {
    pub(crate) config: Config,
    pub(crate) registry: CollectionRegistry,
    pub(crate) files: Arc<dyn FileStore>,
    pub(crate) metadata: Arc<dyn MetadataStore>,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    // One async mutex per (scope, file), created on demand. Serializes
    // concurrent indexing of the same document so the existence check and
    // the writes behind it never interleave.
    index_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RagService {
    /// Assemble a service from explicit collaborators. Used directly by
    /// tests, which substitute in-memory backends and fake embedders.
    pub fn new(
        config: Config,
        files: Arc<dyn FileStore>,
        metadata: Arc<dyn MetadataStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        let registry = CollectionRegistry::new(config.index.root.clone());
        Self {
            config,
            registry,
            files,
            metadata,
            embedder,
            index_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wire up the shipped backends from configuration: a local file store,
    /// the configured metadata backend, and the configured embedding
    /// provider.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.storage.root)?;
        std::fs::create_dir_all(&config.index.root)?;

        let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(config.storage.root.clone()));

        let metadata: Arc<dyn MetadataStore> = match config.metadata.backend.as_str() {
            "sqlite" => {
                let path = config
                    .metadata
                    .path
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("metadata.path is required for sqlite backend"))?;
                Arc::new(SqliteMetadataStore::open(&path).await?)
            }
            _ => Arc::new(MemoryMetadataStore::new()),
        };

        let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);

        Ok(Self::new(config, files, metadata, embedder))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) async fn collection(&self, scope: &Scope) -> Result<Arc<dyn VectorIndex>> {
        self.registry.get(scope).await
    }

    /// The per-(scope, file) indexing lock, created on first use.
    pub(crate) async fn file_lock(&self, scope: &Scope, file_name: &str) -> Arc<Mutex<()>> {
        let key = format!("{}::{}", scope.collection_name(), file_name);
        let mut locks = self.index_locks.lock().await;
        locks.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}
