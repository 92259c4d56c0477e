//! Per-scope collection registry.
//!
//! Maps a [`Scope`] to its vector collection, opening the backing SQLite
//! file lazily on first access and memoizing the handle for the process
//! lifetime. Handles live behind a read-mostly `RwLock`; the steady state
//! is a read-lock lookup, and the write lock is only taken to open a
//! collection that has never been touched.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::error::Result;
use crate::scope::Scope;
use crate::store::{SqliteCollection, VectorIndex};

pub struct CollectionRegistry {
    root: PathBuf,
    handles: RwLock<HashMap<String, Arc<SqliteCollection>>>,
}

impl CollectionRegistry {
    /// `root` is the directory holding one SQLite file per collection.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Get (or lazily create) the collection for `scope`.
    pub async fn get(&self, scope: &Scope) -> Result<Arc<dyn VectorIndex>> {
        let name = scope.collection_name();

        {
            let handles = self.handles.read().await;
            if let Some(handle) = handles.get(&name) {
                return Ok(handle.clone() as Arc<dyn VectorIndex>);
            }
        }

        let mut handles = self.handles.write().await;
        // Another task may have opened it between the read and write locks.
        if let Some(handle) = handles.get(&name) {
            return Ok(handle.clone() as Arc<dyn VectorIndex>);
        }

        let path = self.root.join(format!("{}.db", name));
        info!(collection = %name, path = %path.display(), "opening collection");
        let collection = Arc::new(SqliteCollection::open(&path).await?);
        handles.insert(name, collection.clone());
        Ok(collection as Arc<dyn VectorIndex>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lazy_creation_and_memoization() {
        let tmp = TempDir::new().unwrap();
        let registry = CollectionRegistry::new(tmp.path().to_path_buf());

        let scope = Scope::User("alice@example.com".to_string());
        let db_path = tmp.path().join(format!("{}.db", scope.collection_name()));
        assert!(!db_path.exists());

        let first = registry.get(&scope).await.unwrap();
        assert!(db_path.exists());
        assert_eq!(first.count().await.unwrap(), 0);

        // Second call reuses the handle without reopening.
        let second = registry.get(&scope).await.unwrap();
        assert_eq!(second.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_scopes_get_separate_collections() {
        let tmp = TempDir::new().unwrap();
        let registry = CollectionRegistry::new(tmp.path().to_path_buf());

        registry.get(&Scope::Common).await.unwrap();
        registry
            .get(&Scope::User("bob@example.com".to_string()))
            .await
            .unwrap();

        assert!(tmp.path().join("common.db").exists());
        let entries: Vec<_> = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map(|x| x == "db").unwrap_or(false))
            .collect();
        assert_eq!(entries.len(), 2);
    }
}
