//! Authoritative file storage.
//!
//! The [`FileStore`] trait abstracts where uploaded documents physically
//! live; the engines only ever refer to files by `(scope, file_name)`.
//! [`LocalFileStore`] keeps one subdirectory per scope under a configured
//! root and filters listings down to the supported document extensions.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};
use crate::loader;
use crate::scope::Scope;

/// A file visible in a scope's store.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub file_name: String,
    pub file_size: u64,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Supported files in the scope, in arbitrary order.
    async fn list_files(&self, scope: &Scope) -> Result<Vec<StoredFile>>;

    /// Read a file's raw bytes. Missing files map to [`RagError::NotFound`].
    async fn read_file(&self, scope: &Scope, file_name: &str) -> Result<Vec<u8>>;

    async fn exists(&self, scope: &Scope, file_name: &str) -> Result<bool>;

    async fn save_file(&self, scope: &Scope, file_name: &str, bytes: &[u8]) -> Result<()>;

    /// Delete a file. Missing files map to [`RagError::NotFound`].
    async fn delete_file(&self, scope: &Scope, file_name: &str) -> Result<()>;
}

/// Reject names that could escape the scope directory or collide with
/// path components.
pub fn validate_file_name(file_name: &str) -> Result<()> {
    if file_name.is_empty() {
        return Err(RagError::InvalidUpload("file name is empty".to_string()));
    }
    if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
        return Err(RagError::InvalidUpload(format!(
            "file name must not contain path separators: {}",
            file_name
        )));
    }
    Ok(())
}

/// Filesystem-backed file store with one subdirectory per scope.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn scope_dir(&self, scope: &Scope) -> PathBuf {
        self.root.join(scope.collection_name())
    }

    fn file_path(&self, scope: &Scope, file_name: &str) -> Result<PathBuf> {
        validate_file_name(file_name)?;
        Ok(self.scope_dir(scope).join(file_name))
    }
}

fn map_io_not_found(e: std::io::Error, file_name: &str) -> RagError {
    if e.kind() == std::io::ErrorKind::NotFound {
        RagError::NotFound(file_name.to_string())
    } else {
        RagError::Io(e)
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn list_files(&self, scope: &Scope) -> Result<Vec<StoredFile>> {
        let dir = self.scope_dir(scope);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            if let Some(name) = file_name_of(&entry.path()) {
                if loader::is_supported(&name) {
                    out.push(StoredFile {
                        file_name: name,
                        file_size: meta.len(),
                    });
                }
            }
        }
        Ok(out)
    }

    async fn read_file(&self, scope: &Scope, file_name: &str) -> Result<Vec<u8>> {
        let path = self.file_path(scope, file_name)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| map_io_not_found(e, file_name))
    }

    async fn exists(&self, scope: &Scope, file_name: &str) -> Result<bool> {
        let path = self.file_path(scope, file_name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn save_file(&self, scope: &Scope, file_name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.file_path(scope, file_name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    async fn delete_file(&self, scope: &Scope, file_name: &str) -> Result<()> {
        let path = self.file_path(scope, file_name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| map_io_not_found(e, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_read_delete_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path().to_path_buf());
        let scope = Scope::Common;

        store.save_file(&scope, "a.txt", b"hello").await.unwrap();
        assert!(store.exists(&scope, "a.txt").await.unwrap());
        assert_eq!(store.read_file(&scope, "a.txt").await.unwrap(), b"hello");

        store.delete_file(&scope, "a.txt").await.unwrap();
        assert!(!store.exists(&scope, "a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path().to_path_buf());

        let err = store.read_file(&Scope::Common, "ghost.txt").await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));

        let err = store
            .delete_file(&Scope::Common, "ghost.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_listing_filters_unsupported_extensions() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path().to_path_buf());
        let scope = Scope::Common;

        store.save_file(&scope, "keep.md", b"# hi").await.unwrap();
        store.save_file(&scope, "skip.png", b"\x89PNG").await.unwrap();

        let files = store.list_files(&scope).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "keep.md");
        assert_eq!(files[0].file_size, 4);
    }

    #[tokio::test]
    async fn test_scope_directories_are_isolated() {
        let tmp = TempDir::new().unwrap();
        let store = LocalFileStore::new(tmp.path().to_path_buf());
        let alice = Scope::User("alice@example.com".to_string());
        let bob = Scope::User("bob@example.com".to_string());

        store.save_file(&alice, "secret.txt", b"hers").await.unwrap();
        assert!(!store.exists(&bob, "secret.txt").await.unwrap());
        assert!(store.list_files(&bob).await.unwrap().is_empty());
    }

    #[test]
    fn test_path_traversal_rejected() {
        assert!(validate_file_name("../etc/passwd").is_err());
        assert!(validate_file_name("a/b.txt").is_err());
        assert!(validate_file_name("a\\b.txt").is_err());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("fine.txt").is_ok());
    }
}
