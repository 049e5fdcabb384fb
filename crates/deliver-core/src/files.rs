//! # File Store
//!
//! Backing store for the digital files attached to delivery emails.

use crate::product::ProductCatalog;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Size information for a stored file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
}

/// Source of deliverable files, addressed by bare file name.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Returns `None` when the file does not exist.
    async fn stat(&self, name: &str) -> Option<FileInfo>;

    /// Read the whole file.
    async fn read(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Human-readable location (path, key) for diagnostics
    fn location(&self, name: &str) -> String;
}

pub type BoxedFileStore = Arc<dyn FileStore>;

/// Files served from a local directory
#[derive(Debug, Clone)]
pub struct DirectoryFileStore {
    root: PathBuf,
}

impl DirectoryFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, name: &str) -> io::Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid file name: {name}"),
            ));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl FileStore for DirectoryFileStore {
    async fn stat(&self, name: &str) -> Option<FileInfo> {
        let path = self.path_for(name).ok()?;
        let meta = tokio::fs::metadata(&path).await.ok()?;
        meta.is_file().then(|| FileInfo {
            name: name.to_string(),
            size: meta.len(),
        })
    }

    async fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        let path = self.path_for(name)?;
        tokio::fs::read(path).await
    }

    fn location(&self, name: &str) -> String {
        self.root.join(name).display().to_string()
    }
}

/// In-memory files, for tests and embedded assets
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a file
    pub fn with_file(mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.files.insert(name.into(), content.into());
        self
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn stat(&self, name: &str) -> Option<FileInfo> {
        self.files.get(name).map(|content| FileInfo {
            name: name.to_string(),
            size: content.len() as u64,
        })
    }

    async fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
    }

    fn location(&self, name: &str) -> String {
        format!("memory:{name}")
    }
}

/// Diagnostic status of one product file
#[derive(Debug, Clone, Serialize)]
pub struct FileCheck {
    pub name: String,
    pub location: String,
    pub exists: bool,
    pub size: u64,
}

/// Diagnostic status of all files of a product
#[derive(Debug, Clone, Serialize)]
pub struct ProductFilesCheck {
    pub product_id: String,
    pub files: Vec<FileCheck>,
    pub all_files_exist: bool,
}

/// Check that every file a product resolves to is present in the store
pub async fn check_product_files(
    catalog: &ProductCatalog,
    store: &dyn FileStore,
    product_id: &str,
) -> ProductFilesCheck {
    let mut files = Vec::new();
    for name in catalog.resolve_files(product_id) {
        let info = store.stat(&name).await;
        files.push(FileCheck {
            location: store.location(&name),
            exists: info.is_some(),
            size: info.map(|i| i.size).unwrap_or(0),
            name,
        });
    }

    let all_files_exist = files.iter().all(|f| f.exists);
    ProductFilesCheck {
        product_id: product_id.to_string(),
        files,
        all_files_exist,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_directory_store_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tracker-habitos.xlsx"), b"sheet").unwrap();

        let store = DirectoryFileStore::new(dir.path());
        let info = store.stat("tracker-habitos.xlsx").await.unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(store.read("tracker-habitos.xlsx").await.unwrap(), b"sheet");
        assert!(store.stat("missing.xlsx").await.is_none());
    }

    #[tokio::test]
    async fn test_directory_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryFileStore::new(dir.path());

        assert!(store.stat("../etc/passwd").await.is_none());
        let err = store.read("../etc/passwd").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_check_product_files() {
        let catalog = ProductCatalog::builtin();
        let store = MemoryFileStore::new().with_file("tracker-habitos.xlsx", vec![0u8; 10]);

        let check = check_product_files(&catalog, &store, "pack-productividad").await;
        assert_eq!(check.files.len(), 2);
        assert!(check.files[0].exists);
        assert_eq!(check.files[0].size, 10);
        assert!(!check.files[1].exists);
        assert!(!check.all_files_exist);
    }
}
