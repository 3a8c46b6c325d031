//! Document and file storage interfaces
//!
//! Storage is an external collaborator: the core only needs CRUD on
//! document records and raw file bytes. In-memory implementations back
//! the tests; `LocalFileStore` writes uploads to a directory on disk.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;
use uuid::Uuid;

/// Processing state of an uploaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Uploaded, waiting for a worker
    Pending,
    /// Converting to Markdown
    Converting,
    /// Splitting into chunks
    Chunking,
    /// Embedding and writing to the vector index
    Indexing,
    /// Fully indexed
    Processed,
    /// Terminal failure; recovery requires re-upload
    Failed,
}

impl DocumentStatus {
    /// Whether the document has reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Processed | DocumentStatus::Failed)
    }
}

/// Lifecycle record for an uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,

    /// Storage filename (unique, uuid-based)
    pub filename: String,

    /// Filename as uploaded by the user
    pub original_filename: String,

    /// Upload size in bytes
    pub file_size: usize,

    /// Format of the uploaded file (pdf, docx, txt, md, csv)
    pub source_type: String,

    /// Set when the document was normalized to Markdown before
    /// chunking; holds the original format
    pub converted_from: Option<String>,

    /// Owning department
    pub department: String,

    /// Uploader's user id
    pub uploaded_by: String,

    /// Current processing state
    pub status: DocumentStatus,

    /// Number of chunks indexed (0 until processed)
    pub chunk_count: usize,

    /// SHA-256 of the uploaded bytes, for duplicate detection
    pub content_hash: String,

    pub uploaded_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,

    /// Failure message for `Failed` documents
    pub last_error: Option<String>,
}

impl Document {
    /// Create a pending record for a fresh upload
    pub fn new(
        filename: String,
        original_filename: String,
        file_size: usize,
        source_type: String,
        department: String,
        uploaded_by: String,
        content_hash: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            original_filename,
            file_size,
            source_type,
            converted_from: None,
            department,
            uploaded_by,
            status: DocumentStatus::Pending,
            chunk_count: 0,
            content_hash,
            uploaded_at: Utc::now(),
            processed_at: None,
            last_error: None,
        }
    }

    /// Whether the document completed processing successfully
    pub fn is_processed(&self) -> bool {
        self.status == DocumentStatus::Processed
    }
}

/// CRUD over document records
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save(&self, document: &Document) -> Result<()>;
    async fn update(&self, document: &Document) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Document>>;
    async fn find_by_content_hash(&self, hash: &str) -> Result<Option<Document>>;
    async fn list_by_departments(&self, departments: &[String]) -> Result<Vec<Document>>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// Raw byte storage for uploaded files
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> Result<bool>;
}

/// In-memory document store for tests and embedded use
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<Uuid, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn lock_err() -> AppError {
        AppError::Storage {
            message: "document store lock poisoned".to_string(),
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn save(&self, document: &Document) -> Result<()> {
        let mut documents = self.documents.write().map_err(|_| Self::lock_err())?;
        documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn update(&self, document: &Document) -> Result<()> {
        let mut documents = self.documents.write().map_err(|_| Self::lock_err())?;
        if !documents.contains_key(&document.id) {
            return Err(AppError::DocumentNotFound {
                id: document.id.to_string(),
            });
        }
        documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        let documents = self.documents.read().map_err(|_| Self::lock_err())?;
        Ok(documents.get(&id).cloned())
    }

    async fn find_by_content_hash(&self, hash: &str) -> Result<Option<Document>> {
        let documents = self.documents.read().map_err(|_| Self::lock_err())?;
        Ok(documents
            .values()
            .find(|d| d.content_hash == hash)
            .cloned())
    }

    async fn list_by_departments(&self, departments: &[String]) -> Result<Vec<Document>> {
        let documents = self.documents.read().map_err(|_| Self::lock_err())?;
        let mut matching: Vec<Document> = documents
            .values()
            .filter(|d| departments.iter().any(|dept| dept == &d.department))
            .cloned()
            .collect();
        matching.sort_by_key(|d| d.uploaded_at);
        Ok(matching)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut documents = self.documents.write().map_err(|_| Self::lock_err())?;
        Ok(documents.remove(&id).is_some())
    }
}

/// In-memory file store for tests
pub struct MemoryFileStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
        }
    }

    fn lock_err() -> AppError {
        AppError::Storage {
            message: "file store lock poisoned".to_string(),
        }
    }
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut files = self.files.write().map_err(|_| Self::lock_err())?;
        files.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let files = self.files.read().map_err(|_| Self::lock_err())?;
        files.get(key).cloned().ok_or_else(|| AppError::NotFound {
            resource_type: "file".to_string(),
            id: key.to_string(),
        })
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut files = self.files.write().map_err(|_| Self::lock_err())?;
        Ok(files.remove(key).is_some())
    }
}

/// File store backed by a directory on disk
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Create the store, creating the directory if needed
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are uuid-based filenames generated by the coordinator;
        // reject anything that could escape the root
        if key.contains('/') || key.contains("..") || key.contains('\\') {
            return Err(AppError::Validation {
                message: format!("Invalid storage key: {}", key),
                field: Some("key".to_string()),
            });
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "File saved");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound {
                resource_type: "file".to_string(),
                id: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document(department: &str, hash: &str) -> Document {
        Document::new(
            format!("{}.md", Uuid::new_v4()),
            "handbook.md".to_string(),
            1024,
            "md".to_string(),
            department.to_string(),
            "user-1".to_string(),
            hash.to_string(),
        )
    }

    #[tokio::test]
    async fn test_memory_document_store_roundtrip() {
        let store = MemoryDocumentStore::new();
        let mut doc = sample_document("HR", "abc123");
        store.save(&doc).await.unwrap();

        doc.status = DocumentStatus::Processed;
        doc.chunk_count = 7;
        store.update(&doc).await.unwrap();

        let loaded = store.get(doc.id).await.unwrap().unwrap();
        assert!(loaded.is_processed());
        assert_eq!(loaded.chunk_count, 7);
    }

    #[tokio::test]
    async fn test_find_by_content_hash() {
        let store = MemoryDocumentStore::new();
        let doc = sample_document("Finance", "deadbeef");
        store.save(&doc).await.unwrap();

        let found = store.find_by_content_hash("deadbeef").await.unwrap();
        assert_eq!(found.unwrap().id, doc.id);
        assert!(store.find_by_content_hash("cafebabe").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_departments_filters() {
        let store = MemoryDocumentStore::new();
        store.save(&sample_document("HR", "h1")).await.unwrap();
        store.save(&sample_document("Finance", "f1")).await.unwrap();

        let hr_only = store
            .list_by_departments(&["HR".to_string()])
            .await
            .unwrap();
        assert_eq!(hr_only.len(), 1);
        assert_eq!(hr_only[0].department, "HR");
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = MemoryDocumentStore::new();
        let doc = sample_document("HR", "nope");
        let err = store.update(&doc).await.unwrap_err();
        assert!(matches!(err, AppError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_memory_file_store() {
        let store = MemoryFileStore::new();
        store.put("a.bin", b"hello").await.unwrap();
        assert_eq!(store.get("a.bin").await.unwrap(), b"hello");
        assert!(store.delete("a.bin").await.unwrap());
        assert!(!store.delete("a.bin").await.unwrap());
        assert!(store.get("a.bin").await.is_err());
    }

    #[tokio::test]
    async fn test_local_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).await.unwrap();

        store.put("doc.pdf", b"%PDF-1.4").await.unwrap();
        assert_eq!(store.get("doc.pdf").await.unwrap(), b"%PDF-1.4");
        assert!(store.delete("doc.pdf").await.unwrap());
        assert!(!store.delete("doc.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_local_file_store_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path()).await.unwrap();
        assert!(store.put("../escape", b"x").await.is_err());
    }
}
