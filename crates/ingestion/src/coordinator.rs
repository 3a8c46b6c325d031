//! Ingestion coordination
//!
//! Owns the upload entry point and the background processing pool.
//! Uploads validate synchronously and return a pending record; a
//! bounded mpsc queue feeds a fixed set of workers that drive
//! conversion -> chunking -> embedding -> indexing and record the
//! terminal state on the document.

use crate::chunker;
use crate::convert;
use crate::errors::IngestionError;
use crate::loader::SourceFormat;
use docquery_common::config::AppConfig;
use docquery_common::embeddings::Embedder;
use docquery_common::errors::{AppError, Result};
use docquery_common::index::{ChunkFilter, ChunkMetadata, IndexedChunk, VectorIndex};
use docquery_common::roles::RoleTable;
use docquery_common::store::{Document, DocumentStatus, DocumentStore, FileStore};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Per-department index statistics
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStats {
    pub department: String,
    pub collection: String,
    pub chunk_count: usize,
}

/// Task handed to the worker pool
#[derive(Debug, Clone)]
struct IngestTask {
    document_id: Uuid,
}

/// Shared services for upload handling and background workers
struct WorkerContext {
    documents: Arc<dyn DocumentStore>,
    files: Arc<dyn FileStore>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    roles: RoleTable,
    config: AppConfig,
}

/// Coordinates uploads and asynchronous document processing
pub struct IngestionCoordinator {
    ctx: Arc<WorkerContext>,
    queue: mpsc::Sender<IngestTask>,
}

impl IngestionCoordinator {
    /// Create the coordinator and spawn its worker pool.
    ///
    /// Must be called from within a tokio runtime. Workers exit when
    /// the coordinator is dropped and the queue drains.
    pub fn new(
        config: AppConfig,
        documents: Arc<dyn DocumentStore>,
        files: Arc<dyn FileStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        roles: RoleTable,
    ) -> Self {
        let workers = config.ingestion.workers.max(1);
        let queue_depth = config.ingestion.queue_depth.max(1);

        let ctx = Arc::new(WorkerContext {
            documents,
            files,
            embedder,
            index,
            roles,
            config,
        });

        let (tx, rx) = mpsc::channel(queue_depth);
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..workers {
            let rx = rx.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, rx, ctx).await;
            });
        }

        info!(workers, queue_depth, "Ingestion worker pool started");

        Self { ctx, queue: tx }
    }

    /// Validate and enqueue an upload, returning the pending record.
    ///
    /// Byte-identical re-uploads return the existing record without
    /// re-processing.
    pub async fn ingest(
        &self,
        bytes: &[u8],
        filename: &str,
        department: &str,
        uploaded_by: &str,
    ) -> Result<Document> {
        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let allowed = &self.ctx.config.storage.allowed_file_types;
        if !allowed.iter().any(|a| a.eq_ignore_ascii_case(&extension))
            || SourceFormat::from_extension(&extension).is_none()
        {
            warn!(filename, extension, "Upload rejected: unsupported file type");
            return Err(AppError::UnsupportedFileType { extension });
        }

        let limit = self.ctx.config.storage.max_file_size;
        if bytes.len() > limit {
            warn!(filename, size = bytes.len(), limit, "Upload rejected: too large");
            return Err(AppError::PayloadTooLarge {
                size: bytes.len(),
                limit,
            });
        }

        if !self
            .ctx
            .roles
            .all_departments()
            .iter()
            .any(|d| d == department)
        {
            return Err(AppError::Validation {
                message: format!("Unknown department: {}", department),
                field: Some("department".to_string()),
            });
        }

        let content_hash = hex::encode(Sha256::digest(bytes));

        if let Some(existing) = self.ctx.documents.find_by_content_hash(&content_hash).await? {
            info!(
                filename,
                document_id = %existing.id,
                "Duplicate upload detected, returning existing document"
            );
            return Ok(existing);
        }

        let storage_name = format!("{}.{}", Uuid::new_v4(), extension);
        self.ctx.files.put(&storage_name, bytes).await?;

        let document = Document::new(
            storage_name,
            filename.to_string(),
            bytes.len(),
            extension,
            department.to_string(),
            uploaded_by.to_string(),
            content_hash,
        );
        self.ctx.documents.save(&document).await?;

        self.queue
            .send(IngestTask {
                document_id: document.id,
            })
            .await
            .map_err(|_| AppError::Ingestion {
                message: "ingestion queue is closed".to_string(),
            })?;

        info!(
            document_id = %document.id,
            filename,
            department,
            "Document queued for processing"
        );

        Ok(document)
    }

    /// Current record for a document
    pub async fn status(&self, document_id: Uuid) -> Result<Document> {
        self.ctx
            .documents
            .get(document_id)
            .await?
            .ok_or_else(|| AppError::DocumentNotFound {
                id: document_id.to_string(),
            })
    }

    /// Documents visible to a role
    pub async fn list_documents(&self, role: &str) -> Result<Vec<Document>> {
        let departments = self.ctx.roles.departments_for(role);
        if departments.is_empty() {
            return Ok(Vec::new());
        }
        self.ctx.documents.list_by_departments(&departments).await
    }

    /// Delete a document: index entries, stored bytes, then the record
    pub async fn delete_document(&self, document_id: Uuid) -> Result<()> {
        let document = self.status(document_id).await?;

        let collection = self.ctx.roles.collection_for(&document.department);
        match self
            .ctx
            .index
            .delete_where(&collection, &ChunkFilter::DocumentId(document_id))
            .await
        {
            Ok(removed) => debug!(document_id = %document_id, removed, "Index entries removed"),
            Err(e) => warn!(document_id = %document_id, error = %e, "Could not delete index entries"),
        }

        if let Err(e) = self.ctx.files.delete(&document.filename).await {
            warn!(document_id = %document_id, error = %e, "Could not delete stored file");
        }

        self.ctx.documents.delete(document_id).await?;
        info!(document_id = %document_id, "Document deleted");
        Ok(())
    }

    /// Chunk counts for every department collection
    pub async fn collection_stats(&self) -> Vec<CollectionStats> {
        let mut stats = Vec::new();
        for department in self.ctx.roles.all_departments() {
            let collection = self.ctx.roles.collection_for(&department);
            let chunk_count = match self.ctx.index.count(&collection).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(department, error = %e, "Could not read collection stats");
                    0
                }
            };
            stats.push(CollectionStats {
                department,
                collection,
                chunk_count,
            });
        }
        stats
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<IngestTask>>>,
    ctx: Arc<WorkerContext>,
) {
    debug!(worker_id, "Ingestion worker started");
    loop {
        let task = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };

        match task {
            Some(task) => process_document(&ctx, task.document_id).await,
            None => {
                debug!(worker_id, "Ingestion worker shutting down");
                break;
            }
        }
    }
}

/// Drive one document to a terminal state, recording failures on the
/// record rather than propagating them into the void
async fn process_document(ctx: &WorkerContext, document_id: Uuid) {
    let document = match ctx.documents.get(document_id).await {
        Ok(Some(document)) => document,
        Ok(None) => {
            warn!(document_id = %document_id, "Queued document record missing, skipping");
            return;
        }
        Err(e) => {
            error!(document_id = %document_id, error = %e, "Could not load queued document");
            return;
        }
    };

    if document.status.is_terminal() {
        debug!(document_id = %document_id, "Document already terminal, skipping");
        return;
    }

    match run_pipeline(ctx, document.clone()).await {
        Ok(processed) => {
            info!(
                document_id = %processed.id,
                chunk_count = processed.chunk_count,
                converted_from = ?processed.converted_from,
                "Document processed and indexed"
            );
        }
        Err(e) => {
            error!(document_id = %document_id, error = %e, "Document processing failed");
            let mut failed = document;
            failed.status = DocumentStatus::Failed;
            failed.last_error = Some(e.to_string());
            if let Err(update_err) = ctx.documents.update(&failed).await {
                error!(
                    document_id = %document_id,
                    error = %update_err,
                    "Failed to record terminal failure"
                );
            }
        }
    }
}

async fn run_pipeline(
    ctx: &WorkerContext,
    mut document: Document,
) -> std::result::Result<Document, IngestionError> {
    let format = SourceFormat::from_extension(&document.source_type)
        .ok_or_else(|| IngestionError::UnsupportedFormat(document.source_type.clone()))?;

    let bytes = ctx.files.get(&document.filename).await?;

    let conversion_applies = match format {
        SourceFormat::Pdf => ctx.config.ingestion.convert_pdf,
        SourceFormat::Docx => ctx.config.ingestion.convert_docx,
        _ => false,
    };
    if conversion_applies {
        document.status = DocumentStatus::Converting;
        ctx.documents.update(&document).await?;
    }

    let outcome = convert::convert_with_fallback(&bytes, format, &ctx.config.ingestion).await?;
    document.converted_from = outcome.converted_from.clone();

    document.status = DocumentStatus::Chunking;
    ctx.documents.update(&document).await?;

    let chunks = chunker::chunk_document(&outcome.parts, &ctx.config.chunking)?;
    if chunks.is_empty() {
        return Err(IngestionError::Chunking(
            "document produced no chunks".to_string(),
        ));
    }

    document.status = DocumentStatus::Indexing;
    ctx.documents.update(&document).await?;

    let batch_size = ctx.config.embedding.batch_size.max(1);
    let mut indexed = Vec::with_capacity(chunks.len());

    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let embeddings = ctx.embedder.embed_batch(&texts).await?;

        for (chunk, embedding) in batch.iter().zip(embeddings) {
            indexed.push(IndexedChunk {
                id: Uuid::new_v4(),
                content: chunk.content.clone(),
                embedding,
                metadata: ChunkMetadata {
                    document_id: document.id,
                    filename: document.original_filename.clone(),
                    department: document.department.clone(),
                    section_path: if chunk.section_path.is_empty() {
                        None
                    } else {
                        Some(chunk.section_path.join(" > "))
                    },
                    header_level: chunk.header_level,
                    page: chunk.page,
                },
            });
        }
    }

    let chunk_count = indexed.len();
    let collection = ctx.roles.collection_for(&document.department);
    ctx.index.upsert(&collection, indexed).await?;

    document.status = DocumentStatus::Processed;
    document.chunk_count = chunk_count;
    document.processed_at = Some(chrono::Utc::now());
    document.last_error = None;
    ctx.documents.update(&document).await?;

    Ok(document)
}
