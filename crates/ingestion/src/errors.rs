//! Ingestion pipeline error types

use docquery_common::errors::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error: {0}")]
    PdfParse(String),

    #[error("DOCX parse error: {0}")]
    DocxParse(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("No text content extracted")]
    EmptyDocument,

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AppError> for IngestionError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Embedding { message } => IngestionError::Embedding(message),
            AppError::EmbeddingTimeout { timeout_ms } => {
                IngestionError::Embedding(format!("timeout after {}ms", timeout_ms))
            }
            AppError::Index { message } => IngestionError::Index(message),
            other => IngestionError::Storage(other.to_string()),
        }
    }
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        AppError::Ingestion {
            message: e.to_string(),
        }
    }
}
