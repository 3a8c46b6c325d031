//! Error types for DocQuery
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - Machine-readable error codes
//! - HTTP status hints for the (external) API layer
//! - Recoverable vs. fatal classification

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    UnsupportedFileType,
    PayloadTooLarge,

    // Resource errors (4xxx)
    NotFound,
    DocumentNotFound,

    // Pipeline errors (5xxx)
    ConversionError,
    ChunkingError,
    IngestionError,

    // External service errors (8xxx)
    EmbeddingError,
    EmbeddingTimeout,
    GenerationError,
    RetrievalError,
    IndexError,
    StorageError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::UnsupportedFileType => 1002,
            ErrorCode::PayloadTooLarge => 1003,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::DocumentNotFound => 4002,

            // Pipeline (5xxx)
            ErrorCode::ConversionError => 5001,
            ErrorCode::ChunkingError => 5002,
            ErrorCode::IngestionError => 5003,

            // External (8xxx)
            ErrorCode::EmbeddingError => 8001,
            ErrorCode::EmbeddingTimeout => 8002,
            ErrorCode::GenerationError => 8003,
            ErrorCode::RetrievalError => 8004,
            ErrorCode::IndexError => 8005,
            ErrorCode::StorageError => 8006,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("File type not allowed: .{extension}")]
    UnsupportedFileType { extension: String },

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Document not found: {id}")]
    DocumentNotFound { id: String },

    // Pipeline errors
    #[error("Conversion failed: {message}")]
    Conversion { message: String },

    #[error("Chunking failed: {message}")]
    Chunking { message: String },

    #[error("Ingestion failed: {message}")]
    Ingestion { message: String },

    // External service errors
    #[error("Embedding service error: {message}")]
    Embedding { message: String },

    #[error("Embedding timeout after {timeout_ms}ms")]
    EmbeddingTimeout { timeout_ms: u64 },

    #[error("Answer generation failed: {message}")]
    Generation { message: String },

    #[error("Retrieval error in {department}: {message}")]
    Retrieval {
        department: String,
        message: String,
    },

    #[error("Vector index error: {message}")]
    Index { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::UnsupportedFileType { .. } => ErrorCode::UnsupportedFileType,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::DocumentNotFound { .. } => ErrorCode::DocumentNotFound,
            AppError::Conversion { .. } => ErrorCode::ConversionError,
            AppError::Chunking { .. } => ErrorCode::ChunkingError,
            AppError::Ingestion { .. } => ErrorCode::IngestionError,
            AppError::Embedding { .. } => ErrorCode::EmbeddingError,
            AppError::EmbeddingTimeout { .. } => ErrorCode::EmbeddingTimeout,
            AppError::Generation { .. } => ErrorCode::GenerationError,
            AppError::Retrieval { .. } => ErrorCode::RetrievalError,
            AppError::Index { .. } => ErrorCode::IndexError,
            AppError::Storage { .. } => ErrorCode::StorageError,
            AppError::HttpClient(_) => ErrorCode::InternalError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// HTTP status hint for the API layer
    pub fn status_hint(&self) -> u16 {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::UnsupportedFileType { .. } => 400,

            // 404 Not Found
            AppError::NotFound { .. } | AppError::DocumentNotFound { .. } => 404,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => 413,

            // 500 Internal Server Error
            AppError::Conversion { .. }
            | AppError::Chunking { .. }
            | AppError::Ingestion { .. }
            | AppError::Index { .. }
            | AppError::Storage { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => 500,

            // 502 Bad Gateway
            AppError::Embedding { .. }
            | AppError::EmbeddingTimeout { .. }
            | AppError::Generation { .. }
            | AppError::Retrieval { .. }
            | AppError::HttpClient(_) => 502,
        }
    }

    /// Whether this error is absorbed with a fallback rather than
    /// propagated to the caller (conversion falls back to the original
    /// format, per-department retrieval failures are skipped)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Conversion { .. } | AppError::Retrieval { .. }
        )
    }

    /// Check if this error is caused by bad caller input
    pub fn is_user_error(&self) -> bool {
        self.status_hint() < 500
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage {
            message: err.to_string(),
        }
    }
}
