//! DocQuery Common Library
//!
//! Shared code for the DocQuery crates including:
//! - Configuration management
//! - Error types and handling
//! - Role and department access tables
//! - Embedding and LLM provider abstractions
//! - Vector index abstraction
//! - Document and file storage interfaces

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod index;
pub mod llm;
pub mod roles;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use index::{DistanceMetric, VectorIndex};
pub use llm::LlmClient;
pub use roles::RoleTable;
pub use store::{Document, DocumentStatus, DocumentStore, FileStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Default embedding dimension
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
