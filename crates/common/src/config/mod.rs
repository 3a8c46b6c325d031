//! Configuration management for DocQuery
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{env}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Upload storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// RAG pipeline configuration
    #[serde(default)]
    pub rag: RagConfig,

    /// Ingestion pipeline configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory where uploaded files are stored
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    /// Maximum upload size in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Allowed upload extensions
    #[serde(default = "default_allowed_file_types")]
    pub allowed_file_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Target chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlap between chunks in characters
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Minimum chunk size (smaller chunks are dropped)
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: openai-compat, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,

    /// Batch size for embedding requests
    #[serde(default = "default_embedding_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// LLM provider: openai-compat, mock
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API key for the LLM service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_llm_temperature")]
    pub temperature: f32,

    /// Maximum completion tokens
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: usize,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Model context window in tokens
    #[serde(default = "default_llm_context_window")]
    pub context_window: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RagConfig {
    /// Number of chunks to retrieve per query
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum best-match similarity below which the pipeline declines
    /// to answer from retrieved context
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Rewrite follow-up questions using conversation history
    #[serde(default = "default_enabled")]
    pub enable_history: bool,

    /// Number of recent history turns used for contextualization
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,

    /// Generate alternate query phrasings before retrieval
    #[serde(default = "default_enabled")]
    pub enable_augmentation: bool,

    /// Number of alternate phrasings to generate (clamped to 1-4)
    #[serde(default = "default_num_augmentations")]
    pub num_augmentations: usize,

    /// Capacity of the augmentation cache
    #[serde(default = "default_augment_cache_size")]
    pub augment_cache_size: usize,

    /// Character budget for the context block after truncation
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Number of background workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Depth of the bounded task queue
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Convert PDF uploads to Markdown before chunking
    #[serde(default = "default_enabled")]
    pub convert_pdf: bool,

    /// Convert DOCX uploads to Markdown before chunking
    #[serde(default = "default_enabled")]
    pub convert_docx: bool,

    /// Conversion timeout in seconds
    #[serde(default = "default_convert_timeout")]
    pub convert_timeout_secs: u64,

    /// Minimum size of a valid converted document in bytes
    #[serde(default = "default_min_converted_bytes")]
    pub min_converted_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_upload_dir() -> String { "data/uploads".to_string() }
fn default_max_file_size() -> usize { 10 * 1024 * 1024 }
fn default_allowed_file_types() -> Vec<String> {
    ["pdf", "docx", "txt", "md", "csv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_chunk_size() -> usize { 500 }
fn default_chunk_overlap() -> usize { 50 }
fn default_min_chunk_size() -> usize { 30 }
fn default_embedding_provider() -> String { "openai-compat".to_string() }
fn default_embedding_model() -> String { crate::DEFAULT_EMBEDDING_MODEL.to_string() }
fn default_embedding_dimension() -> usize { crate::DEFAULT_EMBEDDING_DIMENSION }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_embedding_batch_size() -> usize { 20 }
fn default_llm_provider() -> String { "openai-compat".to_string() }
fn default_llm_model() -> String { "llama-3.1-8b-instant".to_string() }
fn default_llm_temperature() -> f32 { 0.3 }
fn default_llm_max_tokens() -> usize { 1024 }
fn default_llm_timeout() -> u64 { 30 }
fn default_llm_context_window() -> usize { 8000 }
fn default_top_k() -> usize { 5 }
fn default_similarity_threshold() -> f32 { 0.7 }
fn default_enabled() -> bool { true }
fn default_max_history_turns() -> usize { 3 }
fn default_num_augmentations() -> usize { 2 }
fn default_augment_cache_size() -> usize { 1000 }
fn default_max_context_chars() -> usize { 10_000 }
fn default_workers() -> usize { 5 }
fn default_queue_depth() -> usize { 64 }
fn default_convert_timeout() -> u64 { 60 }
fn default_min_converted_bytes() -> usize { 100 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "docquery".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__RAG__TOP_K=8
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get the conversion timeout as Duration
    pub fn convert_timeout(&self) -> Duration {
        Duration::from_secs(self.ingestion.convert_timeout_secs)
    }

    /// Get the LLM request timeout as Duration
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_file_size: default_max_file_size(),
            allowed_file_types: default_allowed_file_types(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
            batch_size: default_embedding_batch_size(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key: None,
            api_base: None,
            model: default_llm_model(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
            timeout_secs: default_llm_timeout(),
            context_window: default_llm_context_window(),
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: default_similarity_threshold(),
            enable_history: default_enabled(),
            max_history_turns: default_max_history_turns(),
            enable_augmentation: default_enabled(),
            num_augmentations: default_num_augmentations(),
            augment_cache_size: default_augment_cache_size(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_depth: default_queue_depth(),
            convert_pdf: default_enabled(),
            convert_docx: default_enabled(),
            convert_timeout_secs: default_convert_timeout(),
            min_converted_bytes: default_min_converted_bytes(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            rag: RagConfig::default(),
            ingestion: IngestionConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.ingestion.workers, 5);
        assert!(config.storage.allowed_file_types.contains(&"pdf".to_string()));
    }

    #[test]
    fn test_timeout_helpers() {
        let config = AppConfig::default();
        assert_eq!(config.convert_timeout(), Duration::from_secs(60));
        assert_eq!(config.llm_timeout(), Duration::from_secs(30));
    }
}
